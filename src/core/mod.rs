pub mod audio_processor;
pub mod error;
pub mod pipeline;
pub mod sample_format;
pub mod spectral;
