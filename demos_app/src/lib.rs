pub mod audio_backend;
pub mod chunker;
pub mod config;
