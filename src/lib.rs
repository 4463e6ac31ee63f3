#![no_std]

extern crate alloc;

pub mod builder;
pub mod core;
pub mod effects;
pub mod vad;

pub use crate::builder::{build_pipeline, build_pipeline_with, PipelineConfig};
pub use crate::core::audio_processor::{AudioProcessor, ProcessResult, ProcessorInfo};
pub use crate::core::error::ApmError;
pub use crate::core::pipeline::AudioPipeline;
