use alloc::string::String;
use thiserror::Error;

/// Everything that can go wrong inside the enhancement pipeline.
///
/// Only [`ApmError::InvalidConfig`] ever reaches a caller directly, from
/// processor constructors and the pipeline builder. The other variants are
/// raised by stages and contained by [`crate::AudioPipeline`] or the VAD
/// wrapper.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ApmError {
    /// A processor was constructed with parameters it cannot run with.
    #[error("invalid {processor} configuration: {reason}")]
    InvalidConfig {
        processor: &'static str,
        reason: String,
    },

    /// A fixed-size frame consumer received the wrong number of samples.
    #[error("frame size mismatch: expected {expected} samples, got {actual}")]
    FrameSizeMismatch { expected: usize, actual: usize },

    /// A PCM16 byte payload cannot be split into whole samples.
    #[error("PCM16 payload has an odd length of {len} bytes")]
    OddByteLength { len: usize },

    /// A stage produced NaN or infinity.
    #[error("non-finite sample at index {index}")]
    NonFiniteSample { index: usize },

    /// A stage returned a buffer of a different length than it was given.
    #[error("stage '{stage}' changed chunk length from {expected} to {actual}")]
    LengthChanged {
        stage: String,
        expected: usize,
        actual: usize,
    },

    /// The FFT backend rejected a buffer.
    #[error("FFT of size {size} failed")]
    Fft { size: usize },

    /// The voice activity engine reported a failure.
    #[error("voice activity engine failed: {0}")]
    Vad(String),
}

impl ApmError {
    pub(crate) fn invalid_config(processor: &'static str, reason: impl Into<String>) -> Self {
        ApmError::InvalidConfig {
            processor,
            reason: reason.into(),
        }
    }
}
