use crate::core::error::ApmError;
use alloc::boxed::Box;
use alloc::string::String;
use alloc::vec::Vec;

/// Outcome of one stage on one chunk.
///
/// * `Ok(Some(samples))` - the processed chunk, same length as the input.
/// * `Ok(None)` - the stage decided the chunk carries no usable audio and it
///   must be dropped.
/// * `Err(_)` - the stage failed; the pipeline keeps the pre-stage buffer.
pub type ProcessResult = Result<Option<Vec<i16>>, ApmError>;

/// Snapshot of a processor's identity and configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessorInfo {
    pub name: String,
    pub initialized: bool,
    /// Construction parameters as `(key, value)` pairs.
    pub params: Vec<(&'static str, String)>,
}

/// The core trait for all pipeline stages.
///
/// A stage owns its configuration (fixed at construction) and its mutable
/// state (carried from one chunk to the next). Chunks must be fed in arrival
/// order; [`AudioProcessor::reset_state`] marks the start of a new,
/// independent stream.
pub trait AudioProcessor {
    /// Returns the name of the processor.
    fn name(&self) -> &str;

    /// Builds the processing state from the configuration.
    ///
    /// Called lazily by `process`. Calling it again is a no-op.
    fn initialize(&mut self);

    /// Whether `initialize` has run.
    fn is_initialized(&self) -> bool;

    /// Processes one chunk of mono PCM16 samples.
    fn process(&mut self, chunk: &[i16]) -> ProcessResult;

    /// Clears the state carried between chunks. Configuration is untouched.
    fn reset_state(&mut self);

    /// Returns the processor's name, status and configuration.
    fn describe(&self) -> ProcessorInfo;
}

impl<T: AudioProcessor + ?Sized> AudioProcessor for Box<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn initialize(&mut self) {
        (**self).initialize();
    }

    fn is_initialized(&self) -> bool {
        (**self).is_initialized()
    }

    fn process(&mut self, chunk: &[i16]) -> ProcessResult {
        (**self).process(chunk)
    }

    fn reset_state(&mut self) {
        (**self).reset_state();
    }

    fn describe(&self) -> ProcessorInfo {
        (**self).describe()
    }
}
