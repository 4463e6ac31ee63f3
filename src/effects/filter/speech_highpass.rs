use crate::core::audio_processor::{AudioProcessor, ProcessResult, ProcessorInfo};
use crate::core::error::ApmError;
use crate::core::sample_format::{f32_to_i16, i16_to_f32};
use crate::effects::filter::butterworth::{ButterworthHighPass, FilterOrder};
use alloc::string::ToString;
use alloc::vec;
use log::info;
use serde::Deserialize;

const NAME: &str = "SpeechHighPass";

/// Parameters of [`SpeechHighPass`].
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct SpeechHighPassConfig {
    pub sample_rate: u32,
    pub cutoff_freq: f32,
}

impl Default for SpeechHighPassConfig {
    fn default() -> Self {
        SpeechHighPassConfig {
            sample_rate: 16000,
            cutoff_freq: 70.0,
        }
    }
}

/// Second-order Butterworth high-pass that strips rumble below the speech
/// band.
pub struct SpeechHighPass {
    config: SpeechHighPassConfig,
    design: ButterworthHighPass,
    state: Option<ButterworthHighPass>,
}

impl SpeechHighPass {
    /// Creates a new SpeechHighPass stage.
    pub fn new(config: SpeechHighPassConfig) -> Result<Self, ApmError> {
        let design =
            ButterworthHighPass::new(FilterOrder::Second, config.cutoff_freq, config.sample_rate, NAME)?;
        Ok(SpeechHighPass {
            config,
            design,
            state: None,
        })
    }
}

impl AudioProcessor for SpeechHighPass {
    fn name(&self) -> &str {
        NAME
    }

    fn initialize(&mut self) {
        if self.state.is_none() {
            self.state = Some(self.design.clone());
            info!("{NAME}: initialized, cutoff={}Hz", self.config.cutoff_freq);
        }
    }

    fn is_initialized(&self) -> bool {
        self.state.is_some()
    }

    fn process(&mut self, chunk: &[i16]) -> ProcessResult {
        self.initialize();
        let Some(filter) = self.state.as_mut() else {
            return Ok(Some(chunk.to_vec()));
        };

        let mut buffer = i16_to_f32(chunk);
        filter.process(&mut buffer);
        f32_to_i16(&buffer).map(Some)
    }

    fn reset_state(&mut self) {
        if let Some(filter) = self.state.as_mut() {
            filter.reset();
        }
    }

    fn describe(&self) -> ProcessorInfo {
        ProcessorInfo {
            name: NAME.to_string(),
            initialized: self.is_initialized(),
            params: vec![
                ("sample_rate", self.config.sample_rate.to_string()),
                ("cutoff_freq", self.config.cutoff_freq.to_string()),
            ],
        }
    }
}
