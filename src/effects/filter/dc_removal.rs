use crate::core::audio_processor::{AudioProcessor, ProcessResult, ProcessorInfo};
use crate::core::error::ApmError;
use crate::core::sample_format::{f32_to_i16, i16_to_f32};
use crate::effects::filter::butterworth::{ButterworthHighPass, FilterOrder};
use alloc::string::ToString;
use alloc::vec;
use core::f32::consts::PI;
use log::info;
use serde::Deserialize;

const NAME: &str = "DCRemoval";

/// Parameters of [`DcRemoval`].
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct DcRemovalConfig {
    pub sample_rate: u32,
    /// Cutoff of both the DC blocker and the Butterworth stage, in Hz.
    pub cutoff_freq: f32,
}

impl Default for DcRemovalConfig {
    fn default() -> Self {
        DcRemovalConfig {
            sample_rate: 16000,
            cutoff_freq: 20.0,
        }
    }
}

struct DcRemovalState {
    highpass: ButterworthHighPass,
    prev_input: f32,
    prev_output: f32,
}

/// Removes DC offset with a one-pole DC blocker followed by a first-order
/// Butterworth high-pass at the same cutoff.
///
/// The blocker runs `y[n] = x[n] - x[n-1] + r * y[n-1]` with
/// `r = clamp(1 - 2*pi*fc/fs, 0.90, 0.9999)`. Both stages pick up exactly
/// where the previous chunk ended.
pub struct DcRemoval {
    config: DcRemovalConfig,
    pole: f32,
    highpass: ButterworthHighPass,
    state: Option<DcRemovalState>,
}

impl DcRemoval {
    /// Creates a new DcRemoval stage.
    ///
    /// # Errors
    /// Non-positive sample rate or cutoff.
    pub fn new(config: DcRemovalConfig) -> Result<Self, ApmError> {
        let highpass = ButterworthHighPass::new(
            FilterOrder::First,
            config.cutoff_freq,
            config.sample_rate,
            NAME,
        )?;
        let pole = (1.0 - 2.0 * PI * config.cutoff_freq / config.sample_rate as f32).clamp(0.90, 0.9999);
        Ok(DcRemoval {
            config,
            pole,
            highpass,
            state: None,
        })
    }

    /// The DC blocker feedback coefficient `r`.
    pub fn pole(&self) -> f32 {
        self.pole
    }

    fn fresh_state(&self) -> DcRemovalState {
        let mut highpass = self.highpass.clone();
        highpass.reset();
        DcRemovalState {
            highpass,
            prev_input: 0.0,
            prev_output: 0.0,
        }
    }
}

impl AudioProcessor for DcRemoval {
    fn name(&self) -> &str {
        NAME
    }

    fn initialize(&mut self) {
        if self.state.is_none() {
            self.state = Some(self.fresh_state());
            info!(
                "{NAME}: initialized, cutoff={}Hz, blocker pole={:.5}",
                self.config.cutoff_freq, self.pole
            );
        }
    }

    fn is_initialized(&self) -> bool {
        self.state.is_some()
    }

    fn process(&mut self, chunk: &[i16]) -> ProcessResult {
        self.initialize();
        if chunk.is_empty() {
            return Ok(Some(vec![]));
        }

        let r = self.pole;
        let Some(state) = self.state.as_mut() else {
            return Ok(Some(chunk.to_vec()));
        };

        let mut buffer = i16_to_f32(chunk);
        for sample in buffer.iter_mut() {
            let x = *sample;
            let y = x - state.prev_input + r * state.prev_output;
            state.prev_input = x;
            state.prev_output = y;
            *sample = y;
        }
        state.highpass.process(&mut buffer);

        f32_to_i16(&buffer).map(Some)
    }

    fn reset_state(&mut self) {
        if self.state.is_some() {
            self.state = Some(self.fresh_state());
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
