use crate::core::audio_processor::{AudioProcessor, ProcessResult, ProcessorInfo};
use crate::core::error::ApmError;
use crate::core::sample_format::{f32_to_i16, i16_to_f32};
use crate::effects::utility::gain::apply_gain_curve;
use alloc::string::ToString;
use alloc::vec;
use alloc::vec::Vec;
use log::info;
use serde::Deserialize;

const NAME: &str = "EdgeFade";

/// Parameters of [`EdgeFade`].
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct EdgeFadeConfig {
    pub sample_rate: u32,
    pub fade_duration_ms: f32,
}

impl Default for EdgeFadeConfig {
    fn default() -> Self {
        EdgeFadeConfig {
            sample_rate: 16000,
            fade_duration_ms: 1.0,
        }
    }
}

/// Fades every chunk in and out with a short linear ramp.
///
/// The ramp has `max(1, round(fs * ms / 1000))` taps running from 0 to 1.
/// Chunks no longer than two ramps pass through untouched.
pub struct EdgeFade {
    config: EdgeFadeConfig,
    fade_samples: usize,
    ramp: Option<Vec<f32>>,
}

impl EdgeFade {
    /// Creates a new EdgeFade stage.
    ///
    /// # Errors
    /// Zero sample rate or a negative fade duration.
    pub fn new(config: EdgeFadeConfig) -> Result<Self, ApmError> {
        if config.sample_rate == 0 {
            return Err(ApmError::invalid_config(NAME, "sample rate must be positive"));
        }
        if !(config.fade_duration_ms.is_finite() && config.fade_duration_ms >= 0.0) {
            return Err(ApmError::invalid_config(NAME, "fade duration must not be negative"));
        }
        let samples = libm::roundf(config.sample_rate as f32 * config.fade_duration_ms / 1000.0);
        Ok(EdgeFade {
            fade_samples: (samples as usize).max(1),
            config,
            ramp: None,
        })
    }

    /// Length of each ramp in samples.
    pub fn fade_samples(&self) -> usize {
        self.fade_samples
    }
}

fn linear_ramp(len: usize) -> Vec<f32> {
    if len == 1 {
        return vec![0.0];
    }
    let last = (len - 1) as f32;
    (0..len).map(|i| i as f32 / last).collect()
}

impl AudioProcessor for EdgeFade {
    fn name(&self) -> &str {
        NAME
    }

    fn initialize(&mut self) {
        if self.ramp.is_none() {
            self.ramp = Some(linear_ramp(self.fade_samples));
            info!("{NAME}: initialized, fade_samples={}", self.fade_samples);
        }
    }

    fn is_initialized(&self) -> bool {
        self.ramp.is_some()
    }

    fn process(&mut self, chunk: &[i16]) -> ProcessResult {
        self.initialize();
        let n = self.fade_samples;
        let Some(ramp) = self.ramp.as_ref() else {
            return Ok(Some(chunk.to_vec()));
        };
        if chunk.len() <= 2 * n {
            return Ok(Some(chunk.to_vec()));
        }

        let mut buffer = i16_to_f32(chunk);
        let len = buffer.len();
        apply_gain_curve(&mut buffer[..n], ramp);
        for (sample, &g) in buffer[len - n..].iter_mut().zip(ramp.iter().rev()) {
            *sample *= g;
        }
        f32_to_i16(&buffer).map(Some)
    }

    fn reset_state(&mut self) {}

    fn describe(&self) -> ProcessorInfo {
        ProcessorInfo {
            name: NAME.to_string(),
            initialized: self.is_initialized(),
            params: vec![
                ("sample_rate", self.config.sample_rate.to_string()),
                ("fade_duration_ms", self.config.fade_duration_ms.to_string()),
            ],
        }
    }
}
