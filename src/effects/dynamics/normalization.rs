use crate::core::audio_processor::{AudioProcessor, ProcessResult, ProcessorInfo};
use crate::core::error::ApmError;
use crate::core::sample_format::{db_to_linear, f32_to_i16, i16_to_f32, linear_to_db, peak, rms};
use crate::effects::utility::gain::apply_gain;
use alloc::string::ToString;
use alloc::vec;
use log::{debug, info};
use serde::Deserialize;

const NAME: &str = "Normalization";

/// Chunk RMS below which the stage leaves the audio alone.
const MIN_RMS: f32 = 1e-8;

/// Parameters of [`Normalization`].
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct NormalizationConfig {
    pub sample_rate: u32,
    pub target_rms_dbfs: f32,
    pub peak_limit_dbfs: f32,
    /// Weight of the newest chunk in the gain average.
    pub ema_alpha: f32,
}

impl Default for NormalizationConfig {
    fn default() -> Self {
        NormalizationConfig {
            sample_rate: 16000,
            target_rms_dbfs: -20.0,
            peak_limit_dbfs: -3.0,
            ema_alpha: 0.1,
        }
    }
}

/// RMS normalization with a peak ceiling.
///
/// The gain is an exponential moving average of `target / chunk_rms`,
/// starting from unity. After the gain is applied, a chunk whose peak
/// exceeds the ceiling is scaled down to it.
pub struct Normalization {
    config: NormalizationConfig,
    target_linear: f32,
    peak_limit_linear: f32,
    gain_ema: f32,
    initialized: bool,
}

impl Normalization {
    /// Creates a new Normalization stage.
    ///
    /// # Errors
    /// `ema_alpha` outside `(0, 1]`.
    pub fn new(config: NormalizationConfig) -> Result<Self, ApmError> {
        if !(config.ema_alpha > 0.0 && config.ema_alpha <= 1.0) {
            return Err(ApmError::invalid_config(NAME, "EMA alpha must be within (0, 1]"));
        }
        Ok(Normalization {
            target_linear: db_to_linear(config.target_rms_dbfs),
            peak_limit_linear: db_to_linear(config.peak_limit_dbfs),
            config,
            gain_ema: 1.0,
            initialized: false,
        })
    }

    /// Current smoothed gain.
    pub fn gain(&self) -> f32 {
        self.gain_ema
    }

    pub fn peak_limit_linear(&self) -> f32 {
        self.peak_limit_linear
    }
}

impl AudioProcessor for Normalization {
    fn name(&self) -> &str {
        NAME
    }

    fn initialize(&mut self) {
        if !self.initialized {
            self.initialized = true;
            info!(
                "{NAME}: initialized, target_rms={}dBFS, peak_limit={}dBFS",
                self.config.target_rms_dbfs, self.config.peak_limit_dbfs
            );
        }
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }

    fn process(&mut self, chunk: &[i16]) -> ProcessResult {
        self.initialize();
        let mut buffer = i16_to_f32(chunk);

        let level = rms(&buffer);
        if level < MIN_RMS {
            debug!("{NAME}: audio signal too quiet for normalization");
            return Ok(Some(chunk.to_vec()));
        }

        let alpha = self.config.ema_alpha;
        self.gain_ema = (1.0 - alpha) * self.gain_ema + alpha * (self.target_linear / level);
        apply_gain(&mut buffer, self.gain_ema);

        let peak_value = peak(&buffer);
        if peak_value > self.peak_limit_linear {
            let limiting_ratio = self.peak_limit_linear / peak_value;
            apply_gain(&mut buffer, limiting_ratio);
            if limiting_ratio < 0.8 {
                debug!(
                    "{NAME}: applied peak limiting, {:.1}dB reduction",
                    linear_to_db(limiting_ratio)
                );
            }
        }

        f32_to_i16(&buffer).map(Some)
    }

    fn reset_state(&mut self) {
        self.gain_ema = 1.0;
    }

    fn describe(&self) -> ProcessorInfo {
        ProcessorInfo {
            name: NAME.to_string(),
            initialized: self.initialized,
            params: vec![
                ("sample_rate", self.config.sample_rate.to_string()),
                ("target_rms_dbfs", self.config.target_rms_dbfs.to_string()),
                ("peak_limit_dbfs", self.config.peak_limit_dbfs.to_string()),
                ("ema_alpha", self.config.ema_alpha.to_string()),
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec::Vec;
    use core::f32::consts::PI;

    /// 440 Hz tone with the given peak, 16 kHz.
    fn tone(len: usize, peak_linear: f32) -> Vec<i16> {
        (0..len)
            .map(|n| {
                let x = peak_linear * libm::sinf(2.0 * PI * 440.0 * n as f32 / 16000.0);
                libm::roundf(x * 32768.0) as i16
            })
            .collect()
    }

    fn level_db(samples: &[i16]) -> f32 {
        linear_to_db(rms(&i16_to_f32(samples)))
    }

    #[test]
    fn test_tone_settles_at_target_rms() {
        // -6 dBFS peak, 30 ms chunks, 1 s.
        let signal = tone(16000, 0.501);
        let mut norm = Normalization::new(NormalizationConfig::default()).unwrap();
        let mut last = Vec::new();
        for chunk in signal.chunks(480) {
            last = norm.process(chunk).unwrap().unwrap();
        }
        let level = level_db(&last);
        assert!((level + 20.0).abs() < 1.0, "final chunk at {level} dBFS");
    }

    #[test]
    fn test_gain_follows_ema() {
        let mut norm = Normalization::new(NormalizationConfig::default()).unwrap();
        let chunk = vec![3277i16; 480];
        norm.process(&chunk).unwrap();
        let instantaneous = db_to_linear(-20.0) / (3277.0 / 32768.0);
        let expected = 0.9 + 0.1 * instantaneous;
        assert!((norm.gain() - expected).abs() < 1e-4);
    }

    #[test]
    fn test_peak_never_exceeds_limit() {
        let mut norm = Normalization::new(NormalizationConfig::default()).unwrap();
        let limit = norm.peak_limit_linear() * 32768.0 + 1.0;
        let mut spiky = vec![50i16; 480];
        spiky[100] = 30000;
        spiky[300] = -32768;
        for chunk in [tone(480, 0.99), spiky, tone(480, 0.001)] {
            for _ in 0..10 {
                let out = norm.process(&chunk).unwrap().unwrap();
                assert!(out.iter().all(|&s| (s as f32).abs() <= limit));
            }
        }
    }

    #[test]
    fn test_silence_passes_through() {
        let mut norm = Normalization::new(NormalizationConfig::default()).unwrap();
        assert_eq!(norm.process(&[0; 480]).unwrap().unwrap(), vec![0; 480]);
        assert_eq!(norm.gain(), 1.0);
        assert_eq!(norm.process(&[]).unwrap().unwrap(), Vec::<i16>::new());
    }

    #[test]
    fn test_reset_restores_unity_gain() {
        let mut norm = Normalization::new(NormalizationConfig::default()).unwrap();
        let chunk = tone(480, 0.2);
        let first = norm.process(&chunk).unwrap().unwrap();
        norm.process(&chunk).unwrap();
        norm.reset_state();
        assert_eq!(norm.gain(), 1.0);
        assert_eq!(norm.process(&chunk).unwrap().unwrap(), first);
    }

    #[test]
    fn test_invalid_alpha() {
        assert!(Normalization::new(NormalizationConfig {
            ema_alpha: 0.0,
            ..Default::default()
        })
        .is_err());
    }
}
