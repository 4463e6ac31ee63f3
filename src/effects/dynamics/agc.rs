use crate::core::audio_processor::{AudioProcessor, ProcessResult, ProcessorInfo};
use crate::core::error::ApmError;
use crate::core::sample_format::{db_to_linear, f32_to_i16, i16_to_f32, linear_to_db, rms};
use crate::effects::utility::gain::apply_gain;
use alloc::string::ToString;
use alloc::vec;
use log::{info, warn};
use serde::Deserialize;

const NAME: &str = "AGC";

/// Envelope level below which the AGC leaves the gain at unity.
const ENVELOPE_FLOOR: f32 = 1e-8;

/// Parameters of [`Agc`].
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct AgcConfig {
    pub sample_rate: u32,
    pub target_level_dbfs: f32,
    pub max_gain_db: f32,
    pub min_gain_db: f32,
    pub attack_time_ms: f32,
    pub release_time_ms: f32,
    /// 1.0 disables compression of loud input.
    pub ratio: f32,
    pub knee_width_db: f32,
}

impl Default for AgcConfig {
    fn default() -> Self {
        AgcConfig {
            sample_rate: 16000,
            target_level_dbfs: -18.0,
            max_gain_db: 20.0,
            min_gain_db: -20.0,
            attack_time_ms: 5.0,
            release_time_ms: 50.0,
            ratio: 4.0,
            knee_width_db: 2.0,
        }
    }
}

#[derive(Clone, Copy, Debug)]
struct AgcState {
    envelope: Option<f32>,
    gain: Option<f32>,
}

impl AgcState {
    const UNSEEDED: AgcState = AgcState {
        envelope: None,
        gain: None,
    };
}

/// Automatic gain control with soft-knee compression.
///
/// Works on whole chunks: the chunk RMS drives an attack/release envelope,
/// the envelope gives the gain that would hit the target level, loud input
/// has that gain compressed by `ratio` through a soft knee, and the result
/// is clamped to `[min_gain_db, max_gain_db]` and smoothed before it is
/// applied. Gain reductions follow the attack time, gain increases the
/// release time.
pub struct Agc {
    config: AgcConfig,
    target_linear: f32,
    min_gain: f32,
    max_gain: f32,
    attack_coeff: f32,
    release_coeff: f32,
    state: Option<AgcState>,
}

impl Agc {
    /// Creates a new AGC stage.
    ///
    /// # Errors
    /// Zero sample rate, non-positive time constants, a ratio below 1, a
    /// negative knee or `min_gain_db > max_gain_db`.
    pub fn new(config: AgcConfig) -> Result<Self, ApmError> {
        if config.sample_rate == 0 {
            return Err(ApmError::invalid_config(NAME, "sample rate must be positive"));
        }
        if !(config.attack_time_ms > 0.0 && config.release_time_ms > 0.0) {
            return Err(ApmError::invalid_config(NAME, "attack and release times must be positive"));
        }
        if !(config.ratio >= 1.0) {
            return Err(ApmError::invalid_config(NAME, "ratio must be at least 1"));
        }
        if !(config.knee_width_db >= 0.0) {
            return Err(ApmError::invalid_config(NAME, "knee width must not be negative"));
        }
        if !(config.min_gain_db <= config.max_gain_db) {
            return Err(ApmError::invalid_config(
                NAME,
                alloc::format!(
                    "min gain {} dB above max gain {} dB",
                    config.min_gain_db, config.max_gain_db
                ),
            ));
        }

        let fs = config.sample_rate as f32;
        Ok(Agc {
            target_linear: db_to_linear(config.target_level_dbfs),
            min_gain: db_to_linear(config.min_gain_db),
            max_gain: db_to_linear(config.max_gain_db),
            attack_coeff: libm::expf(-1.0 / (config.attack_time_ms * fs / 1000.0)),
            release_coeff: libm::expf(-1.0 / (config.release_time_ms * fs / 1000.0)),
            config,
            state: None,
        })
    }

    /// Gain currently applied, `1.0` before the first chunk.
    pub fn current_gain(&self) -> f32 {
        self.state.and_then(|s| s.gain).unwrap_or(1.0)
    }

    /// Compresses a gain given in dB.
    ///
    /// Positive gains (input quieter than target) pass unchanged, gains
    /// below `-knee/2` are divided by the ratio, and across `[-knee/2, 0]`
    /// the divisor moves linearly from 1 to the ratio.
    fn compress_db(&self, gain_db: f32) -> f32 {
        let ratio = self.config.ratio;
        if ratio <= 1.0 || gain_db >= 0.0 {
            return gain_db;
        }
        let half_knee = self.config.knee_width_db / 2.0;
        let knee_factor = if half_knee > 0.0 {
            (-gain_db / half_knee).min(1.0)
        } else {
            1.0
        };
        gain_db / (1.0 + knee_factor * (ratio - 1.0))
    }

    fn desired_gain(&self, envelope: f32) -> f32 {
        if envelope <= ENVELOPE_FLOOR {
            return 1.0;
        }
        let raw = self.target_linear / envelope;
        if !raw.is_finite() || raw <= 0.0 {
            warn!("{NAME}: invalid desired gain {raw}, using 1.0");
            return 1.0;
        }
        let compressed = db_to_linear(self.compress_db(linear_to_db(raw)));
        if !compressed.is_finite() {
            return 1.0;
        }
        compressed.clamp(self.min_gain, self.max_gain)
    }
}

impl AudioProcessor for Agc {
    fn name(&self) -> &str {
        NAME
    }

    fn initialize(&mut self) {
        if self.state.is_none() {
            self.state = Some(AgcState::UNSEEDED);
            info!(
                "{NAME}: initialized, target={}dBFS, ratio={}:1, attack={}ms, release={}ms",
                self.config.target_level_dbfs,
                self.config.ratio,
                self.config.attack_time_ms,
                self.config.release_time_ms
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

        let mut buffer = i16_to_f32(chunk);
        let level = rms(&buffer);
        let mut state = self.state.unwrap_or(AgcState::UNSEEDED);

        let envelope = match state.envelope {
            None => level,
            Some(env) => {
                let alpha = if level > env { self.attack_coeff } else { self.release_coeff };
                alpha * env + (1.0 - alpha) * level
            }
        };
        state.envelope = Some(envelope);

        let desired = self.desired_gain(envelope);
        let gain = match state.gain {
            None => desired,
            Some(current) => {
                let alpha = if desired < current { self.attack_coeff } else { self.release_coeff };
                alpha * current + (1.0 - alpha) * desired
            }
        };
        state.gain = Some(gain);
        self.state = Some(state);

        apply_gain(&mut buffer, gain);
        f32_to_i16(&buffer).map(Some)
    }

    fn reset_state(&mut self) {
        if self.state.is_some() {
            self.state = Some(AgcState::UNSEEDED);
        }
    }

    fn describe(&self) -> ProcessorInfo {
        ProcessorInfo {
            name: NAME.to_string(),
            initialized: self.is_initialized(),
            params: vec![
                ("sample_rate", self.config.sample_rate.to_string()),
                ("target_level_dbfs", self.config.target_level_dbfs.to_string()),
                ("max_gain_db", self.config.max_gain_db.to_string()),
                ("min_gain_db", self.config.min_gain_db.to_string()),
                ("attack_time_ms", self.config.attack_time_ms.to_string()),
                ("release_time_ms", self.config.release_time_ms.to_string()),
                ("ratio", self.config.ratio.to_string()),
                ("knee_width_db", self.config.knee_width_db.to_string()),
            ],
        }
    }
}
