use crate::core::audio_processor::{AudioProcessor, ProcessResult, ProcessorInfo};
use crate::core::error::ApmError;
use crate::core::sample_format::{f32_to_i16, i16_to_f32, PCM16_SCALE};
use crate::core::spectral::{hann_window_with_floor, SpectralBuffer};
use crate::vad::{Vad, VoiceActivityDetector};
use alloc::boxed::Box;
use alloc::string::ToString;
use alloc::vec;
use alloc::vec::Vec;
use log::info;
use serde::Deserialize;

const NAME: &str = "NoiseSuppression";

const WINDOW_FLOOR: f32 = 0.01;
const MIN_GAIN: f32 = 0.15;
const GAIN_SMOOTHING: f32 = 0.7;
const SPEECH_SEED_FACTOR: f32 = 0.3;
const PSD_FLOOR: f32 = 1e-10;
const EPS: f32 = 1e-10;
const WIN_SUM_FLOOR: f32 = 1e-8;

/// Parameters of [`NoiseSuppression`].
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct NoiseSuppressionConfig {
    pub sample_rate: u32,
    /// 0 = off, 1 = light, 2 = moderate, 3 = strong.
    pub level: u8,
    /// STFT frame length; also the VAD frame duration (10, 20 or 30 ms).
    pub frame_duration_ms: u32,
}

impl Default for NoiseSuppressionConfig {
    fn default() -> Self {
        NoiseSuppressionConfig {
            sample_rate: 16000,
            level: 1,
            frame_duration_ms: 10,
        }
    }
}

/// Over-subtraction strength and noise PSD smoothing for a level.
fn level_params(level: u8) -> (f32, f32) {
    match level {
        0 => (0.0, 0.0),
        1 => (0.6, 0.12),
        2 => (0.85, 0.08),
        _ => (1.0, 0.05),
    }
}

struct NoiseSuppressionState {
    fft: SpectralBuffer,
    window: Vec<f32>,
    noise_psd: Option<Vec<f32>>,
    prev_gain: Option<Vec<f32>>,
    power: Vec<f32>,
    gain: Vec<f32>,
}

/// VAD-guided spectral noise suppression.
///
/// Each chunk is cut into Hann windowed frames with 75% overlap. Frames the
/// VAD calls non-speech update a running noise power estimate; every frame
/// then gets a Wiener-style gain per bin, smoothed against the previous
/// frame's gain, and is overlap-added back with window-sum normalization.
///
/// The noise estimate and the previous gain carry over between chunks. The
/// overlap-add accumulators do not: each chunk is reconstructed on its own.
pub struct NoiseSuppression {
    config: NoiseSuppressionConfig,
    vad: Vad,
    frame_size: usize,
    hop: usize,
    strength: f32,
    smoothing: f32,
    state: Option<NoiseSuppressionState>,
}

impl NoiseSuppression {
    /// Creates a new NoiseSuppression stage.
    ///
    /// # Arguments
    /// * `config` - Stage parameters.
    /// * `detector` - Engine classifying each STFT frame for noise tracking.
    ///
    /// # Errors
    /// Level above 3, a frame format the VAD does not support, or a frame
    /// longer than 1024 samples.
    pub fn new(
        config: NoiseSuppressionConfig,
        detector: Box<dyn VoiceActivityDetector + Send>,
    ) -> Result<Self, ApmError> {
        if config.level > 3 {
            return Err(ApmError::invalid_config(
                NAME,
                alloc::format!("level {} out of range 0..=3", config.level),
            ));
        }
        let vad = Vad::new(detector, config.sample_rate, config.frame_duration_ms)?;
        let frame_size = vad.frame_size();
        if frame_size == 0 || frame_size > 1024 {
            return Err(ApmError::invalid_config(
                NAME,
                alloc::format!("frame size {frame_size} must be within 1..=1024 samples"),
            ));
        }
        let (strength, smoothing) = level_params(config.level);
        Ok(NoiseSuppression {
            hop: (frame_size / 4).max(1),
            frame_size,
            strength,
            smoothing,
            config,
            vad,
            state: None,
        })
    }

    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    pub fn hop(&self) -> usize {
        self.hop
    }

    fn enabled(&self) -> bool {
        self.config.level > 0 && self.strength > 0.0
    }
}

impl AudioProcessor for NoiseSuppression {
    fn name(&self) -> &str {
        NAME
    }

    fn initialize(&mut self) {
        if self.state.is_some() {
            return;
        }
        if !self.enabled() {
            info!("{NAME}: disabled");
        }
        let Ok(fft) = SpectralBuffer::for_frame(self.frame_size) else {
            return;
        };
        let bins = fft.num_bins();
        self.state = Some(NoiseSuppressionState {
            window: hann_window_with_floor(self.frame_size, WINDOW_FLOOR),
            fft,
            noise_psd: None,
            prev_gain: None,
            power: Vec::with_capacity(bins),
            gain: vec![0.0; bins],
        });
        info!(
            "{NAME}: initialized, level={}, frame_size={} samples",
            self.config.level, self.frame_size
        );
    }

    fn is_initialized(&self) -> bool {
        self.state.is_some()
    }

    fn process(&mut self, chunk: &[i16]) -> ProcessResult {
        self.initialize();
        if !self.enabled() || chunk.is_empty() {
            return Ok(Some(chunk.to_vec()));
        }
        let frame_size = self.frame_size;
        let (hop, strength, smoothing) = (self.hop, self.strength, self.smoothing);
        let Some(state) = self.state.as_mut() else {
            return Err(ApmError::Fft { size: frame_size });
        };

        let input = i16_to_f32(chunk);
        let len = input.len();
        let mut out = vec![0.0f32; len + frame_size];
        let mut win_sum = vec![0.0f32; len + frame_size];
        let mut frame = vec![0.0f32; frame_size];
        let mut vad_frame = vec![0i16; frame_size];

        let mut start = 0;
        while start < len {
            let copy_len = frame_size.min(len - start);
            frame.fill(0.0);
            frame[..copy_len].copy_from_slice(&input[start..start + copy_len]);

            for (v, &s) in vad_frame.iter_mut().zip(frame.iter()) {
                *v = (s * PCM16_SCALE) as i16;
            }
            let is_speech = self.vad.is_speech(&vad_frame);

            for (f, &w) in frame.iter_mut().zip(state.window.iter()) {
                *f *= w;
            }
            state.fft.load_real(&frame)?;
            state.fft.forward();
            state.fft.power_spectrum(&mut state.power);

            let noise_psd = state.noise_psd.get_or_insert_with(|| {
                let seed = if is_speech { SPEECH_SEED_FACTOR } else { 1.0 };
                state.power.iter().map(|&p| (p * seed).max(PSD_FLOOR)).collect()
            });
            if !is_speech {
                for (n, &p) in noise_psd.iter_mut().zip(state.power.iter()) {
                    *n = (1.0 - smoothing) * *n + smoothing * p;
                }
            }

            for ((g, &p), &n) in state.gain.iter_mut().zip(state.power.iter()).zip(noise_psd.iter()) {
                *g = (p / (p + strength * n + EPS)).clamp(MIN_GAIN, 1.0);
            }
            match state.prev_gain.as_mut() {
                Some(prev) => {
                    for (g, p) in state.gain.iter_mut().zip(prev.iter_mut()) {
                        *g = GAIN_SMOOTHING * *g + (1.0 - GAIN_SMOOTHING) * *p;
                        *p = *g;
                    }
                }
                None => state.prev_gain = Some(state.gain.clone()),
            }

            for g in state.gain.iter_mut() {
                *g = libm::sqrtf(*g);
            }
            state.fft.apply_real_gains(&state.gain);
            state.fft.inverse();

            let enhanced = &state.fft.bins()[..frame_size];
            for (i, (c, &w)) in enhanced.iter().zip(state.window.iter()).enumerate() {
                out[start + i] += c.re * w;
                win_sum[start + i] += w;
            }

            start += hop;
        }

        for (o, &w) in out.iter_mut().zip(win_sum.iter()) {
            if w > WIN_SUM_FLOOR {
                *o /= w;
            }
        }
        out.truncate(len);

        f32_to_i16(&out).map(Some)
    }

    fn reset_state(&mut self) {
        if let Some(state) = self.state.as_mut() {
            state.noise_psd = None;
            state.prev_gain = None;
        }
        self.vad.reset();
    }

    fn describe(&self) -> ProcessorInfo {
        ProcessorInfo {
            name: NAME.to_string(),
            initialized: self.is_initialized(),
            params: vec![
                ("sample_rate", self.config.sample_rate.to_string()),
                ("level", self.config.level.to_string()),
                ("frame_duration_ms", self.config.frame_duration_ms.to_string()),
            ],
        }
    }
}
