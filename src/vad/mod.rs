//! Voice activity detection.
//!
//! A [`VoiceActivityDetector`] is the raw engine answering "is this frame
//! speech?". [`Vad`] wraps an engine with the fixed-frame contract the
//! pipeline stages rely on: only frames of exactly
//! `sample_rate * frame_duration_ms / 1000` samples are classified, and every
//! failure degrades to "not speech" instead of an error.

pub mod energy;

pub use energy::EnergyVad;

use crate::core::error::ApmError;
use crate::core::sample_format::decode_pcm16_le;
use alloc::boxed::Box;
use log::{error, info, warn};

/// Sample rates a [`Vad`] accepts.
pub const SUPPORTED_SAMPLE_RATES: [u32; 4] = [8000, 16000, 32000, 48000];
/// Frame durations a [`Vad`] accepts, in milliseconds.
pub const SUPPORTED_FRAME_DURATIONS_MS: [u32; 3] = [10, 20, 30];

const NAME: &str = "VAD";

/// A speech/non-speech classifier for one frame of mono PCM16.
pub trait VoiceActivityDetector {
    /// Classifies `frame`. The frame length has already been validated.
    fn classify(&mut self, frame: &[i16], sample_rate: u32) -> Result<bool, ApmError>;

    /// Forgets any history carried between frames.
    fn reset(&mut self);
}

impl<T: VoiceActivityDetector + ?Sized> VoiceActivityDetector for Box<T> {
    fn classify(&mut self, frame: &[i16], sample_rate: u32) -> Result<bool, ApmError> {
        (**self).classify(frame, sample_rate)
    }

    fn reset(&mut self) {
        (**self).reset();
    }
}

/// A detector bound to one sample rate and frame size.
pub struct Vad {
    detector: Box<dyn VoiceActivityDetector + Send>,
    sample_rate: u32,
    frame_duration_ms: u32,
    frame_size: usize,
}

impl Vad {
    /// Binds `detector` to a frame format.
    ///
    /// # Errors
    /// Unsupported sample rate or frame duration.
    pub fn new(
        detector: Box<dyn VoiceActivityDetector + Send>,
        sample_rate: u32,
        frame_duration_ms: u32,
    ) -> Result<Self, ApmError> {
        if !SUPPORTED_SAMPLE_RATES.contains(&sample_rate) {
            return Err(ApmError::invalid_config(
                NAME,
                alloc::format!("sample rate {sample_rate} Hz not supported, use 8000, 16000, 32000 or 48000"),
            ));
        }
        if !SUPPORTED_FRAME_DURATIONS_MS.contains(&frame_duration_ms) {
            return Err(ApmError::invalid_config(
                NAME,
                alloc::format!("frame duration {frame_duration_ms} ms not supported, use 10, 20 or 30"),
            ));
        }
        let frame_size = (sample_rate * frame_duration_ms / 1000) as usize;
        info!("{NAME}: sample_rate={sample_rate}Hz, frame_duration={frame_duration_ms}ms, frame_size={frame_size}");
        Ok(Vad {
            detector,
            sample_rate,
            frame_duration_ms,
            frame_size,
        })
    }

    /// Number of samples in a frame.
    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn frame_duration_ms(&self) -> u32 {
        self.frame_duration_ms
    }

    /// Classifies one frame. Wrong sizes and engine failures count as
    /// non-speech.
    pub fn is_speech(&mut self, frame: &[i16]) -> bool {
        if frame.len() != self.frame_size {
            let err = ApmError::FrameSizeMismatch {
                expected: self.frame_size,
                actual: frame.len(),
            };
            warn!("{NAME}: {err}");
            return false;
        }
        match self.detector.classify(frame, self.sample_rate) {
            Ok(speech) => speech,
            Err(err) => {
                error!("{NAME}: error in VAD processing: {err}");
                false
            }
        }
    }

    /// Classifies one frame of little-endian PCM16 bytes.
    pub fn is_speech_bytes(&mut self, bytes: &[u8]) -> bool {
        if bytes.len() != self.frame_size * 2 {
            warn!(
                "{NAME}: audio chunk size {} doesn't match expected frame size {}",
                bytes.len(),
                self.frame_size * 2
            );
            return false;
        }
        match decode_pcm16_le(bytes) {
            Ok(frame) => self.is_speech(&frame),
            Err(err) => {
                warn!("{NAME}: {err}");
                false
            }
        }
    }

    /// Clears the engine's history.
    pub fn reset(&mut self) {
        self.detector.reset();
    }
}
