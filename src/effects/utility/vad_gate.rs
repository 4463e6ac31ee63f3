use crate::core::audio_processor::{AudioProcessor, ProcessResult, ProcessorInfo};
use crate::core::error::ApmError;
use crate::vad::{Vad, VoiceActivityDetector};
use alloc::boxed::Box;
use alloc::string::ToString;
use alloc::vec;
use log::{debug, info};

const NAME: &str = "VAD";

/// Drops chunks that carry no speech.
///
/// Speech chunks leave the stage unchanged. Non-speech chunks, and chunks
/// whose length differs from the VAD frame size, are dropped.
pub struct VadGate {
    vad: Vad,
    aggressiveness: u8,
    initialized: bool,
}

impl VadGate {
    /// Creates a gate around `detector`.
    ///
    /// # Arguments
    /// * `detector` - The classification engine.
    /// * `aggressiveness` - Recorded for [`AudioProcessor::describe`].
    /// * `sample_rate` - 8000, 16000, 32000 or 48000 Hz.
    /// * `frame_duration_ms` - 10, 20 or 30 ms; chunks must have exactly
    ///   this duration.
    pub fn new(
        detector: Box<dyn VoiceActivityDetector + Send>,
        aggressiveness: u8,
        sample_rate: u32,
        frame_duration_ms: u32,
    ) -> Result<Self, ApmError> {
        Ok(VadGate {
            vad: Vad::new(detector, sample_rate, frame_duration_ms)?,
            aggressiveness,
            initialized: false,
        })
    }

    /// Samples per chunk the gate expects.
    pub fn frame_size(&self) -> usize {
        self.vad.frame_size()
    }
}

impl AudioProcessor for VadGate {
    fn name(&self) -> &str {
        NAME
    }

    fn initialize(&mut self) {
        if !self.initialized {
            self.initialized = true;
            info!(
                "{NAME}: initialized, aggressiveness={}, chunk_size={}",
                self.aggressiveness,
                self.vad.frame_size()
            );
        }
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }

    fn process(&mut self, chunk: &[i16]) -> ProcessResult {
        self.initialize();
        if self.vad.is_speech(chunk) {
            Ok(Some(chunk.to_vec()))
        } else {
            debug!("{NAME}: no speech, dropping {} samples", chunk.len());
            Ok(None)
        }
    }

    fn reset_state(&mut self) {
        self.vad.reset();
    }

    fn describe(&self) -> ProcessorInfo {
        ProcessorInfo {
            name: NAME.to_string(),
            initialized: self.initialized,
            params: vec![
                ("aggressiveness", self.aggressiveness.to_string()),
                ("sample_rate", self.vad.sample_rate().to_string()),
                ("chunk_size", self.vad.frame_size().to_string()),
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vad::EnergyVad;

    fn gate() -> VadGate {
        VadGate::new(Box::new(EnergyVad::new(2).unwrap()), 2, 16000, 30).unwrap()
    }

    #[test]
    fn test_speech_passes_unchanged() {
        let mut gate = gate();
        let chunk: alloc::vec::Vec<i16> = (0..480).map(|i| ((i % 40) as i16 - 20) * 300).collect();
        assert_eq!(gate.process(&chunk).unwrap(), Some(chunk.clone()));
    }

    #[test]
    fn test_silence_is_dropped() {
        let mut gate = gate();
        assert_eq!(gate.process(&[0; 480]).unwrap(), None);
    }

    #[test]
    fn test_wrong_size_is_dropped() {
        let mut gate = gate();
        assert_eq!(gate.frame_size(), 480);
        assert_eq!(gate.process(&vec![8000; 479]).unwrap(), None);
    }

    #[test]
    fn test_reset_clears_hangover() {
        let mut gate = gate();
        gate.process(&vec![8000; 480]).unwrap();
        gate.reset_state();
        assert_eq!(gate.process(&[0; 480]).unwrap(), None);
    }
}
