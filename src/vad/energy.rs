use super::VoiceActivityDetector;
use crate::core::error::ApmError;
use crate::core::sample_format::{linear_to_db, PCM16_SCALE};
use log::trace;

/// RMS thresholds in dBFS for aggressiveness 0 to 3.
const THRESHOLDS_DBFS: [f32; 4] = [-55.0, -50.0, -45.0, -40.0];
/// Frames still reported as speech after the level drops, per aggressiveness.
const HANGOVER_FRAMES: [u32; 4] = [8, 6, 4, 2];

/// Energy-based voice activity detector.
///
/// A frame is speech when its RMS level exceeds a threshold picked by the
/// aggressiveness (higher is stricter). After speech ends a short hangover
/// keeps word tails from being cut.
#[derive(Clone, Debug)]
pub struct EnergyVad {
    aggressiveness: u8,
    threshold_dbfs: f32,
    hangover_frames: u32,
    hangover_left: u32,
}

impl EnergyVad {
    /// Creates a detector.
    ///
    /// # Errors
    /// Aggressiveness above 3.
    pub fn new(aggressiveness: u8) -> Result<Self, ApmError> {
        let index = aggressiveness as usize;
        if index >= THRESHOLDS_DBFS.len() {
            return Err(ApmError::invalid_config(
                "EnergyVad",
                alloc::format!("aggressiveness {aggressiveness} out of range 0..=3"),
            ));
        }
        Ok(EnergyVad {
            aggressiveness,
            threshold_dbfs: THRESHOLDS_DBFS[index],
            hangover_frames: HANGOVER_FRAMES[index],
            hangover_left: 0,
        })
    }

    pub fn aggressiveness(&self) -> u8 {
        self.aggressiveness
    }

    pub fn threshold_dbfs(&self) -> f32 {
        self.threshold_dbfs
    }

    fn level_dbfs(frame: &[i16]) -> f32 {
        if frame.is_empty() {
            return f32::NEG_INFINITY;
        }
        let sum_sq: f32 = frame
            .iter()
            .map(|&s| {
                let x = s as f32 / PCM16_SCALE;
                x * x
            })
            .sum();
        let rms = libm::sqrtf(sum_sq / frame.len() as f32);
        if rms > 0.0 {
            linear_to_db(rms)
        } else {
            f32::NEG_INFINITY
        }
    }
}

impl VoiceActivityDetector for EnergyVad {
    fn classify(&mut self, frame: &[i16], _sample_rate: u32) -> Result<bool, ApmError> {
        let level = Self::level_dbfs(frame);
        if level > self.threshold_dbfs {
            self.hangover_left = self.hangover_frames;
            return Ok(true);
        }
        if self.hangover_left > 0 {
            self.hangover_left -= 1;
            trace!("EnergyVad: hangover, {} frames left", self.hangover_left);
            return Ok(true);
        }
        Ok(false)
    }

    fn reset(&mut self) {
        self.hangover_left = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    #[test]
    fn test_silence_and_loud_frames() {
        let mut vad = EnergyVad::new(3).unwrap();
        assert!(!vad.classify(&[0; 480], 16000).unwrap());
        assert!(vad.classify(&vec![3000; 480], 16000).unwrap());
    }

    #[test]
    fn test_hangover_then_silence() {
        let mut vad = EnergyVad::new(3).unwrap();
        assert!(vad.classify(&vec![3000; 160], 16000).unwrap());
        assert!(vad.classify(&[0; 160], 16000).unwrap());
        assert!(vad.classify(&[0; 160], 16000).unwrap());
        assert!(!vad.classify(&[0; 160], 16000).unwrap());
    }

    #[test]
    fn test_reset_clears_hangover() {
        let mut vad = EnergyVad::new(0).unwrap();
        assert!(vad.classify(&vec![3000; 160], 16000).unwrap());
        vad.reset();
        assert!(!vad.classify(&[0; 160], 16000).unwrap());
    }

    #[test]
    fn test_aggressiveness_moves_threshold() {
        // About -48 dBFS.
        let quiet = vec![130i16; 160];
        let lenient = EnergyVad::new(0).unwrap();
        let strict = EnergyVad::new(3).unwrap();
        assert_eq!((lenient.aggressiveness(), strict.aggressiveness()), (0, 3));
        assert!(lenient.threshold_dbfs() < strict.threshold_dbfs());
        assert!(EnergyVad::new(0).unwrap().classify(&quiet, 16000).unwrap());
        assert!(!EnergyVad::new(3).unwrap().classify(&quiet, 16000).unwrap());
        assert!(EnergyVad::new(4).is_err());
    }
}
