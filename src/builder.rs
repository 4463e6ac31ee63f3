//! Configuration-driven pipeline assembly.
//!
//! [`build_pipeline`] turns a [`PipelineConfig`] into an [`AudioPipeline`]
//! with the enabled stages in this fixed order:
//!
//! ```text
//! DC removal -> high-pass -> declick -> noise suppression -> VAD gate
//!            -> AGC -> normalization -> edge fade
//! ```

use crate::core::error::ApmError;
use crate::core::pipeline::AudioPipeline;
use crate::effects::dynamics::agc::{Agc, AgcConfig};
use crate::effects::dynamics::normalization::{Normalization, NormalizationConfig};
use crate::effects::filter::dc_removal::{DcRemoval, DcRemovalConfig};
use crate::effects::filter::speech_highpass::{SpeechHighPass, SpeechHighPassConfig};
use crate::effects::restoration::declicking::{Declicking, DeclickingConfig};
use crate::effects::spectral::noise_suppression::{NoiseSuppression, NoiseSuppressionConfig};
use crate::effects::utility::edge_fade::{EdgeFade, EdgeFadeConfig};
use crate::effects::utility::vad_gate::VadGate;
use crate::vad::{EnergyVad, VoiceActivityDetector};
use alloc::boxed::Box;
use alloc::string::String;
use log::info;
use serde::Deserialize;

/// Aggressiveness of the detector that guides noise estimation.
const NOISE_VAD_AGGRESSIVENESS: u8 = 1;
/// STFT frame length of the noise suppressor.
const NOISE_FRAME_DURATION_MS: u32 = 10;

/// Which stages to build and how to parameterize them.
///
/// Every field is optional when deserializing; the default configuration
/// enables nothing and builds an empty (identity) pipeline.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub name: String,
    pub sample_rate: u32,
    /// DC removal cutoff in Hz; `None` skips the stage.
    pub dc_removal_cutoff_freq: Option<f32>,
    /// Speech high-pass cutoff in Hz; `None` skips the stage.
    pub high_pass_cutoff_freq: Option<f32>,
    pub declicking: bool,
    /// 0 (off) to 3 (strong).
    pub noise_suppression_level: u8,
    /// 0 to 3; `None` disables the VAD gate.
    pub vad_aggressiveness: Option<u8>,
    /// Chunk duration the VAD gate expects: 10, 20 or 30 ms.
    pub vad_frame_duration_ms: u32,
    pub agc_enabled: bool,
    pub agc: AgcConfig,
    pub normalization_enabled: bool,
    pub target_rms_dbfs: f32,
    pub peak_limit_dbfs: f32,
    pub edge_fade_enabled: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            name: String::from("SpeechPipeline"),
            sample_rate: 16000,
            dc_removal_cutoff_freq: None,
            high_pass_cutoff_freq: None,
            declicking: false,
            noise_suppression_level: 0,
            vad_aggressiveness: None,
            vad_frame_duration_ms: 30,
            agc_enabled: false,
            agc: AgcConfig::default(),
            normalization_enabled: false,
            target_rms_dbfs: -20.0,
            peak_limit_dbfs: -3.0,
            edge_fade_enabled: false,
        }
    }
}

impl PipelineConfig {
    /// The full speech chain for 16 kHz capture in 30 ms chunks.
    pub fn speech_preset() -> Self {
        PipelineConfig {
            dc_removal_cutoff_freq: Some(20.0),
            high_pass_cutoff_freq: Some(70.0),
            declicking: true,
            noise_suppression_level: 2,
            vad_aggressiveness: Some(2),
            vad_frame_duration_ms: 30,
            agc_enabled: true,
            agc: AgcConfig::default(),
            normalization_enabled: true,
            target_rms_dbfs: -20.0,
            peak_limit_dbfs: -3.0,
            edge_fade_enabled: true,
            ..Default::default()
        }
    }

    fn validate(&self) -> Result<(), ApmError> {
        if self.noise_suppression_level > 3 {
            return Err(ApmError::invalid_config(
                "PipelineConfig",
                alloc::format!("noise suppression level {} out of range 0..=3", self.noise_suppression_level),
            ));
        }
        if let Some(aggressiveness) = self.vad_aggressiveness {
            if aggressiveness > 3 {
                return Err(ApmError::invalid_config(
                    "PipelineConfig",
                    alloc::format!("VAD aggressiveness {aggressiveness} out of range 0..=3"),
                ));
            }
        }
        Ok(())
    }
}

/// Builds a pipeline using [`EnergyVad`] wherever a detector is needed.
///
/// # Errors
/// The first stage that rejects its configuration.
pub fn build_pipeline(config: &PipelineConfig) -> Result<AudioPipeline, ApmError> {
    build_pipeline_with(config, |aggressiveness| {
        let detector: Box<dyn VoiceActivityDetector + Send> = Box::new(EnergyVad::new(aggressiveness)?);
        Ok(detector)
    })
}

/// Builds a pipeline, creating voice activity engines with `make_detector`.
///
/// The factory receives the aggressiveness (0 to 3) of the detector it must
/// create. It is called once for the noise suppressor and once for the VAD
/// gate, as configured.
///
/// # Errors
/// The first stage (or detector) that rejects its configuration.
pub fn build_pipeline_with<F>(config: &PipelineConfig, make_detector: F) -> Result<AudioPipeline, ApmError>
where
    F: Fn(u8) -> Result<Box<dyn VoiceActivityDetector + Send>, ApmError>,
{
    config.validate()?;
    let sample_rate = config.sample_rate;
    let mut pipeline = AudioPipeline::new(config.name.clone());

    if let Some(cutoff_freq) = config.dc_removal_cutoff_freq {
        pipeline.add_processor(Box::new(DcRemoval::new(DcRemovalConfig {
            sample_rate,
            cutoff_freq,
        })?));
    }

    if let Some(cutoff_freq) = config.high_pass_cutoff_freq {
        pipeline.add_processor(Box::new(SpeechHighPass::new(SpeechHighPassConfig {
            sample_rate,
            cutoff_freq,
        })?));
    }

    if config.declicking {
        pipeline.add_processor(Box::new(Declicking::new(DeclickingConfig::default())?));
    }

    if config.noise_suppression_level > 0 {
        let detector = make_detector(NOISE_VAD_AGGRESSIVENESS)?;
        pipeline.add_processor(Box::new(NoiseSuppression::new(
            NoiseSuppressionConfig {
                sample_rate,
                level: config.noise_suppression_level,
                frame_duration_ms: NOISE_FRAME_DURATION_MS,
            },
            detector,
        )?));
    }

    if let Some(aggressiveness) = config.vad_aggressiveness {
        let detector = make_detector(aggressiveness)?;
        pipeline.add_processor(Box::new(VadGate::new(
            detector,
            aggressiveness,
            sample_rate,
            config.vad_frame_duration_ms,
        )?));
    }

    if config.agc_enabled {
        pipeline.add_processor(Box::new(Agc::new(AgcConfig {
            sample_rate,
            ..config.agc.clone()
        })?));
    }

    if config.normalization_enabled {
        pipeline.add_processor(Box::new(Normalization::new(NormalizationConfig {
            sample_rate,
            target_rms_dbfs: config.target_rms_dbfs,
            peak_limit_dbfs: config.peak_limit_dbfs,
            ..Default::default()
        })?));
    }

    if config.edge_fade_enabled {
        pipeline.add_processor(Box::new(EdgeFade::new(EdgeFadeConfig {
            sample_rate,
            ..Default::default()
        })?));
    }

    info!("{}: built with {} processors", pipeline.name(), pipeline.len());
    Ok(pipeline)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::sample_format::encode_pcm16_le;
    use alloc::vec;
    use alloc::vec::Vec;
    use core::cell::RefCell;
    use core::f32::consts::PI;

    fn tone_chunk(index: usize) -> Vec<i16> {
        (index * 480..(index + 1) * 480)
            .map(|n| libm::roundf(8000.0 * libm::sinf(2.0 * PI * 300.0 * n as f32 / 16000.0)) as i16)
            .collect()
    }

    #[test]
    fn test_default_config_is_identity() {
        let mut pipeline = build_pipeline(&PipelineConfig::default()).unwrap();
        assert!(pipeline.is_empty());
        let bytes = encode_pcm16_le(&[1, -1, 32767, -32768]);
        assert_eq!(pipeline.process_chunk(&bytes), Some(bytes.clone()));
    }

    #[test]
    fn test_speech_preset_stage_order() {
        let pipeline = build_pipeline(&PipelineConfig::speech_preset()).unwrap();
        let names: Vec<&str> = pipeline.processor_names().collect();
        assert_eq!(
            names,
            vec![
                "DCRemoval",
                "SpeechHighPass",
                "Declicking",
                "NoiseSuppression",
                "VAD",
                "AGC",
                "Normalization",
                "EdgeFade"
            ]
        );
    }

    #[test]
    fn test_silence_through_full_chain() {
        let config = PipelineConfig {
            vad_aggressiveness: None,
            ..PipelineConfig::speech_preset()
        };
        let mut pipeline = build_pipeline(&config).unwrap();
        for _ in 0..5 {
            assert_eq!(pipeline.process(&[0; 480]), Some(vec![0; 480]));
        }
    }

    #[test]
    fn test_gated_preset_drops_every_silent_chunk() {
        let mut pipeline = build_pipeline(&PipelineConfig::speech_preset()).unwrap();
        for _ in 0..5 {
            assert_eq!(pipeline.process(&[0; 480]), None);
        }
        let bytes = encode_pcm16_le(&[0; 480]);
        assert_eq!(pipeline.process_chunk(&bytes), None);
    }

    #[test]
    fn test_gated_preset_drops_silence_and_keeps_speech() {
        let mut pipeline = build_pipeline(&PipelineConfig::speech_preset()).unwrap();
        assert_eq!(pipeline.process(&[0; 480]), None);
        for i in 0..10 {
            let out = pipeline.process(&tone_chunk(i)).unwrap();
            assert_eq!(out.len(), 480);
        }
    }

    #[test]
    fn test_factory_receives_aggressiveness() {
        struct Never;
        impl VoiceActivityDetector for Never {
            fn classify(&mut self, _frame: &[i16], _sample_rate: u32) -> Result<bool, ApmError> {
                Ok(false)
            }
            fn reset(&mut self) {}
        }

        let requested = RefCell::new(Vec::new());
        let pipeline = build_pipeline_with(&PipelineConfig::speech_preset(), |aggressiveness| {
            requested.borrow_mut().push(aggressiveness);
            let detector: Box<dyn VoiceActivityDetector + Send> = Box::new(Never);
            Ok(detector)
        })
        .unwrap();
        assert_eq!(pipeline.len(), 8);
        assert_eq!(requested.into_inner(), vec![1, 2]);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = PipelineConfig {
            vad_aggressiveness: Some(4),
            ..Default::default()
        };
        assert!(matches!(build_pipeline(&config), Err(ApmError::InvalidConfig { .. })));

        let config = PipelineConfig {
            noise_suppression_level: 5,
            ..Default::default()
        };
        assert!(build_pipeline(&config).is_err());

        let config = PipelineConfig {
            sample_rate: 44100,
            ..PipelineConfig::speech_preset()
        };
        assert!(build_pipeline(&config).is_err());
    }

    #[test]
    fn test_config_from_toml() {
        let text = r#"
            sample_rate = 16000
            high_pass_cutoff_freq = 80.0
            noise_suppression_level = 1
            agc_enabled = true
            edge_fade_enabled = true

            [agc]
            target_level_dbfs = -16.0
            ratio = 2.0
        "#;
        let config: PipelineConfig = toml::from_str(text).unwrap();
        assert_eq!(config.high_pass_cutoff_freq, Some(80.0));
        assert_eq!(config.agc.target_level_dbfs, -16.0);
        assert_eq!(config.agc.attack_time_ms, 5.0);
        assert_eq!(config.vad_aggressiveness, None);

        let pipeline = build_pipeline(&config).unwrap();
        let names: Vec<&str> = pipeline.processor_names().collect();
        assert_eq!(names, vec!["SpeechHighPass", "NoiseSuppression", "AGC", "EdgeFade"]);
    }
}
