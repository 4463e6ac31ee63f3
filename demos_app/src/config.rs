use anyhow::{Context, Result};
use speech_apm::PipelineConfig;
use std::path::Path;

/// Loads a pipeline configuration from a TOML file, or the speech preset
/// when no file is given. The sample rate always comes from the audio
/// source.
pub fn load_pipeline_config(path: Option<&Path>, sample_rate: u32) -> Result<PipelineConfig> {
    let mut config = match path {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading pipeline config {}", path.display()))?;
            toml::from_str(&text).with_context(|| format!("parsing pipeline config {}", path.display()))?
        }
        None => PipelineConfig::speech_preset(),
    };
    config.sample_rate = sample_rate;
    Ok(config)
}

/// Samples in a chunk of `duration_ms` at `sample_rate`.
pub fn chunk_size(sample_rate: u32, duration_ms: u32) -> usize {
    (sample_rate as usize * duration_ms as usize) / 1000
}
