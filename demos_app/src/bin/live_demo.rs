use anyhow::Result;
use clap::Parser;
use speech_apm::build_pipeline;
use speech_apm::core::sample_format::{i16_to_f32, linear_to_db, rms};
use speech_apm_demos::audio_backend::init_capture;
use speech_apm_demos::chunker::Chunker;
use speech_apm_demos::config::{chunk_size, load_pipeline_config};
use std::path::PathBuf;
use std::sync::mpsc;
use std::time::{Duration, Instant};

/// Runs the default microphone through the speech enhancement pipeline and
/// reports what happens to every chunk.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Pipeline configuration in TOML; the speech preset when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Chunk duration in milliseconds; must match the VAD frame duration.
    #[arg(long, default_value_t = 30)]
    chunk_ms: u32,
    /// Seconds to record.
    #[arg(long, default_value_t = 10)]
    seconds: u64,
}

fn level_dbfs(samples: &[i16]) -> f32 {
    linear_to_db(rms(&i16_to_f32(samples)).max(1e-10))
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let (tx, rx) = mpsc::channel();
    let (_stream, sample_rate) = init_capture(tx)?;

    let config = load_pipeline_config(args.config.as_deref(), sample_rate)?;
    let mut pipeline = build_pipeline(&config)?;
    let mut chunker = Chunker::new(chunk_size(sample_rate, args.chunk_ms));

    println!("Listening at {}Hz for {}s...", sample_rate, args.seconds);
    print!("{}", pipeline.get_graph());

    let deadline = Instant::now() + Duration::from_secs(args.seconds);
    let (mut passed, mut dropped) = (0usize, 0usize);
    while Instant::now() < deadline {
        let Ok(buffer) = rx.recv_timeout(Duration::from_millis(100)) else {
            continue;
        };
        chunker.push(&buffer, |chunk| match pipeline.process(chunk) {
            Some(out) => {
                passed += 1;
                println!(
                    "speech  in {:6.1} dBFS -> out {:6.1} dBFS",
                    level_dbfs(chunk),
                    level_dbfs(&out)
                );
            }
            None => {
                dropped += 1;
                println!("dropped in {:6.1} dBFS", level_dbfs(chunk));
            }
        });
    }

    println!("{} chunks passed, {} dropped", passed, dropped);
    Ok(())
}
