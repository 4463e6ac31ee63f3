use anyhow::{bail, Context, Result};
use clap::Parser;
use speech_apm::build_pipeline;
use speech_apm_demos::config::{chunk_size, load_pipeline_config};
use std::path::{Path, PathBuf};

/// Runs a WAV file through the speech enhancement pipeline.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Input WAV file (any channel count, 16-bit or float).
    input: PathBuf,
    /// Output WAV file (mono, 16-bit).
    output: PathBuf,
    /// Pipeline configuration in TOML; the speech preset when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Chunk duration in milliseconds.
    #[arg(long, default_value_t = 30)]
    chunk_ms: u32,
    /// Write silence for dropped chunks instead of leaving them out.
    #[arg(long)]
    keep_timing: bool,
}

fn read_mono(path: &Path) -> Result<(Vec<i16>, u32)> {
    let mut reader = hound::WavReader::open(path).with_context(|| format!("opening {}", path.display()))?;
    let spec = reader.spec();
    let channels = spec.channels as usize;

    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader.samples::<f32>().collect::<Result<_, _>>()?,
        hound::SampleFormat::Int => {
            let scale = (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<Result<_, _>>()?
        }
    };

    let mono = interleaved
        .chunks(channels)
        .map(|frame| {
            let mean = frame.iter().sum::<f32>() / frame.len() as f32;
            (mean * 32768.0).clamp(-32768.0, 32767.0) as i16
        })
        .collect();
    Ok((mono, spec.sample_rate))
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let (samples, sample_rate) = read_mono(&args.input)?;
    let config = load_pipeline_config(args.config.as_deref(), sample_rate)?;
    let mut pipeline = build_pipeline(&config)?;
    print!("{}", pipeline.get_graph());

    let chunk_len = chunk_size(sample_rate, args.chunk_ms);
    if chunk_len == 0 {
        bail!("chunk of {} ms is empty at {} Hz", args.chunk_ms, sample_rate);
    }

    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(&args.output, spec)
        .with_context(|| format!("creating {}", args.output.display()))?;

    let (mut passed, mut dropped) = (0usize, 0usize);
    for chunk in samples.chunks(chunk_len) {
        match pipeline.process(chunk) {
            Some(out) => {
                passed += 1;
                for s in out {
                    writer.write_sample(s)?;
                }
            }
            None => {
                dropped += 1;
                if args.keep_timing {
                    for _ in 0..chunk.len() {
                        writer.write_sample(0i16)?;
                    }
                }
            }
        }
    }
    writer.finalize()?;

    println!(
        "Processed {} samples at {}Hz: {} chunks passed, {} dropped -> {}",
        samples.len(),
        sample_rate,
        passed,
        dropped,
        args.output.display()
    );

    Ok(())
}
