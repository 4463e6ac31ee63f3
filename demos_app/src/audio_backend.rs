use anyhow::{anyhow, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::Sample;
use std::sync::mpsc;

/// Converts one frame of device samples to mono PCM16.
fn downmix<T>(frame: &[T]) -> i16
where
    T: cpal::Sample,
    f32: cpal::FromSample<T>,
{
    let sum: f32 = frame.iter().map(|s| s.to_sample::<f32>()).sum();
    let mono = sum / frame.len() as f32;
    (mono * 32768.0).clamp(-32768.0, 32767.0) as i16
}

/// Opens the default input device and streams mono PCM16 buffers into `tx`.
///
/// Returns the running stream (keep it alive while recording) and the
/// device sample rate.
pub fn init_capture(tx: mpsc::Sender<Vec<i16>>) -> Result<(cpal::Stream, u32)> {
    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .ok_or_else(|| anyhow!("No input device available"))?;
    let config = device.default_input_config()?;
    let sample_rate = config.sample_rate();

    let err_fn = |err| log::error!("an error occurred on stream: {}", err);

    let stream = match config.sample_format() {
        cpal::SampleFormat::F32 => run_capture::<f32>(&device, &config.into(), tx, err_fn)?,
        cpal::SampleFormat::I16 => run_capture::<i16>(&device, &config.into(), tx, err_fn)?,
        cpal::SampleFormat::U16 => run_capture::<u16>(&device, &config.into(), tx, err_fn)?,
        _ => return Err(anyhow!("Unsupported sample format")),
    };
    stream.play()?;

    Ok((stream, sample_rate))
}

fn run_capture<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    tx: mpsc::Sender<Vec<i16>>,
    err_fn: impl Fn(cpal::StreamError) + Send + 'static,
) -> Result<cpal::Stream>
where
    T: cpal::Sample + cpal::SizedSample,
    f32: cpal::FromSample<T>,
{
    let channels = config.channels as usize;

    let stream = device.build_input_stream(
        config,
        move |data: &[T], _: &cpal::InputCallbackInfo| {
            let mono: Vec<i16> = data.chunks(channels).map(downmix).collect();
            // The receiver is gone once the demo stops.
            let _ = tx.send(mono);
        },
        err_fn,
        None,
    )?;

    Ok(stream)
}
