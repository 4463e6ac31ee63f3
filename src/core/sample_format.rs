//! Conversions between the PCM16 wire format and the float domain the
//! processors work in, plus the level helpers shared by the stages.

use crate::core::error::ApmError;
use alloc::vec::Vec;

/// Scale between `i16` and `[-1.0, 1.0)`.
pub const PCM16_SCALE: f32 = 32768.0;

const PCM16_MAX: f32 = 32767.0;
const PCM16_MIN: f32 = -32768.0;

/// Magnitude above which the soft clipper starts bending the curve.
const SOFT_CLIP_KNEE: f32 = PCM16_MAX * 0.95;

/// Converts PCM16 samples to `f32` in `[-1.0, 1.0)` (`x / 32768`).
pub fn i16_to_f32(samples: &[i16]) -> Vec<f32> {
    samples.iter().map(|&s| s as f32 / PCM16_SCALE).collect()
}

/// Converts `f32` samples back to PCM16.
///
/// Values are scaled by 32768, soft clipped near full scale and rounded to
/// the nearest integer. The soft clipper is continuous at its knee, so a
/// signal crossing it never jumps.
///
/// # Errors
/// Returns [`ApmError::NonFiniteSample`] for the first NaN or infinite value.
pub fn f32_to_i16(samples: &[f32]) -> Result<Vec<i16>, ApmError> {
    let mut out = Vec::with_capacity(samples.len());
    for (index, &s) in samples.iter().enumerate() {
        if !s.is_finite() {
            return Err(ApmError::NonFiniteSample { index });
        }
        let scaled = soft_clip(s * PCM16_SCALE);
        out.push(libm::roundf(scaled.clamp(PCM16_MIN, PCM16_MAX)) as i16);
    }
    Ok(out)
}

fn soft_clip(scaled: f32) -> f32 {
    let magnitude = libm::fabsf(scaled);
    if magnitude <= SOFT_CLIP_KNEE {
        return scaled;
    }
    let headroom = PCM16_MAX - SOFT_CLIP_KNEE;
    let bent = SOFT_CLIP_KNEE + headroom * libm::tanhf((magnitude - SOFT_CLIP_KNEE) / headroom);
    libm::copysignf(bent, scaled)
}

/// Decodes little-endian PCM16 bytes.
///
/// # Errors
/// Returns [`ApmError::OddByteLength`] when the payload is not a whole number
/// of samples.
pub fn decode_pcm16_le(bytes: &[u8]) -> Result<Vec<i16>, ApmError> {
    if bytes.len() % 2 != 0 {
        return Err(ApmError::OddByteLength { len: bytes.len() });
    }
    Ok(bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect())
}

/// Encodes samples as little-endian PCM16 bytes.
pub fn encode_pcm16_le(samples: &[i16]) -> Vec<u8> {
    let mut out = Vec::with_capacity(samples.len() * 2);
    for s in samples {
        out.extend_from_slice(&s.to_le_bytes());
    }
    out
}

/// Converts decibels (relative to full scale) to a linear factor.
#[inline]
pub fn db_to_linear(db: f32) -> f32 {
    libm::powf(10.0, db / 20.0)
}

/// Converts a linear factor to decibels.
#[inline]
pub fn linear_to_db(linear: f32) -> f32 {
    20.0 * libm::log10f(linear)
}

/// Root-mean-square level of a buffer; `0.0` for an empty one.
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_sq: f32 = samples.iter().map(|s| s * s).sum();
    libm::sqrtf(sum_sq / samples.len() as f32)
}

/// Largest absolute sample value; `0.0` for an empty buffer.
pub fn peak(samples: &[f32]) -> f32 {
    samples.iter().fold(0.0_f32, |acc, &s| acc.max(libm::fabsf(s)))
}
