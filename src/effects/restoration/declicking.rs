use crate::core::audio_processor::{AudioProcessor, ProcessResult, ProcessorInfo};
use crate::core::error::ApmError;
use crate::core::sample_format::{f32_to_i16, i16_to_f32};
use alloc::string::ToString;
use alloc::vec;
use alloc::vec::Vec;
use log::info;
use serde::Deserialize;

const NAME: &str = "Declicking";

/// Chunks shorter than this use the per-sample loop.
const SIMPLE_PATH_MAX_LEN: usize = 100;
/// Rows gathered per block on the blocked path.
const BLOCK_SIZE: usize = 1000;
/// Keeps the MAD strictly positive on flat windows.
const MAD_FLOOR: f32 = 1e-8;

/// Parameters of [`Declicking`].
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct DeclickingConfig {
    /// Neighbourhood size including the centre sample. Even values are
    /// bumped to the next odd one.
    pub window_size: usize,
    /// Outlier threshold in multiples of the local MAD.
    pub mad_threshold: f32,
}

impl Default for DeclickingConfig {
    fn default() -> Self {
        DeclickingConfig {
            window_size: 5,
            mad_threshold: 6.0,
        }
    }
}

/// Replaces single-sample clicks with the median of their neighbourhood.
///
/// For every sample at least `half = window_size / 2` samples away from both
/// chunk edges, the median and MAD of the surrounding window (centre
/// excluded) are computed; a sample further than `mad_threshold * MAD` from
/// the median is replaced by the median.
///
/// The stage keeps no history, so the `half` samples at each chunk edge are
/// never examined and a click sitting right on a chunk boundary survives.
pub struct Declicking {
    config: DeclickingConfig,
    window_size: usize,
    half: usize,
    initialized: bool,
}

impl Declicking {
    /// Creates a new Declicking stage.
    ///
    /// # Errors
    /// A window smaller than 3 or a non-positive threshold.
    pub fn new(config: DeclickingConfig) -> Result<Self, ApmError> {
        let window_size = if config.window_size % 2 == 1 {
            config.window_size
        } else {
            config.window_size + 1
        };
        if window_size < 3 {
            return Err(ApmError::invalid_config(NAME, "window size must be at least 3"));
        }
        if !(config.mad_threshold.is_finite() && config.mad_threshold > 0.0) {
            return Err(ApmError::invalid_config(NAME, "MAD threshold must be positive"));
        }
        Ok(Declicking {
            config,
            window_size,
            half: window_size / 2,
            initialized: false,
        })
    }

    /// Effective (odd) window size.
    pub fn window_size(&self) -> usize {
        self.window_size
    }
}

/// Median of `values`, reordering them. Even counts average the two middle
/// values.
fn median_in_place(values: &mut [f32]) -> f32 {
    values.sort_unstable_by(f32::total_cmp);
    let n = values.len();
    if n % 2 == 1 {
        values[n / 2]
    } else {
        (values[n / 2 - 1] + values[n / 2]) * 0.5
    }
}

/// Median and MAD of one window row. `scratch` must have the row's length.
fn median_and_mad(row: &mut [f32], scratch: &mut [f32]) -> (f32, f32) {
    let med = median_in_place(row);
    for (d, &v) in scratch.iter_mut().zip(row.iter()) {
        *d = libm::fabsf(v - med);
    }
    (med, median_in_place(scratch) + MAD_FLOOR)
}

/// Copies the neighbourhood of `pos` (centre excluded) into `row`.
fn gather_window(input: &[f32], pos: usize, half: usize, row: &mut [f32]) {
    row[..half].copy_from_slice(&input[pos - half..pos]);
    row[half..].copy_from_slice(&input[pos + 1..pos + 1 + half]);
}

pub(crate) fn declick_simple(input: &[f32], half: usize, threshold: f32) -> Vec<f32> {
    let mut output = input.to_vec();
    let mut row = vec![0.0; 2 * half];
    let mut scratch = vec![0.0; 2 * half];

    for i in half..input.len().saturating_sub(half) {
        gather_window(input, i, half, &mut row);
        let (med, mad) = median_and_mad(&mut row, &mut scratch);
        if libm::fabsf(input[i] - med) > threshold * mad {
            output[i] = med;
        }
    }
    output
}

pub(crate) fn declick_blocked(input: &[f32], half: usize, threshold: f32) -> Vec<f32> {
    let mut output = input.to_vec();
    let width = 2 * half;
    let end_all = input.len().saturating_sub(half);
    let mut rows = vec![0.0; BLOCK_SIZE * width];
    let mut medians = vec![0.0; BLOCK_SIZE];
    let mut mads = vec![0.0; BLOCK_SIZE];
    let mut scratch = vec![0.0; width];

    let mut start = half;
    while start < end_all {
        let end = (start + BLOCK_SIZE).min(end_all);
        let count = end - start;

        for (r, pos) in (start..end).enumerate() {
            gather_window(input, pos, half, &mut rows[r * width..(r + 1) * width]);
        }

        for r in 0..count {
            let (med, mad) = median_and_mad(&mut rows[r * width..(r + 1) * width], &mut scratch);
            medians[r] = med;
            mads[r] = mad;
        }

        for r in 0..count {
            let pos = start + r;
            if libm::fabsf(input[pos] - medians[r]) > threshold * mads[r] {
                output[pos] = medians[r];
            }
        }

        start = end;
    }
    output
}

impl AudioProcessor for Declicking {
    fn name(&self) -> &str {
        NAME
    }

    fn initialize(&mut self) {
        if !self.initialized {
            self.initialized = true;
            info!(
                "{NAME}: initialized, window_size={}, mad_threshold={}",
                self.window_size, self.config.mad_threshold
            );
        }
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }

    fn process(&mut self, chunk: &[i16]) -> ProcessResult {
        self.initialize();
        if chunk.len() < 3 {
            return Ok(Some(chunk.to_vec()));
        }

        let input = i16_to_f32(chunk);
        let output = if input.len() < SIMPLE_PATH_MAX_LEN {
            declick_simple(&input, self.half, self.config.mad_threshold)
        } else {
            declick_blocked(&input, self.half, self.config.mad_threshold)
        };
        f32_to_i16(&output).map(Some)
    }

    fn reset_state(&mut self) {}

    fn describe(&self) -> ProcessorInfo {
        ProcessorInfo {
            name: NAME.to_string(),
            initialized: self.initialized,
            params: vec![
                ("window_size", self.window_size.to_string()),
                ("mad_threshold", self.config.mad_threshold.to_string()),
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(len: usize) -> Vec<i16> {
        (0..len).map(|i| 1000 + 10 * i as i16).collect()
    }

    #[test]
    fn test_interior_spike_replaced_by_median() {
        let mut dc = Declicking::new(DeclickingConfig::default()).unwrap();
        let mut chunk = ramp(40);
        chunk[10] = 20000;
        let out = dc.process(&chunk).unwrap().unwrap();
        // Neighbours 1080, 1090, 1110, 1120 -> median 1100.
        assert_eq!(out[10], 1100);
        for (i, (&o, &c)) in out.iter().zip(chunk.iter()).enumerate() {
            if i != 10 {
                assert_eq!(o, c, "sample {i} changed");
            }
        }
    }

    #[test]
    fn test_edge_outliers_untouched() {
        let mut dc = Declicking::new(DeclickingConfig::default()).unwrap();
        let mut chunk = ramp(40);
        chunk[0] = -20000;
        chunk[1] = 20000;
        chunk[38] = 20000;
        chunk[39] = -20000;
        let out = dc.process(&chunk).unwrap().unwrap();
        assert_eq!(out, chunk);
    }

    #[test]
    fn test_long_chunk_uses_blocked_path() {
        let mut dc = Declicking::new(DeclickingConfig::default()).unwrap();
        let mut chunk: Vec<i16> = (0..2500)
            .map(|i| libm::roundf(3000.0 * libm::sinf(i as f32 * 0.05)) as i16)
            .collect();
        for &pos in &[2usize, 500, 999, 1003, 1500, 2497] {
            chunk[pos] = 25000;
        }
        let out = dc.process(&chunk).unwrap().unwrap();
        assert_eq!(out.len(), chunk.len());
        for &pos in &[500usize, 999, 1003, 1500, 2497] {
            assert!(out[pos].abs() < 4000, "spike at {pos} survived: {}", out[pos]);
        }
    }

    #[test]
    fn test_simple_and_blocked_paths_agree() {
        let mut input: Vec<f32> = (0..2300)
            .map(|i| 0.1 * libm::sinf(i as f32 * 0.031) + 0.01 * libm::sinf(i as f32 * 1.7))
            .collect();
        for pos in (7..2300).step_by(211) {
            input[pos] = 0.9;
        }
        for half in [1usize, 2, 3] {
            assert_eq!(
                declick_simple(&input, half, 6.0),
                declick_blocked(&input, half, 6.0)
            );
        }
    }

    #[test]
    fn test_flat_signal_and_short_chunks_unchanged() {
        let mut dc = Declicking::new(DeclickingConfig::default()).unwrap();
        assert_eq!(dc.process(&[5, 5]).unwrap().unwrap(), vec![5, 5]);
        let flat = vec![-300i16; 64];
        assert_eq!(dc.process(&flat).unwrap().unwrap(), flat);
    }

    #[test]
    fn test_even_window_bumped_to_odd() {
        let dc = Declicking::new(DeclickingConfig {
            window_size: 6,
            mad_threshold: 6.0,
        })
        .unwrap();
        assert_eq!(dc.window_size(), 7);
        assert!(Declicking::new(DeclickingConfig {
            window_size: 1,
            mad_threshold: 6.0,
        })
        .is_err());
    }
}
