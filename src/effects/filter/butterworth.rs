use crate::core::error::ApmError;
use core::f64::consts::{PI, SQRT_2};
use log::warn;

/// Order of a Butterworth high-pass section.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FilterOrder {
    /// 6 dB/octave.
    First,
    /// 12 dB/octave.
    Second,
}

/// A digital Butterworth high-pass filter with persistent state.
///
/// Coefficients come from the bilinear transform with frequency prewarping
/// (the classic analog-prototype design). Samples are filtered in
/// transposed direct form II and the two delay registers survive between
/// calls, so a stream split into chunks filters exactly like the unsplit
/// stream. State and coefficients are kept in `f64`; a 20 Hz pole at 16 kHz
/// sits very close to the unit circle.
#[derive(Clone, Debug)]
pub struct ButterworthHighPass {
    order: FilterOrder,
    b0: f64,
    b1: f64,
    b2: f64,
    a1: f64,
    a2: f64,

    z1: f64,
    z2: f64,
}

impl ButterworthHighPass {
    /// Designs the filter.
    ///
    /// A cutoff at or above Nyquist is clamped to 0.99 of Nyquist with a
    /// warning.
    ///
    /// # Arguments
    /// * `order` - First or second order.
    /// * `cutoff_hz` - -3 dB frequency.
    /// * `sample_rate` - Sample rate in Hz.
    /// * `owner` - Processor name used in errors and logs.
    pub fn new(
        order: FilterOrder,
        cutoff_hz: f32,
        sample_rate: u32,
        owner: &'static str,
    ) -> Result<Self, ApmError> {
        if sample_rate == 0 {
            return Err(ApmError::invalid_config(owner, "sample rate must be positive"));
        }
        if !(cutoff_hz.is_finite() && cutoff_hz > 0.0) {
            return Err(ApmError::invalid_config(
                owner,
                alloc::format!("cutoff frequency {cutoff_hz} Hz must be positive"),
            ));
        }

        let nyquist = sample_rate as f64 / 2.0;
        let mut normalized = cutoff_hz as f64 / nyquist;
        if normalized >= 1.0 {
            warn!("{owner}: cutoff {cutoff_hz} Hz too high for {sample_rate} Hz, using 0.99 of Nyquist");
            normalized = 0.99;
        }

        let k = libm::tan(PI * normalized / 2.0);
        let mut filter = ButterworthHighPass {
            order,
            b0: 0.0,
            b1: 0.0,
            b2: 0.0,
            a1: 0.0,
            a2: 0.0,
            z1: 0.0,
            z2: 0.0,
        };

        match order {
            FilterOrder::First => {
                let norm = 1.0 / (1.0 + k);
                filter.b0 = norm;
                filter.b1 = -norm;
                filter.a1 = (k - 1.0) * norm;
            }
            FilterOrder::Second => {
                let k2 = k * k;
                let norm = 1.0 / (1.0 + SQRT_2 * k + k2);
                filter.b0 = norm;
                filter.b1 = -2.0 * norm;
                filter.b2 = norm;
                filter.a1 = 2.0 * (k2 - 1.0) * norm;
                filter.a2 = (1.0 - SQRT_2 * k + k2) * norm;
            }
        }

        Ok(filter)
    }

    pub fn order(&self) -> FilterOrder {
        self.order
    }

    /// Filters `buffer` in place, continuing from the previous call.
    pub fn process(&mut self, buffer: &mut [f32]) {
        for sample in buffer.iter_mut() {
            let x = *sample as f64;
            let y = self.b0 * x + self.z1;
            self.z1 = self.b1 * x - self.a1 * y + self.z2;
            self.z2 = self.b2 * x - self.a2 * y;
            *sample = y as f32;
        }
    }

    /// Clears the delay registers (the stream is assumed silent before).
    pub fn reset(&mut self) {
        self.z1 = 0.0;
        self.z2 = 0.0;
    }

    /// Magnitude response at `freq_hz`.
    pub fn magnitude_at(&self, freq_hz: f32, sample_rate: u32) -> f32 {
        let w = 2.0 * PI * freq_hz as f64 / sample_rate as f64;
        let (c1, s1) = (libm::cos(w), -libm::sin(w));
        let (c2, s2) = (libm::cos(2.0 * w), -libm::sin(2.0 * w));

        let num_re = self.b0 + self.b1 * c1 + self.b2 * c2;
        let num_im = self.b1 * s1 + self.b2 * s2;
        let den_re = 1.0 + self.a1 * c1 + self.a2 * c2;
        let den_im = self.a1 * s1 + self.a2 * s2;

        let num = libm::sqrt(num_re * num_re + num_im * num_im);
        let den = libm::sqrt(den_re * den_re + den_im * den_im);
        (num / den) as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec::Vec;

    #[test]
    fn test_second_order_response() {
        let f = ButterworthHighPass::new(FilterOrder::Second, 70.0, 16000, "test").unwrap();
        assert_eq!(f.order(), FilterOrder::Second);
        assert!(f.magnitude_at(0.0, 16000) < 1e-6);
        assert!((f.magnitude_at(70.0, 16000) - core::f32::consts::FRAC_1_SQRT_2).abs() < 1e-3);
        assert!((f.magnitude_at(1000.0, 16000) - 1.0).abs() < 1e-2);
        assert!(f.magnitude_at(20.0, 16000) < 0.1);
    }

    #[test]
    fn test_first_order_response() {
        let f = ButterworthHighPass::new(FilterOrder::First, 20.0, 16000, "test").unwrap();
        assert_eq!(f.order(), FilterOrder::First);
        assert!(f.magnitude_at(0.0, 16000) < 1e-6);
        assert!((f.magnitude_at(20.0, 16000) - core::f32::consts::FRAC_1_SQRT_2).abs() < 1e-3);
        assert!((f.magnitude_at(4000.0, 16000) - 1.0).abs() < 1e-3);
    }

    #[test]
    fn test_state_carries_across_chunks() {
        let signal: Vec<f32> = (0..960)
            .map(|i| 0.2 + 0.3 * libm::sinf(i as f32 * 0.17))
            .collect();

        let mut whole = ButterworthHighPass::new(FilterOrder::Second, 70.0, 16000, "test").unwrap();
        let mut expected = signal.clone();
        whole.process(&mut expected);

        let mut split = ButterworthHighPass::new(FilterOrder::Second, 70.0, 16000, "test").unwrap();
        let mut actual = signal.clone();
        for chunk in actual.chunks_mut(160) {
            split.process(chunk);
        }

        for (a, e) in actual.iter().zip(expected.iter()) {
            assert!((a - e).abs() < 1e-7);
        }
    }

    #[test]
    fn test_cutoff_clamped_and_validated() {
        assert!(ButterworthHighPass::new(FilterOrder::Second, 9000.0, 16000, "test").is_ok());
        assert!(ButterworthHighPass::new(FilterOrder::Second, 0.0, 16000, "test").is_err());
        assert!(ButterworthHighPass::new(FilterOrder::First, 20.0, 0, "test").is_err());
    }
}
