use crate::core::error::ApmError;
use alloc::boxed::Box;
use alloc::vec::Vec;
use core::f32::consts::PI;
use num_complex::Complex32;

/// Helper trait to abstract FFT operations for different sizes.
pub trait FftHelper {
    fn do_fft(&mut self);
    fn do_ifft(&mut self);
}

impl FftHelper for [Complex32; 512] {
    fn do_fft(&mut self) {
        let _ = microfft::complex::cfft_512(self);
    }
    fn do_ifft(&mut self) {
        for x in self.iter_mut() {
            *x = x.conj();
        }
        let _ = microfft::complex::cfft_512(self);
        for x in self.iter_mut() {
            *x = x.conj() / 512.0;
        }
    }
}

impl FftHelper for [Complex32; 1024] {
    fn do_fft(&mut self) {
        let _ = microfft::complex::cfft_1024(self);
    }
    fn do_ifft(&mut self) {
        for x in self.iter_mut() {
            *x = x.conj();
        }
        let _ = microfft::complex::cfft_1024(self);
        for x in self.iter_mut() {
            *x = x.conj() / 1024.0;
        }
    }
}

/// A zero-padded FFT work buffer whose size is picked at runtime.
///
/// Frames up to 512 samples use a 512-point transform, larger frames (up to
/// 1024) a 1024-point one.
pub enum SpectralBuffer {
    N512(Box<[Complex32; 512]>),
    N1024(Box<[Complex32; 1024]>),
}

impl SpectralBuffer {
    /// Picks the transform size for a frame of `frame_size` samples.
    ///
    /// # Errors
    /// Frames longer than 1024 samples are rejected.
    pub fn for_frame(frame_size: usize) -> Result<Self, ApmError> {
        let zero = Complex32::new(0.0, 0.0);
        match frame_size {
            0 => Err(ApmError::invalid_config("NoiseSuppression", "frame size is zero")),
            1..=512 => Ok(SpectralBuffer::N512(Box::new([zero; 512]))),
            513..=1024 => Ok(SpectralBuffer::N1024(Box::new([zero; 1024]))),
            _ => Err(ApmError::invalid_config(
                "NoiseSuppression",
                alloc::format!("frame size {frame_size} exceeds the 1024-point FFT"),
            )),
        }
    }

    /// Transform length.
    pub fn len(&self) -> usize {
        match self {
            SpectralBuffer::N512(_) => 512,
            SpectralBuffer::N1024(_) => 1024,
        }
    }

    /// Number of non-redundant bins of a real signal (`len / 2 + 1`).
    pub fn num_bins(&self) -> usize {
        self.len() / 2 + 1
    }

    pub fn bins(&self) -> &[Complex32] {
        match self {
            SpectralBuffer::N512(b) => &b[..],
            SpectralBuffer::N1024(b) => &b[..],
        }
    }

    pub fn bins_mut(&mut self) -> &mut [Complex32] {
        match self {
            SpectralBuffer::N512(b) => &mut b[..],
            SpectralBuffer::N1024(b) => &mut b[..],
        }
    }

    /// Loads a real frame, zero padding the rest of the buffer.
    pub fn load_real(&mut self, frame: &[f32]) -> Result<(), ApmError> {
        let size = self.len();
        if frame.len() > size {
            return Err(ApmError::Fft { size });
        }
        let bins = self.bins_mut();
        for (bin, &s) in bins.iter_mut().zip(frame.iter()) {
            *bin = Complex32::new(s, 0.0);
        }
        for bin in bins[frame.len()..].iter_mut() {
            *bin = Complex32::new(0.0, 0.0);
        }
        Ok(())
    }

    pub fn forward(&mut self) {
        match self {
            SpectralBuffer::N512(b) => b.do_fft(),
            SpectralBuffer::N1024(b) => b.do_fft(),
        }
    }

    pub fn inverse(&mut self) {
        match self {
            SpectralBuffer::N512(b) => b.do_ifft(),
            SpectralBuffer::N1024(b) => b.do_ifft(),
        }
    }

    /// Writes `|X[k]|^2` for the non-redundant bins into `out`.
    pub fn power_spectrum(&self, out: &mut Vec<f32>) {
        out.clear();
        out.extend(self.bins()[..self.num_bins()].iter().map(|c| c.norm_sqr()));
    }

    /// Multiplies bin `k` and its mirror `N - k` by `gains[k]`, keeping the
    /// spectrum Hermitian so the inverse stays real.
    pub fn apply_real_gains(&mut self, gains: &[f32]) {
        let n = self.len();
        let half = n / 2;
        let bins = self.bins_mut();
        for (k, &g) in gains.iter().enumerate().take(half + 1) {
            bins[k] = bins[k] * g;
            if k != 0 && k != half {
                bins[n - k] = bins[n - k] * g;
            }
        }
    }
}

/// Symmetric Hann window with a constant floor added to
/// every tap so the edges never reach zero.
pub fn hann_window_with_floor(len: usize, floor: f32) -> Vec<f32> {
    if len == 1 {
        return alloc::vec![1.0 + floor];
    }
    (0..len)
        .map(|i| {
            let arg = 2.0 * PI * i as f32 / (len - 1) as f32;
            0.5 * (1.0 - libm::cosf(arg)) + floor
        })
        .collect()
}
