//! # Windowed Spectral Estimator
//!
//! Turns one fixed-size audio frame into a one-sided magnitude spectrum.
//!
//! ## Steps
//! - Hann windowing to reduce spectral leakage from the frame edges
//! - Zero-padding to `frame_size * pad_factor` for finer bin spacing
//! - Forward FFT using RustFFT, keeping bins `0..=fft_size / 2`

use std::sync::Arc;

use rustfft::{Fft, FftPlanner, num_complex::Complex};

use crate::config::DetectorConfig;
use crate::error::{PitchError, Result};

/// Builds a Hann window of length `n`: `w[i] = 0.5 - 0.5 * cos(2*pi*i / (n - 1))`.
///
/// The window is symmetric and reaches zero at both ends.
pub fn hann_window(n: usize) -> Vec<f32> {
    if n < 2 {
        return vec![1.0; n];
    }
    let n_minus_1 = (n - 1) as f32;
    (0..n)
        .map(|i| 0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / n_minus_1).cos()))
        .collect()
}

/// Computes magnitude spectra of fixed-size frames.
///
/// The FFT plan and the window are built once and reused for every frame, so a single
/// estimator can be kept for the lifetime of the detector.
pub struct SpectralEstimator {
    frame_size: usize,
    fft_size: usize,
    window: Vec<f32>,
    fft: Arc<dyn Fft<f32>>,
}

impl std::fmt::Debug for SpectralEstimator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpectralEstimator")
            .field("frame_size", &self.frame_size)
            .field("fft_size", &self.fft_size)
            .finish()
    }
}

impl SpectralEstimator {
    pub fn new(config: &DetectorConfig) -> Self {
        let fft_size = config.fft_size();
        let mut planner = FftPlanner::new();
        Self {
            frame_size: config.frame_size,
            fft_size,
            window: hann_window(config.frame_size),
            fft: planner.plan_fft_forward(fft_size),
        }
    }

    /// Number of bins returned by [`SpectralEstimator::magnitudes`].
    pub fn spectrum_len(&self) -> usize {
        self.fft_size / 2 + 1
    }

    /// Computes the one-sided magnitude spectrum of one frame.
    ///
    /// The frame is multiplied by the Hann window, zero-extended to `fft_size` and
    /// transformed. Bin `k` corresponds to `k * sample_rate / fft_size` Hz.
    ///
    /// # Arguments
    /// * `frame` - Audio samples (must be exactly `frame_size` samples)
    ///
    /// # Returns
    /// * `Vec<f32>` - `|X[k]|` for `k` in `0..=fft_size / 2`
    ///
    /// # Errors
    /// * [`PitchError::FrameLength`] if `frame` is not exactly `frame_size` samples long.
    ///   Short or long frames are never padded or truncated.
    pub fn magnitudes(&self, frame: &[f32]) -> Result<Vec<f32>> {
        if frame.len() != self.frame_size {
            return Err(PitchError::FrameLength {
                expected: self.frame_size,
                actual: frame.len(),
            });
        }

        let mut buffer: Vec<Complex<f32>> = frame
            .iter()
            .zip(&self.window)
            .map(|(&sample, &w)| Complex { re: sample * w, im: 0.0 })
            .collect();
        buffer.resize(self.fft_size, Complex { re: 0.0, im: 0.0 });

        self.fft.process(&mut buffer);

        Ok(buffer
            .iter()
            .take(self.spectrum_len())
            .map(|c| c.norm()) // .norm() is sqrt(re^2 + im^2)
            .collect())
    }
}
