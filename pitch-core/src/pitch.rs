//! # Pitch Detection Module
//!
//! Runs one audio frame through the complete estimation pipeline:
//! silence gate, Hann-windowed zero-padded FFT, harmonic product spectrum,
//! parabolic peak refinement and the audibility floor.

use log::debug;

use crate::config::DetectorConfig;
use crate::error::{PitchError, Result};
use crate::fft::SpectralEstimator;
use crate::hps::harmonic_product_spectrum;
use crate::peak::{RefinedPeak, find_peak, parabolic, peak_bin};
use crate::tuning::{NoteMapping, freq_to_note};

/// Root-mean-square amplitude of a frame. Zero for an empty frame.
pub fn rms(signal: &[f32]) -> f32 {
    if signal.is_empty() {
        return 0.0;
    }
    (signal.iter().map(|&s| s * s).sum::<f32>() / signal.len() as f32).sqrt()
}

/// True when `magnitudes[bin]` is within `support_db` of the spectrum maximum.
fn has_support(magnitudes: &[f32], bin: usize, support_db: f32) -> bool {
    let max = magnitudes.iter().copied().fold(0.0_f32, f32::max);
    if max <= 0.0 {
        return true;
    }
    20.0 * (magnitudes[bin] / max).log10() >= -support_db
}

/// Everything the detector learned from one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameAnalysis {
    pub rms: f32,
    /// `None` when the silence gate closed before any spectral work.
    pub peak: Option<RefinedPeak>,
    pub mapping: NoteMapping,
}

impl FrameAnalysis {
    pub fn frequency(&self) -> f32 {
        self.mapping.frequency
    }
}

/// Stateless monophonic pitch detector.
#[derive(Debug)]
pub struct PitchDetector {
    config: DetectorConfig,
    estimator: SpectralEstimator,
}

impl PitchDetector {
    /// Builds a detector, planning the FFT for the configured frame size.
    ///
    /// # Errors
    /// * [`PitchError::InvalidConfig`] if `config` fails validation
    pub fn new(config: DetectorConfig) -> Result<Self> {
        config.validate()?;
        let estimator = SpectralEstimator::new(&config);
        Ok(Self { config, estimator })
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Log-magnitude harmonic product spectrum of a frame.
    pub fn enhanced_spectrum(&self, frame: &[f32]) -> Result<Vec<f32>> {
        let magnitudes = self.estimator.magnitudes(frame)?;
        Ok(harmonic_product_spectrum(&magnitudes, self.config.harmonics))
    }

    /// Refined dominant peak of a frame's enhanced spectrum.
    ///
    /// When the raw spectrum carries no energy at the enhanced peak (a pure tone has
    /// no harmonics to multiply, so the product peaks on leakage), the peak of the
    /// plain log-magnitude spectrum is used instead.
    pub fn refined_peak(&self, frame: &[f32]) -> Result<RefinedPeak> {
        let magnitudes = self.estimator.magnitudes(frame)?;
        let enhanced = harmonic_product_spectrum(&magnitudes, self.config.harmonics);
        // The spectrum always has at least one bin.
        let Some(bin) = peak_bin(&enhanced) else {
            return Ok(RefinedPeak { bin: 0.0, value: f32::NEG_INFINITY });
        };

        if let Some(support_db) = self.config.harmonic_support_db {
            if !has_support(&magnitudes, bin, support_db) {
                debug!("no fundamental energy at bin {}, searching plain spectrum", bin);
                let plain = harmonic_product_spectrum(&magnitudes, 1);
                if let Some(peak) = find_peak(&plain) {
                    return Ok(peak);
                }
            }
        }

        Ok(parabolic(&enhanced, bin))
    }

    /// Converts a fractional bin position to Hz, applying the audibility floor.
    pub fn peak_frequency(&self, peak: &RefinedPeak) -> f32 {
        let freq = peak.bin * self.config.bin_width();
        if freq < self.config.min_frequency { 0.0 } else { freq }
    }

    /// Estimates the fundamental of a frame without the silence gate.
    ///
    /// Returns `0.0` when the refined peak lies below the audibility floor.
    pub fn estimate_frequency(&self, frame: &[f32]) -> Result<f32> {
        let peak = self.refined_peak(frame)?;
        Ok(self.peak_frequency(&peak))
    }

    /// Full per-frame analysis including the silence gate and note mapping.
    ///
    /// # Arguments
    /// * `frame` - Raw audio samples of one frame
    ///
    /// # Returns
    /// * `FrameAnalysis` - RMS level, refined peak (absent when gated) and note mapping.
    ///   Silence and sub-audible peaks map to frequency 0 with no note.
    ///
    /// # Errors
    /// * [`PitchError::FrameLength`] if the frame is not exactly `frame_size` samples,
    ///   even when it is silent.
    pub fn analyze(&self, frame: &[f32]) -> Result<FrameAnalysis> {
        if frame.len() != self.config.frame_size {
            return Err(PitchError::FrameLength {
                expected: self.config.frame_size,
                actual: frame.len(),
            });
        }

        let level = rms(frame);
        if level < self.config.rms_threshold {
            return Ok(FrameAnalysis {
                rms: level,
                peak: None,
                mapping: freq_to_note(0.0),
            });
        }

        let peak = self.refined_peak(frame)?;
        let frequency = self.peak_frequency(&peak);
        Ok(FrameAnalysis {
            rms: level,
            peak: Some(peak),
            mapping: freq_to_note(frequency),
        })
    }
}
