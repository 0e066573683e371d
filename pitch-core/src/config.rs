//! # Detector Configuration
//!
//! All tunables of the pipeline live in [`DetectorConfig`]. They are fixed when the
//! detector is built and never change while it runs.

use serde::{Deserialize, Serialize};

use crate::error::{PitchError, Result};

/// Number of samples per analysis frame.
pub const FRAME_SIZE: usize = 4096;
/// Capture sample rate in Hz.
pub const SAMPLE_RATE: u32 = 44_100;
/// Zero-padding factor applied before the FFT.
pub const PAD_FACTOR: usize = 2;
/// Highest harmonic folded into the harmonic product spectrum.
pub const HARMONICS: usize = 3;
/// Frames quieter than this RMS level are treated as silence.
pub const RMS_THRESHOLD: f32 = 0.01;
/// Estimates below this frequency are reported as "no pitch".
pub const MIN_FREQUENCY: f32 = 20.0;
/// Maximum random pitch-bend deviation, roughly 0.2 semitone on a +/-2 semitone wheel.
pub const BEND_RANGE: i16 = 820;
/// An HPS peak whose raw magnitude sits more than this many dB under the raw spectrum
/// maximum is treated as leakage, and the plain spectrum is searched instead.
pub const HARMONIC_SUPPORT_DB: f32 = 30.0;
/// Upper bound on processed frames per second.
pub const MAX_FPS: u32 = 30;

/// Largest magnitude a 14-bit pitch-bend offset can take.
const MAX_BEND: i16 = 8191;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectorConfig {
    pub frame_size: usize,
    pub sample_rate: u32,
    pub pad_factor: usize,
    pub harmonics: usize,
    pub rms_threshold: f32,
    pub min_frequency: f32,
    pub bend_range: i16,
    /// `None` always trusts the harmonic product spectrum.
    pub harmonic_support_db: Option<f32>,
    /// Zero disables the frame-rate cap.
    pub max_fps: u32,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            frame_size: FRAME_SIZE,
            sample_rate: SAMPLE_RATE,
            pad_factor: PAD_FACTOR,
            harmonics: HARMONICS,
            rms_threshold: RMS_THRESHOLD,
            min_frequency: MIN_FREQUENCY,
            bend_range: BEND_RANGE,
            harmonic_support_db: Some(HARMONIC_SUPPORT_DB),
            max_fps: MAX_FPS,
        }
    }
}

impl DetectorConfig {
    /// Checks that the configuration describes a usable pipeline.
    pub fn validate(&self) -> Result<()> {
        if self.frame_size < 2 {
            return Err(invalid(format!("frame size {} is too small", self.frame_size)));
        }
        if self.pad_factor == 0 {
            return Err(invalid("pad factor must be at least 1".to_string()));
        }
        if self.sample_rate == 0 {
            return Err(invalid("sample rate must be positive".to_string()));
        }
        if self.harmonics == 0 {
            return Err(invalid("harmonic order must be at least 1".to_string()));
        }
        if !(self.rms_threshold >= 0.0) {
            return Err(invalid(format!("rms threshold {} is negative", self.rms_threshold)));
        }
        if !(0..=MAX_BEND).contains(&self.bend_range) {
            return Err(invalid(format!(
                "bend range {} is outside 0..={}",
                self.bend_range, MAX_BEND
            )));
        }
        if let Some(db) = self.harmonic_support_db {
            if !(db >= 0.0) {
                return Err(invalid(format!("harmonic support {} dB is negative", db)));
            }
        }
        Ok(())
    }

    /// Length of the zero-padded FFT input.
    pub fn fft_size(&self) -> usize {
        self.frame_size * self.pad_factor
    }

    /// Number of bins in the one-sided magnitude spectrum.
    pub fn spectrum_len(&self) -> usize {
        self.fft_size() / 2 + 1
    }

    /// Width of one spectrum bin in Hz.
    pub fn bin_width(&self) -> f32 {
        self.sample_rate as f32 / self.fft_size() as f32
    }
}

fn invalid(reason: String) -> PitchError {
    PitchError::InvalidConfig(reason)
}
