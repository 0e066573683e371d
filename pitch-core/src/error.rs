//! Error types for the pitch-estimation core.

use thiserror::Error;

/// Errors raised by the pipeline itself.
///
/// No-pitch conditions are not errors; they flow through the pipeline as `None`.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PitchError {
    /// An audio frame did not have exactly the configured number of samples.
    #[error("audio frame has {actual} samples, expected {expected}")]
    FrameLength { expected: usize, actual: usize },

    #[error("invalid detector configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, PitchError>;
