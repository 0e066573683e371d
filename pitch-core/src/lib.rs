// pitch-core/src/lib.rs

//! The core logic for the monophonic pitch-to-MIDI detector.
//! This crate estimates the fundamental of each audio frame, maps it to a
//! note and turns the note stream into discrete note-on/note-off events.
//! It is completely headless; devices are reached through the traits in
//! [`audio`] and [`sink`].

pub mod audio;
pub mod config;
pub mod error;
pub mod fft;
pub mod hps;
pub mod peak;
pub mod pitch;
pub mod session;
pub mod sink;
pub mod tracker;
pub mod tuning;

pub use config::DetectorConfig;
pub use error::{PitchError, Result};
pub use pitch::{FrameAnalysis, PitchDetector};
pub use session::{Session, StopReason};
pub use tracker::{NoteEvent, NoteTracker};
pub use tuning::{NoteMapping, freq_to_note};
