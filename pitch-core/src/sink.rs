//! # Event and Presentation Sinks
//!
//! Where detector output goes: MIDI-style note events and a per-frame display record.

use std::io::Write;

use anyhow::{Result, anyhow};
use log::{info, warn};
use serde::Serialize;
use wmidi::{Channel, MidiMessage, Note, U7, U14};

use crate::tracker::NoteEvent;
use crate::tuning::NoteMapping;

/// Center position of the 14-bit pitch wheel.
const PITCH_BEND_CENTER: i32 = 8192;

/// Receives note events in order. Delivery failures are returned, not retried.
pub trait EventSink {
    fn send(&mut self, event: &NoteEvent) -> Result<()>;
}

impl<T: EventSink + ?Sized> EventSink for &mut T {
    fn send(&mut self, event: &NoteEvent) -> Result<()> {
        (**self).send(event)
    }
}

/// Receives one display record per processed frame.
pub trait PresentationSink {
    fn show(&mut self, record: &DisplayRecord) -> Result<()>;
}

/// Human-facing summary of one frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DisplayRecord {
    pub note_name: Option<String>,
    pub frequency: f32,
    pub note_index: Option<i32>,
}

impl From<&NoteMapping> for DisplayRecord {
    fn from(mapping: &NoteMapping) -> Self {
        Self {
            note_name: mapping.name().map(str::to_string),
            frequency: mapping.frequency,
            note_index: mapping.index(),
        }
    }
}

impl std::fmt::Display for DisplayRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.note_name, self.note_index) {
            (Some(name), Some(index)) => write!(
                f,
                "Detected: {} | Freq: {:.2} Hz | MIDI Note: {}",
                name, self.frequency, index
            ),
            _ => write!(f, "No note detected"),
        }
    }
}

/// Converts a note event to a MIDI message, or `None` if its note is out of range.
///
/// # Arguments
/// * `event` - The detector event to encode
/// * `channel` - MIDI channel the message is sent on
/// * `velocity` - Velocity used for `NoteOn`; `NoteOff` always uses 0
///
/// # Returns
/// * `Some(message)` - The encoded message; pitch bends are offset from the 8192 center
/// * `None` - The note index does not fit the 0..=127 MIDI range
pub fn to_midi(
    event: &NoteEvent,
    channel: Channel,
    velocity: U7,
) -> Option<MidiMessage<'static>> {
    let note = |index: i32| u8::try_from(index).ok().and_then(|n| Note::try_from(n).ok());
    match *event {
        NoteEvent::NoteOn { index, .. } => {
            Some(MidiMessage::NoteOn(channel, note(index)?, velocity))
        }
        NoteEvent::NoteOff { index } => {
            Some(MidiMessage::NoteOff(channel, note(index)?, U7::from_u8_lossy(0)))
        }
        NoteEvent::PitchBend { value } => {
            let raw = (PITCH_BEND_CENTER + value as i32).clamp(0, 0x3FFF) as u16;
            Some(MidiMessage::PitchBendChange(channel, U14::try_from(raw).ok()?))
        }
    }
}

/// Writes raw MIDI bytes to any writer, such as a MIDI character device.
pub struct MidiWriter<W: Write> {
    out: W,
    channel: Channel,
    velocity: U7,
}

impl<W: Write> MidiWriter<W> {
    /// `channel` is 1-based (1..=16) and `velocity` is 0..=127.
    pub fn new(out: W, channel: u8, velocity: u8) -> Result<Self> {
        let channel = channel
            .checked_sub(1)
            .and_then(|c| Channel::from_index(c).ok())
            .ok_or_else(|| anyhow!("MIDI channel {} is outside 1..=16", channel))?;
        let velocity = U7::try_from(velocity)
            .map_err(|_| anyhow!("velocity {} is outside 0..=127", velocity))?;
        Ok(Self { out, channel, velocity })
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> EventSink for MidiWriter<W> {
    fn send(&mut self, event: &NoteEvent) -> Result<()> {
        let Some(message) = to_midi(event, self.channel, self.velocity) else {
            warn!("Skipping {:?}: note outside the MIDI range", event);
            return Ok(());
        };
        self.out.write_all(&message.to_vec())?;
        self.out.flush()?;
        Ok(())
    }
}

/// Event sink that only logs what it receives.
#[derive(Debug, Default)]
pub struct LogSink;

impl EventSink for LogSink {
    fn send(&mut self, event: &NoteEvent) -> Result<()> {
        info!("{:?}", event);
        Ok(())
    }
}

/// How [`ConsoleDisplay`] renders records.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DisplayMode {
    /// One status line, redrawn in place.
    Status,
    /// One JSON object per line.
    Json,
}

/// Terminal presentation of display records.
pub struct ConsoleDisplay<W: Write> {
    out: W,
    mode: DisplayMode,
}

impl<W: Write> ConsoleDisplay<W> {
    pub fn new(out: W, mode: DisplayMode) -> Self {
        Self { out, mode }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> PresentationSink for ConsoleDisplay<W> {
    fn show(&mut self, record: &DisplayRecord) -> Result<()> {
        match self.mode {
            // Clear the rest of the line so a shorter text fully replaces a longer one.
            DisplayMode::Status => write!(self.out, "\r{}\x1b[K", record)?,
            DisplayMode::Json => writeln!(self.out, "{}", serde_json::to_string(record)?)?,
        }
        self.out.flush()?;
        Ok(())
    }
}
