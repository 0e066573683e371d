//! # Frequency-to-Note Mapping
//!
//! Maps frequencies onto the equal-tempered chromatic scale with A4 = 440 Hz = note 69,
//! the MIDI note numbering.

use serde::Serialize;

const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// Reference pitch of A4 in Hz.
pub const A4_FREQUENCY: f32 = 440.0;
/// Note index of A4.
pub const A4_INDEX: i32 = 69;

/// The note a frame maps to. `note` is `None` when the frame carries no pitch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NoteMapping {
    pub frequency: f32,
    pub note: Option<Note>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Note {
    /// Name with octave, e.g. "A4" or "C#3".
    pub name: String,
    pub index: i32,
}

impl NoteMapping {
    pub fn index(&self) -> Option<i32> {
        self.note.as_ref().map(|n| n.index)
    }

    pub fn name(&self) -> Option<&str> {
        self.note.as_ref().map(|n| n.name.as_str())
    }
}

/// Nearest equal-tempered note index for `freq`.
///
/// Exact half-semitone ties round to the even index.
pub fn note_index(freq: f32) -> Option<i32> {
    if !(freq > 0.0) || !freq.is_finite() {
        return None;
    }
    let semitones = A4_INDEX as f32 + 12.0 * (freq / A4_FREQUENCY).log2();
    Some(semitones.round_ties_even() as i32)
}

/// Name of a note index, e.g. 60 -> "C4". The octave changes at C.
pub fn note_name(index: i32) -> String {
    let name = NOTE_NAMES[index.rem_euclid(12) as usize];
    let octave = index.div_euclid(12) - 1;
    format!("{}{}", name, octave)
}

/// Maps a frequency to its note, or to no note when `freq <= 0`.
///
/// # Arguments
/// * `freq` - Frequency in Hz
///
/// # Returns
/// * `NoteMapping` - The frequency (negative input clamped to 0) and the nearest note
pub fn freq_to_note(freq: f32) -> NoteMapping {
    let note = note_index(freq).map(|index| Note {
        name: note_name(index),
        index,
    });
    NoteMapping {
        frequency: freq.max(0.0),
        note,
    }
}

/// Equal-tempered frequency of a note index.
pub fn note_frequency(index: i32) -> f32 {
    A4_FREQUENCY * 2.0_f32.powf((index - A4_INDEX) as f32 / 12.0)
}

#[cfg(test)]
mod test_tuning {
    use super::*;

    #[test]
    fn a440_is_a4() {
        let mapping = freq_to_note(440.0);
        assert_eq!(mapping.name(), Some("A4"));
        assert_eq!(mapping.index(), Some(69));
    }

    #[test]
    fn non_positive_frequency_has_no_note() {
        assert_eq!(freq_to_note(0.0).note, None);
        assert_eq!(freq_to_note(-5.0).note, None);
        assert_eq!(freq_to_note(-5.0).frequency, 0.0);
        assert_eq!(freq_to_note(f32::NAN).note, None);
    }

    #[test]
    fn names_cover_octave_boundaries() {
        assert_eq!(note_name(60), "C4");
        assert_eq!(note_name(59), "B3");
        assert_eq!(note_name(61), "C#4");
        assert_eq!(note_name(0), "C-1");
        assert_eq!(note_name(127), "G9");
        assert_eq!(note_name(-1), "B-2");
    }

    #[test]
    fn guitar_strings_map_to_expected_notes() {
        let strings = [
            (82.41, "E2", 40),
            (110.0, "A2", 45),
            (146.83, "D3", 50),
            (196.0, "G3", 55),
            (246.94, "B3", 59),
            (329.63, "E4", 64),
        ];
        for (freq, name, index) in strings {
            let mapping = freq_to_note(freq);
            assert_eq!(mapping.name(), Some(name));
            assert_eq!(mapping.index(), Some(index));
        }
    }

    #[test]
    fn slightly_detuned_notes_snap_to_nearest() {
        // 30 cents sharp and flat of A4.
        assert_eq!(note_index(440.0 * 2.0_f32.powf(0.3 / 12.0)), Some(69));
        assert_eq!(note_index(440.0 * 2.0_f32.powf(-0.3 / 12.0)), Some(69));
        assert_eq!(note_index(440.0 * 2.0_f32.powf(0.7 / 12.0)), Some(70));
    }

    #[test]
    fn note_frequency_inverts_note_index() {
        for index in 21..=108 {
            assert_eq!(note_index(note_frequency(index)), Some(index));
        }
        assert!((note_frequency(69) - 440.0).abs() < 1e-4);
    }
}
