//! # Note Transition Tracker
//!
//! Turns the per-frame note estimate into discrete note-on/note-off events.
//! Repeated identical estimates are debounced into one sustained note.

use rand::Rng;
use serde::Serialize;

/// A discrete output event, in the order it must reach the sink.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NoteEvent {
    NoteOff { index: i32 },
    /// Signed offset from the pitch-wheel center, within the configured bend range.
    PitchBend { value: i16 },
    NoteOn { index: i32, frequency: f32 },
}

/// Holds the note currently sounding, if any.
#[derive(Debug, Clone, Default)]
pub struct NoteTracker {
    current: Option<i32>,
    bend_range: i16,
}

impl NoteTracker {
    pub fn new(bend_range: i16) -> Self {
        Self {
            current: None,
            bend_range: bend_range.max(0),
        }
    }

    pub fn current(&self) -> Option<i32> {
        self.current
    }

    /// Feeds one frame's note index and returns the resulting events.
    ///
    /// An unchanged index yields nothing. A change yields `NoteOff` for the old note
    /// (if any), then a random `PitchBend` and a `NoteOn` for the new one (if any).
    ///
    /// # Arguments
    /// * `index` - The frame's note index, `None` for no pitch
    /// * `frequency` - The frame's frequency, carried on `NoteOn`
    /// * `rng` - Source of the pitch-bend value
    ///
    /// # Returns
    /// * `Vec<NoteEvent>` - Zero to three events, in sending order
    pub fn update<R: Rng + ?Sized>(
        &mut self,
        index: Option<i32>,
        frequency: f32,
        rng: &mut R,
    ) -> Vec<NoteEvent> {
        if index == self.current {
            return Vec::new();
        }

        let mut events = Vec::with_capacity(3);
        if let Some(old) = self.current {
            events.push(NoteEvent::NoteOff { index: old });
        }
        if let Some(new) = index {
            let value = rng.gen_range(-self.bend_range..=self.bend_range);
            events.push(NoteEvent::PitchBend { value });
            events.push(NoteEvent::NoteOn { index: new, frequency });
        }
        self.current = index;
        events
    }

    /// Silences the current note, if any. Calling it again yields nothing.
    pub fn release(&mut self) -> Option<NoteEvent> {
        self.current.take().map(|index| NoteEvent::NoteOff { index })
    }
}

#[cfg(test)]
mod test_tracker {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn without_bends(events: Vec<NoteEvent>) -> Vec<NoteEvent> {
        events
            .into_iter()
            .filter(|e| !matches!(e, NoteEvent::PitchBend { .. }))
            .collect()
    }

    #[test]
    fn debounces_repeated_notes() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut tracker = NoteTracker::new(820);
        let frames = [None, Some(69), Some(69), Some(71), None];

        let per_frame: Vec<Vec<NoteEvent>> = frames
            .iter()
            .map(|&index| without_bends(tracker.update(index, 440.0, &mut rng)))
            .collect();

        assert_eq!(per_frame[0], vec![]);
        assert_eq!(per_frame[1], vec![NoteEvent::NoteOn { index: 69, frequency: 440.0 }]);
        assert_eq!(per_frame[2], vec![]);
        assert_eq!(
            per_frame[3],
            vec![
                NoteEvent::NoteOff { index: 69 },
                NoteEvent::NoteOn { index: 71, frequency: 440.0 },
            ]
        );
        assert_eq!(per_frame[4], vec![NoteEvent::NoteOff { index: 71 }]);
        assert_eq!(per_frame.iter().filter(|e| !e.is_empty()).count(), 3);
        assert_eq!(tracker.current(), None);
    }

    #[test]
    fn bend_precedes_note_on_and_stays_in_range() {
        let mut rng = StdRng::seed_from_u64(42);
        let mut tracker = NoteTracker::new(820);
        for i in 0..500 {
            let events = tracker.update(Some(40 + i % 2), 100.0, &mut rng);
            let bend_at = events
                .iter()
                .position(|e| matches!(e, NoteEvent::PitchBend { .. }))
                .unwrap();
            assert!(matches!(events[bend_at + 1], NoteEvent::NoteOn { .. }));
            if let NoteEvent::PitchBend { value } = events[bend_at] {
                assert!((-820..=820).contains(&value));
            }
        }
    }

    #[test]
    fn zero_bend_range_always_centers() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut tracker = NoteTracker::new(0);
        let events = tracker.update(Some(60), 261.6, &mut rng);
        assert_eq!(events[0], NoteEvent::PitchBend { value: 0 });
    }

    #[test]
    fn release_fires_once() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut tracker = NoteTracker::new(820);
        tracker.update(Some(64), 329.6, &mut rng);
        assert_eq!(tracker.release(), Some(NoteEvent::NoteOff { index: 64 }));
        assert_eq!(tracker.release(), None);

        let mut idle = NoteTracker::new(820);
        assert_eq!(idle.release(), None);
    }
}
