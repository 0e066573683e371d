//! # Detector Session
//!
//! Drives the pipeline one frame at a time: pull a frame, analyse it, update the
//! tracker, forward events, show the result. A session owns the sounding-note state,
//! and whichever way it ends the final `NoteOff` is sent exactly once.

use std::time::{Duration, Instant};

use anyhow::Result;
use crossbeam_channel::Receiver;
use log::{debug, error, info};
use rand::Rng;

use crate::audio::AudioSource;
use crate::pitch::{FrameAnalysis, PitchDetector};
use crate::sink::{DisplayRecord, EventSink, PresentationSink};
use crate::tracker::{NoteEvent, NoteTracker};

/// Why [`Session::run`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    SourceEnded,
    StopRequested,
    FrameLimit,
}

/// Sleeps between frames so that at most `max_fps` frames are processed per second.
#[derive(Debug)]
pub struct FrameLimiter {
    period: Option<Duration>,
    last: Option<Instant>,
}

impl FrameLimiter {
    /// Zero disables the cap.
    pub fn new(max_fps: u32) -> Self {
        Self {
            period: (max_fps > 0).then(|| Duration::from_secs_f64(1.0 / max_fps as f64)),
            last: None,
        }
    }

    pub fn tick(&mut self) {
        if let (Some(period), Some(last)) = (self.period, self.last) {
            let elapsed = last.elapsed();
            if elapsed < period {
                std::thread::sleep(period - elapsed);
            }
        }
        self.last = Some(Instant::now());
    }
}

/// A running detector bound to an event sink.
pub struct Session<S: EventSink, R: Rng> {
    detector: PitchDetector,
    tracker: NoteTracker,
    events: S,
    rng: R,
    frames: u64,
    finished: bool,
}

impl<S: EventSink, R: Rng> Session<S, R> {
    /// `rng` drives the pitch bend sent before each new note.
    pub fn new(detector: PitchDetector, events: S, rng: R) -> Self {
        let tracker = NoteTracker::new(detector.config().bend_range);
        Self {
            detector,
            tracker,
            events,
            rng,
            frames: 0,
            finished: false,
        }
    }

    pub fn current_note(&self) -> Option<i32> {
        self.tracker.current()
    }

    /// Analyses one frame and sends any resulting note events.
    ///
    /// Events reach the sink in order; the first sink error stops delivery and is
    /// returned. The tracker has already moved to the new note at that point.
    pub fn process_frame(&mut self, frame: &[f32]) -> Result<FrameAnalysis> {
        let analysis = self.detector.analyze(frame)?;
        self.frames += 1;
        debug!(
            "frame {}: rms {:.4}, {:.2} Hz, note {:?}",
            self.frames,
            analysis.rms,
            analysis.frequency(),
            analysis.mapping.name()
        );

        let events = self.tracker.update(
            analysis.mapping.index(),
            analysis.frequency(),
            &mut self.rng,
        );
        for event in &events {
            if let NoteEvent::NoteOn { .. } = event {
                info!("Note on: {}", DisplayRecord::from(&analysis.mapping));
            }
            self.events.send(event)?;
        }
        Ok(analysis)
    }

    /// Pulls frames until the source ends, `stop` fires or `max_frames` are done.
    ///
    /// The stop channel is polled between frames only. The final `NoteOff` is sent
    /// before returning, on success and on error alike.
    ///
    /// # Arguments
    /// * `source` - Blocking frame supplier
    /// * `display` - Receives one record per processed frame
    /// * `stop` - Any message requests a stop at the next frame boundary
    /// * `max_frames` - Optional cap on processed frames
    ///
    /// # Returns
    /// * `Ok(reason)` - Why the loop ended
    /// * `Err(e)` - Source, frame-length, sink or display error, or a failed final `NoteOff`
    pub fn run<A, P>(
        mut self,
        source: &mut A,
        display: &mut P,
        stop: &Receiver<()>,
        max_frames: Option<u64>,
    ) -> Result<StopReason>
    where
        A: AudioSource + ?Sized,
        P: PresentationSink + ?Sized,
    {
        let result = self.run_loop(source, display, stop, max_frames);
        let finished = self.finish();
        let reason = result?;
        finished?;
        Ok(reason)
    }

    fn run_loop<A, P>(
        &mut self,
        source: &mut A,
        display: &mut P,
        stop: &Receiver<()>,
        max_frames: Option<u64>,
    ) -> Result<StopReason>
    where
        A: AudioSource + ?Sized,
        P: PresentationSink + ?Sized,
    {
        let mut limiter = FrameLimiter::new(self.detector.config().max_fps);
        loop {
            if stop.try_recv().is_ok() {
                info!("Stop requested after {} frames", self.frames);
                return Ok(StopReason::StopRequested);
            }
            if max_frames.is_some_and(|limit| self.frames >= limit) {
                return Ok(StopReason::FrameLimit);
            }

            let Some(frame) = source.next_frame()? else {
                info!("Audio source ended after {} frames", self.frames);
                return Ok(StopReason::SourceEnded);
            };

            let analysis = self.process_frame(&frame)?;
            display.show(&DisplayRecord::from(&analysis.mapping))?;
            limiter.tick();
        }
    }

    /// Sends the final `NoteOff` if a note is sounding. Later calls do nothing.
    pub fn finish(&mut self) -> Result<()> {
        if self.finished {
            return Ok(());
        }
        self.finished = true;
        match self.tracker.release() {
            Some(event) => self.events.send(&event),
            None => Ok(()),
        }
    }
}

impl<S: EventSink, R: Rng> Drop for Session<S, R> {
    fn drop(&mut self) {
        if let Err(e) = self.finish() {
            error!("Failed to release sounding note: {}", e);
        }
    }
}
