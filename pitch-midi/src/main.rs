//! # pitch-midi - Monophonic Pitch to MIDI
//!
//! Listens to a monophonic instrument, detects the note being played and sends
//! note-on/note-off messages to a raw MIDI output.
//!
//! ## Architecture
//! - **Main Thread**: pulls audio frames and runs the detector session
//! - **Input Thread**: waits for Enter on stdin and requests a stop
//! - **Signal Thread**: a small tokio runtime turns Ctrl-C or SIGTERM into a stop
//! - **Communication**: a crossbeam channel carries the stop request; it is
//!   checked between frames, so the final note-off is always sent

use std::fs::OpenOptions;
use std::io::{self, BufRead};
use std::path::PathBuf;
use std::thread;

use anyhow::{Context, Result};
use clap::Parser;
use crossbeam_channel::Sender;
use log::{debug, info, warn};
use pitch_core::audio::{AudioSource, CpalSource, WavSource};
use pitch_core::config::{self, DetectorConfig};
use pitch_core::sink::{ConsoleDisplay, DisplayMode, EventSink, LogSink, MidiWriter};
use pitch_core::{PitchDetector, Session};
use rand::SeedableRng;
use rand::rngs::StdRng;

/// Detects the pitch of a monophonic instrument and plays it out as MIDI notes.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Samples per analysis frame
    #[arg(long, default_value_t = config::FRAME_SIZE)]
    frame_size: usize,

    /// Capture sample rate in Hz
    #[arg(long, default_value_t = config::SAMPLE_RATE)]
    sample_rate: u32,

    /// Zero-padding factor applied before the FFT
    #[arg(long, default_value_t = config::PAD_FACTOR)]
    pad_factor: usize,

    /// Frames quieter than this RMS level count as silence
    #[arg(long, default_value_t = config::RMS_THRESHOLD)]
    rms_threshold: f32,

    /// Largest random pitch-bend offset sent before each note (0..=8191)
    #[arg(long, default_value_t = config::BEND_RANGE)]
    bend_range: i16,

    /// Maximum frames processed per second (0 = unlimited)
    #[arg(long, default_value_t = config::MAX_FPS)]
    max_fps: u32,

    /// Analyse a WAV file instead of the default input device
    #[arg(long)]
    input: Option<PathBuf>,

    /// Raw MIDI device or file to write to, e.g. /dev/snd/midiC1D0.
    /// Without it, note events are only logged.
    #[arg(long)]
    midi_out: Option<PathBuf>,

    /// MIDI channel (1-16)
    #[arg(long, default_value_t = 1)]
    channel: u8,

    /// Note-on velocity (0-127)
    #[arg(long, default_value_t = 64)]
    velocity: u8,

    /// Seed for the pitch-bend generator
    #[arg(long)]
    seed: Option<u64>,

    /// Print one JSON record per frame instead of a status line
    #[arg(long)]
    json: bool,

    /// Stop after this many frames
    #[arg(long)]
    max_frames: Option<u64>,
}

impl Args {
    fn detector_config(&self) -> DetectorConfig {
        DetectorConfig {
            frame_size: self.frame_size,
            sample_rate: self.sample_rate,
            pad_factor: self.pad_factor,
            rms_threshold: self.rms_threshold,
            bend_range: self.bend_range,
            max_fps: self.max_fps,
            ..Default::default()
        }
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let config = args.detector_config();
    debug!("Detector config: {}", serde_json::to_string(&config)?);
    let detector = PitchDetector::new(config.clone())?;

    let mut events = open_event_sink(&args)?;
    let mut source = open_source(&args, &config)?;

    let rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let (stop_tx, stop_rx) = crossbeam_channel::bounded(1);
    spawn_signal_listener(stop_tx.clone())?;
    spawn_stop_listener(stop_tx);
    info!("Listening. Press Enter or Ctrl-C to stop.");

    let mode = if args.json { DisplayMode::Json } else { DisplayMode::Status };
    let mut display = ConsoleDisplay::new(io::stdout(), mode);

    let session = Session::new(detector, events.as_mut(), rng);
    let result = session.run(source.as_mut(), &mut display, &stop_rx, args.max_frames);

    if mode == DisplayMode::Status {
        println!();
    }
    let reason = result?;
    info!(
        "Stopped ({:?}), {} frame(s) lost to overflow",
        reason,
        source.overflows()
    );
    Ok(())
}

fn open_source(args: &Args, config: &DetectorConfig) -> Result<Box<dyn AudioSource>> {
    match &args.input {
        Some(path) => {
            let source = WavSource::open(path, config.frame_size, config.sample_rate)
                .with_context(|| format!("opening {}", path.display()))?;
            Ok(Box::new(source))
        }
        None => {
            let source = CpalSource::open(config.frame_size, config.sample_rate)
                .context("starting audio capture")?;
            Ok(Box::new(source))
        }
    }
}

fn open_event_sink(args: &Args) -> Result<Box<dyn EventSink>> {
    match &args.midi_out {
        Some(path) => {
            let file = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(false)
                .open(path)
                .with_context(|| format!("opening MIDI output {}", path.display()))?;
            info!("Sending MIDI to {} on channel {}", path.display(), args.channel);
            Ok(Box::new(MidiWriter::new(file, args.channel, args.velocity)?))
        }
        None => Ok(Box::new(LogSink)),
    }
}

/// Requests a stop when the process receives Ctrl-C or SIGTERM.
///
/// The signal no longer kills the process; the session stops at the next frame
/// boundary and releases any sounding note on its way out.
///
/// # Arguments
/// * `stop` - Sender half of the session's stop channel
///
/// # Returns
/// * `Err(e)` - The signal runtime could not be created
fn spawn_signal_listener(stop: Sender<()>) -> Result<()> {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to create signal runtime")?;

    thread::spawn(move || {
        rt.block_on(async move {
            match shutdown_signal().await {
                Ok(()) => {
                    info!("Shutdown signal received");
                    request_stop(&stop);
                }
                Err(e) => warn!("Cannot listen for shutdown signals: {}", e),
            }
        });
    });
    Ok(())
}

#[cfg(unix)]
async fn shutdown_signal() -> io::Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut terminate = signal(SignalKind::terminate())?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => result,
        _ = terminate.recv() => Ok(()),
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() -> io::Result<()> {
    tokio::signal::ctrl_c().await
}

/// Never blocks: a stop already pending is as good as a second one.
fn request_stop(stop: &Sender<()>) {
    let _ = stop.try_send(());
}

/// Requests a stop when a line arrives on stdin. A closed stdin is ignored so that
/// piped or detached runs continue until the source ends.
fn spawn_stop_listener(stop: Sender<()>) {
    thread::spawn(move || {
        let mut line = String::new();
        if let Ok(n) = io::stdin().lock().read_line(&mut line) {
            if n > 0 {
                request_stop(&stop);
            }
        }
    });
}
