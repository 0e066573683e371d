//! # Audio Sources
//!
//! Blocking frame sources feeding the detector:
//! - [`CpalSource`] captures live input through CPAL
//! - [`WavSource`] replays a WAV file for offline analysis
//!
//! Both hand out frames of exactly `frame_size` mono samples.

use std::path::Path;
use std::time::Duration;

use anyhow::{Result, anyhow, bail};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::SupportedStreamConfigRange;
use crossbeam_channel::{Receiver, Sender, TrySendError};
use log::{info, warn};

/// Number of complete frames the capture callback may queue ahead of the detector.
const QUEUE_DEPTH: usize = 4;
/// Shortest wait for a frame before the input is declared stalled.
const MIN_STALL_TIMEOUT: Duration = Duration::from_secs(2);

/// A blocking supplier of fixed-size audio frames.
pub trait AudioSource {
    /// Blocks until the next frame is available. `Ok(None)` means the stream ended.
    fn next_frame(&mut self) -> Result<Option<Vec<f32>>>;

    /// Frames lost to overflow since the source was opened.
    fn overflows(&self) -> u64 {
        0
    }
}

/// Averages interleaved channels down to mono.
pub fn downmix(interleaved: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return interleaved.to_vec();
    }
    interleaved
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

/// Splits incoming mono samples into exact frames and queues them without blocking.
struct FrameAssembler {
    frame_size: usize,
    pending: Vec<f32>,
    sender: Sender<Vec<f32>>,
    overflows: Sender<()>,
}

impl FrameAssembler {
    fn push(&mut self, samples: &[f32]) {
        self.pending.extend_from_slice(samples);

        // While we have enough data for a full frame, queue it.
        while self.pending.len() >= self.frame_size {
            let frame: Vec<f32> = self.pending.drain(..self.frame_size).collect();
            if let Err(TrySendError::Full(_)) = self.sender.try_send(frame) {
                let _ = self.overflows.try_send(());
            }
        }
    }
}

/// Receiving end of the capture callback: frames, overflow notices and stream errors.
struct FrameQueue {
    frames: Receiver<Vec<f32>>,
    overflow_events: Receiver<()>,
    errors: Receiver<String>,
    overflows: u64,
    stall_timeout: Duration,
}

impl FrameQueue {
    /// Waits for the next frame.
    ///
    /// # Returns
    /// * `Ok(Some(frame))` - the next complete frame
    /// * `Ok(None)` - the callback side hung up
    /// * `Err(e)` - the device reported an error, or no frame arrived within
    ///   `stall_timeout`
    fn next(&mut self) -> Result<Option<Vec<f32>>> {
        let frame = crossbeam_channel::select! {
            recv(self.errors) -> msg => match msg {
                Ok(err) => bail!("Audio stream failed: {}", err),
                // No error sender left means the stream is gone.
                Err(_) => None,
            },
            recv(self.frames) -> msg => msg.ok(),
            default(self.stall_timeout) => {
                bail!("No audio received for {:?}", self.stall_timeout)
            }
        };

        let lost = self.overflow_events.try_iter().count() as u64;
        if lost > 0 {
            self.overflows += lost;
            warn!("Audio overflow: dropped {} frame(s), {} total", lost, self.overflows);
        }
        Ok(frame)
    }
}

/// Live capture from the default input device.
pub struct CpalSource {
    // Kept alive for as long as frames are wanted.
    stream: cpal::Stream,
    queue: FrameQueue,
}

impl CpalSource {
    /// Opens the default input device at `sample_rate` and starts streaming.
    ///
    /// A mono f32 configuration is preferred; otherwise any f32 configuration covering
    /// the rate is used and downmixed.
    ///
    /// # Arguments
    /// * `frame_size` - Samples per frame handed to the detector
    /// * `sample_rate` - Capture rate in Hz; the device must support it
    ///
    /// # Returns
    /// * `Ok(source)` - A running capture stream
    /// * `Err(e)` - No input device, no usable f32 format, or the stream failed to start
    pub fn open(frame_size: usize, sample_rate: u32) -> Result<Self> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| anyhow!("No input device available"))?;

        info!("Using audio input device: {}", device.name()?);

        let configs = device.supported_input_configs()?.collect::<Vec<_>>();
        let supported_config = find_supported_config(configs, sample_rate)
            .ok_or_else(|| anyhow!("No f32 input format supports {} Hz", sample_rate))?;

        let channels = supported_config.channels() as usize;
        let config: cpal::StreamConfig = supported_config
            .with_sample_rate(cpal::SampleRate(sample_rate))
            .into();

        info!("Capturing {} channel(s) at {} Hz", channels, sample_rate);

        let (frame_tx, frame_rx) = crossbeam_channel::bounded(QUEUE_DEPTH);
        let (overflow_tx, overflow_rx) = crossbeam_channel::unbounded();
        let (error_tx, error_rx) = crossbeam_channel::bounded(1);
        let mut assembler = FrameAssembler {
            frame_size,
            pending: Vec::with_capacity(frame_size * 2),
            sender: frame_tx,
            overflows: overflow_tx,
        };

        let err_fn = move |err: cpal::StreamError| {
            warn!("An error occurred on the audio stream: {}", err);
            let _ = error_tx.try_send(err.to_string());
        };

        let stream = device.build_input_stream(
            &config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                if channels == 1 {
                    assembler.push(data);
                } else {
                    assembler.push(&downmix(data, channels));
                }
            },
            err_fn,
            None,
        )?;

        stream.play()?;

        // Several frame periods without audio means the device is gone.
        let frame_period = Duration::from_secs_f64(frame_size as f64 / sample_rate as f64);
        Ok(Self {
            stream,
            queue: FrameQueue {
                frames: frame_rx,
                overflow_events: overflow_rx,
                errors: error_rx,
                overflows: 0,
                stall_timeout: (frame_period * 20).max(MIN_STALL_TIMEOUT),
            },
        })
    }
}

impl AudioSource for CpalSource {
    fn next_frame(&mut self) -> Result<Option<Vec<f32>>> {
        self.queue.next()
    }

    fn overflows(&self) -> u64 {
        self.queue.overflows
    }
}

impl Drop for CpalSource {
    fn drop(&mut self) {
        if let Err(e) = self.stream.pause() {
            warn!("Error pausing stream: {}", e);
        }
    }
}

/// Picks the input configuration to capture with.
///
/// Only f32 configurations whose rate range covers `target_rate` qualify; among those
/// fewer channels win.
fn find_supported_config(
    configs: Vec<SupportedStreamConfigRange>,
    target_rate: u32,
) -> Option<SupportedStreamConfigRange> {
    configs
        .into_iter()
        .filter(|c| c.sample_format() == cpal::SampleFormat::F32)
        .filter(|c| c.min_sample_rate().0 <= target_rate && target_rate <= c.max_sample_rate().0)
        .min_by_key(|c| c.channels())
}

/// Frames read from a WAV file.
#[derive(Debug)]
pub struct WavSource {
    samples: Vec<f32>,
    frame_size: usize,
    position: usize,
}

impl WavSource {
    /// Loads `path` and checks that it was recorded at `sample_rate`.
    ///
    /// Integer samples are scaled to [-1, 1] and all channels are averaged to mono.
    ///
    /// # Arguments
    /// * `path` - WAV file to read
    /// * `frame_size` - Samples per frame
    /// * `sample_rate` - Rate the detector expects, in Hz
    ///
    /// # Returns
    /// * `Ok(source)` - Source yielding the file's whole frames
    /// * `Err(e)` - Unreadable file or mismatched sample rate
    pub fn open<P: AsRef<Path>>(path: P, frame_size: usize, sample_rate: u32) -> Result<Self> {
        let path = path.as_ref();
        let mut reader = hound::WavReader::open(path)?;
        let spec = reader.spec();
        if spec.sample_rate != sample_rate {
            bail!(
                "{} is sampled at {} Hz, expected {} Hz",
                path.display(),
                spec.sample_rate,
                sample_rate
            );
        }

        let interleaved: Vec<f32> = match spec.sample_format {
            hound::SampleFormat::Float => reader.samples::<f32>().collect::<Result<_, _>>()?,
            hound::SampleFormat::Int => {
                let scale = 1.0 / (1_i64 << (spec.bits_per_sample - 1)) as f32;
                reader
                    .samples::<i32>()
                    .map(|s| s.map(|v| v as f32 * scale))
                    .collect::<Result<_, _>>()?
            }
        };

        info!(
            "Loaded {} ({} channel(s), {} samples per channel)",
            path.display(),
            spec.channels,
            interleaved.len() / spec.channels.max(1) as usize
        );

        Ok(Self::from_samples(downmix(&interleaved, spec.channels as usize), frame_size))
    }

    /// Wraps mono samples already in memory.
    pub fn from_samples(samples: Vec<f32>, frame_size: usize) -> Self {
        Self {
            samples,
            frame_size,
            position: 0,
        }
    }
}

impl AudioSource for WavSource {
    fn next_frame(&mut self) -> Result<Option<Vec<f32>>> {
        let end = self.position + self.frame_size;
        if end > self.samples.len() {
            // A trailing partial frame is dropped.
            return Ok(None);
        }
        let frame = self.samples[self.position..end].to_vec();
        self.position = end;
        Ok(Some(frame))
    }
}
