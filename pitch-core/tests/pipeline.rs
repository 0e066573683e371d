use std::f32::consts::PI;
use std::path::PathBuf;

use approx::assert_abs_diff_eq;
use pitch_core::audio::{AudioSource, WavSource};
use pitch_core::fft::SpectralEstimator;
use pitch_core::sink::{ConsoleDisplay, DisplayMode, MidiWriter};
use pitch_core::tuning::note_frequency;
use pitch_core::{DetectorConfig, NoteEvent, NoteTracker, PitchDetector, Session, StopReason};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn sine(freq: f32, amplitude: f32, len: usize, sample_rate: u32) -> Vec<f32> {
    (0..len)
        .map(|i| amplitude * (2.0 * PI * freq * i as f32 / sample_rate as f32).sin())
        .collect()
}

fn temp_wav(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("pitch-core-{}-{}.wav", std::process::id(), name))
}

#[test]
fn spectrum_length_for_any_valid_frame() {
    let mut rng = StdRng::seed_from_u64(11);
    for (frame_size, pad_factor) in [(4096, 2), (2048, 1), (512, 3)] {
        let config = DetectorConfig { frame_size, pad_factor, ..Default::default() };
        let estimator = SpectralEstimator::new(&config);
        let frame: Vec<f32> = (0..frame_size).map(|_| rng.gen_range(-1.0..1.0)).collect();
        let spectrum = estimator.magnitudes(&frame).unwrap();
        assert_eq!(spectrum.len(), frame_size * pad_factor / 2 + 1);
    }
}

#[test]
fn sine_tones_land_within_one_bin() {
    let detector = PitchDetector::new(DetectorConfig::default()).unwrap();
    let config = detector.config().clone();
    // Low E guitar string up to the top of a 24-fret neck.
    for index in (40..=88).step_by(3) {
        let freq = note_frequency(index);
        let frame = sine(freq, 0.3, config.frame_size, config.sample_rate);
        let analysis = detector.analyze(&frame).unwrap();
        assert!(
            (analysis.frequency() - freq).abs() < config.bin_width(),
            "{} Hz detected as {} Hz",
            freq,
            analysis.frequency()
        );
        assert_eq!(analysis.mapping.index(), Some(index));
    }
}

#[test]
fn analysis_is_repeatable() {
    let detector = PitchDetector::new(DetectorConfig::default()).unwrap();
    let frame = sine(196.0, 0.4, 4096, 44_100);

    let estimator = SpectralEstimator::new(detector.config());
    assert_eq!(estimator.magnitudes(&frame).unwrap(), estimator.magnitudes(&frame).unwrap());
    assert_eq!(
        detector.enhanced_spectrum(&frame).unwrap(),
        detector.enhanced_spectrum(&frame).unwrap()
    );
    assert_eq!(detector.refined_peak(&frame).unwrap(), detector.refined_peak(&frame).unwrap());
    assert_eq!(detector.analyze(&frame).unwrap(), detector.analyze(&frame).unwrap());
}

#[test]
fn quiet_frames_never_start_a_note() {
    let detector = PitchDetector::new(DetectorConfig::default()).unwrap();
    let mut tracker = NoteTracker::new(820);
    let mut rng = StdRng::seed_from_u64(99);

    let loud = detector.analyze(&sine(440.0, 0.5, 4096, 44_100)).unwrap();
    tracker.update(loud.mapping.index(), loud.frequency(), &mut rng);

    for amplitude in [0.0, 0.001, 0.005, 0.0135] {
        let mut frame = sine(880.0, amplitude, 4096, 44_100);
        for s in frame.iter_mut() {
            *s += rng.gen_range(-0.001..0.001);
        }
        let analysis = detector.analyze(&frame).unwrap();
        assert_eq!(analysis.frequency(), 0.0);
        let events = tracker.update(analysis.mapping.index(), analysis.frequency(), &mut rng);
        assert!(events.iter().all(|e| matches!(e, NoteEvent::NoteOff { .. })));
    }
    assert_eq!(tracker.current(), None);
}

#[test]
fn refinement_improves_on_integer_bins() {
    let detector = PitchDetector::new(DetectorConfig::default()).unwrap();
    let width = detector.config().bin_width();
    // Halfway between two bins.
    let freq = 60.5 * width;
    let peak = detector.refined_peak(&sine(freq, 0.5, 4096, 44_100)).unwrap();
    assert_abs_diff_eq!(peak.bin, 60.5, epsilon = 0.2);
}

#[test]
fn wav_file_to_midi_bytes() {
    let path = temp_wav("melody");
    let spec = hound::WavSpec {
        channels: 2,
        sample_rate: 44_100,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(&path, spec).unwrap();
    let melody = [None, Some(329.63), Some(329.63), Some(392.0)];
    for note in melody {
        let frame = match note {
            Some(freq) => sine(freq, 0.5, 4096, 44_100),
            None => vec![0.0; 4096],
        };
        for s in frame {
            let v = (s * i16::MAX as f32) as i16;
            writer.write_sample(v).unwrap();
            writer.write_sample(v).unwrap();
        }
    }
    writer.finalize().unwrap();

    let config = DetectorConfig { max_fps: 0, ..Default::default() };
    let mut source = WavSource::open(&path, config.frame_size, config.sample_rate).unwrap();
    let mut display = ConsoleDisplay::new(Vec::new(), DisplayMode::Json);
    let mut midi = MidiWriter::new(Vec::new(), 1, 100).unwrap();
    let (_stop_tx, stop_rx) = crossbeam_channel::bounded(1);

    let session = Session::new(
        PitchDetector::new(config).unwrap(),
        &mut midi,
        StdRng::seed_from_u64(1),
    );
    let reason = session.run(&mut source, &mut display, &stop_rx, None).unwrap();
    std::fs::remove_file(&path).ok();

    assert_eq!(reason, StopReason::SourceEnded);
    let bytes = midi.into_inner();
    // bend, E4 on, E4 off, bend, G4 on, final G4 off.
    let status: Vec<u8> = bytes.chunks(3).map(|m| m[0]).collect();
    assert_eq!(status, vec![0xE0, 0x90, 0x80, 0xE0, 0x90, 0x80]);
    let notes: Vec<u8> = bytes.chunks(3).filter(|m| m[0] != 0xE0).map(|m| m[1]).collect();
    assert_eq!(notes, vec![64, 64, 67, 67]);
    assert_eq!(bytes[5], 100);

    let lines = String::from_utf8(display.into_inner()).unwrap();
    assert_eq!(lines.lines().count(), 4);
    assert!(lines.lines().nth(1).unwrap().contains("\"E4\""));
}

#[test]
fn wav_with_wrong_rate_is_rejected() {
    let path = temp_wav("rate");
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: 48_000,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };
    let mut writer = hound::WavWriter::create(&path, spec).unwrap();
    for s in sine(440.0, 0.5, 4096, 48_000) {
        writer.write_sample(s).unwrap();
    }
    writer.finalize().unwrap();

    let err = WavSource::open(&path, 4096, 44_100).unwrap_err();
    assert!(err.to_string().contains("48000 Hz"));

    let mut source = WavSource::open(&path, 4096, 48_000).unwrap();
    assert_eq!(source.next_frame().unwrap().map(|f| f.len()), Some(4096));
    assert_eq!(source.next_frame().unwrap(), None);
    std::fs::remove_file(&path).ok();
}
