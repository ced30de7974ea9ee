use std::sync::Arc;

use tuner_core::pitch::YinEstimator;
use tuner_core::fallback::AutocorrelationEstimator;
use tuner_core::{
    AudioFrame, EngineConfig, FrameError, FrameSource, PitchEngine, PitchEstimate, SineSource,
    TuningReference,
};

const SAMPLE_RATE: u32 = 48_000;
const FRAME_SIZE: usize = 4096;

fn sine_frame(freq: f32) -> AudioFrame {
    SineSource::new(freq, 0.5, SAMPLE_RATE, FRAME_SIZE)
        .read_frame()
        .unwrap()
}

/// Fixed-seed uniform noise in [-amplitude, amplitude].
fn noise_frame(amplitude: f32, seed: u64) -> AudioFrame {
    let mut state = seed;
    let samples = (0..FRAME_SIZE)
        .map(|_| {
            state = state
                .wrapping_mul(6_364_136_223_846_793_005)
                .wrapping_add(1_442_695_040_888_963_407);
            let unit = (state >> 40) as f32 / (1u64 << 24) as f32;
            (unit * 2.0 - 1.0) * amplitude
        })
        .collect();
    AudioFrame::new(samples, SAMPLE_RATE)
}

/// A 0.5-amplitude sine buried in fixed-seed noise.
fn noisy_sine_frame(freq: f32, noise: f32, seed: u64) -> AudioFrame {
    let tone = sine_frame(freq);
    let hiss = noise_frame(noise, seed);
    let samples = tone
        .samples()
        .iter()
        .zip(hiss.samples())
        .map(|(t, n)| t + n)
        .collect();
    AudioFrame::new(samples, SAMPLE_RATE)
}

fn within_three_percent(detected: f32, played: f32) -> bool {
    (detected - played).abs() / played <= 0.03
}

fn engine_with(reference: &Arc<TuningReference>) -> PitchEngine {
    PitchEngine::new(EngineConfig::default(), Arc::clone(reference)).unwrap()
}

#[test]
fn yin_finds_a440_within_one_percent() {
    let estimate = YinEstimator::from_config(&EngineConfig::default()).estimate(&sine_frame(440.0));
    let freq = estimate.frequency.unwrap();
    assert!((freq - 440.0).abs() < 4.4, "got {freq}");
    assert!(estimate.probability >= 0.9);
}

#[test]
fn silent_frame_yields_nothing_anywhere() {
    let config = EngineConfig::default();
    let silence = AudioFrame::new(vec![0.0; FRAME_SIZE], SAMPLE_RATE);

    assert_eq!(YinEstimator::from_config(&config).estimate(&silence), PitchEstimate::none());
    assert_eq!(
        AutocorrelationEstimator::from_config(&config).estimate(&silence, 0.0),
        PitchEstimate::none()
    );

    let mut engine = engine_with(&Arc::new(TuningReference::default()));
    engine.start();
    assert_eq!(engine.process_frame(&silence), Ok(None));
    assert!(engine.smoother().history().is_empty());
}

#[test]
fn white_noise_never_becomes_a_note() {
    let mut engine = engine_with(&Arc::new(TuningReference::default()));
    engine.start();
    for seed in 1..=5 {
        assert_eq!(engine.process_frame(&noise_frame(0.5, seed)), Ok(None));
    }
    assert!(engine.smoother().history().is_empty());
}

#[test]
fn identical_input_gives_bit_identical_output() {
    let reference = Arc::new(TuningReference::default());
    let frame = sine_frame(392.0);

    let mut a = engine_with(&reference);
    let mut b = engine_with(&reference);
    let ea = a.process_frame(&frame).unwrap().unwrap();
    let eb = b.process_frame(&frame).unwrap().unwrap();

    assert_eq!(ea.note, eb.note);
    assert_eq!(ea.frequency.to_bits(), eb.frequency.to_bits());
    assert_eq!(ea.cents.to_bits(), eb.cents.to_bits());

    let pa = a.estimate(&frame);
    let pb = b.estimate(&frame);
    assert_eq!(pa.frequency.map(f32::to_bits), pb.frequency.map(f32::to_bits));
    assert_eq!(pa.probability.to_bits(), pb.probability.to_bits());
}

#[test]
fn reference_change_applies_on_next_cycle() {
    let reference = Arc::new(TuningReference::default());
    let mut engine = engine_with(&reference);
    let mut source = SineSource::new(440.0, 0.5, SAMPLE_RATE, FRAME_SIZE);
    engine.start();

    let before = engine.tick(&mut source).unwrap();
    reference.set(442.0);
    let after = engine.tick(&mut source).unwrap();

    assert_eq!(before.note, "A4");
    assert_eq!(after.note, "A4");
    assert!(after.cents < before.cents - 7.0, "{} vs {}", after.cents, before.cents);
}

#[test]
fn smoothing_follows_a_real_pitch_change() {
    let mut engine = engine_with(&Arc::new(TuningReference::default()));
    let mut source = SineSource::new(440.0, 0.5, SAMPLE_RATE, FRAME_SIZE);
    engine.start();

    for _ in 0..5 {
        assert_eq!(engine.tick(&mut source).unwrap().note, "A4");
    }

    source.set_frequency(493.88);
    let notes: Vec<String> = (0..3)
        .map(|_| engine.tick(&mut source).unwrap().note)
        .collect();
    // Two new values are outvoted by three old ones; the third flips it.
    assert_eq!(notes, vec!["A4", "A4", "B4"]);
}

#[test]
fn corrupt_frames_skip_the_cycle() {
    let mut engine = engine_with(&Arc::new(TuningReference::default()));
    engine.start();

    let mut samples = sine_frame(440.0).samples().to_vec();
    samples[10] = f32::NAN;
    assert_eq!(
        engine.process_frame(&AudioFrame::new(samples, SAMPLE_RATE)),
        Err(FrameError::NonFiniteSample { index: 10 })
    );
    assert!(engine.smoother().history().is_empty());
}

#[test]
fn smaller_frames_work_too() {
    let config = EngineConfig::with_frame_size(2048);
    let mut engine = PitchEngine::new(config, Arc::new(TuningReference::default())).unwrap();
    let mut source = SineSource::new(261.63, 0.5, 44_100, 2048);
    engine.start();
    let event = engine.tick(&mut source).unwrap();
    assert_eq!(event.note, "C4");
    assert_eq!(event.octave, 4);
}

#[test]
fn fallback_alone_reports_the_right_note() {
    // YIN's dips never go below zero, so every frame goes to the fallback.
    let config = EngineConfig {
        yin_threshold: 0.0,
        ..EngineConfig::default()
    };
    let frame = sine_frame(440.0);
    assert!(YinEstimator::from_config(&config).estimate(&frame).is_none());

    let mut engine = PitchEngine::new(config, Arc::new(TuningReference::default())).unwrap();
    let estimate = engine.estimate(&frame);
    assert!(estimate.probability > 0.9, "got {}", estimate.probability);

    let event = engine.process_frame(&frame).unwrap().expect("fallback should be accepted");
    assert_eq!(event.note, "A4");
    assert!(within_three_percent(event.frequency, 440.0), "got {}", event.frequency);
}

#[test]
fn noisy_tone_missed_by_yin_is_recovered_by_the_fallback() {
    let frame = noisy_sine_frame(659.25, 0.3, 3);
    assert!(YinEstimator::from_config(&EngineConfig::default()).estimate(&frame).is_none());

    let mut engine = engine_with(&Arc::new(TuningReference::default()));
    let event = engine.process_frame(&frame).unwrap().expect("fallback should be accepted");
    assert_eq!(event.note, "E5");
    assert!(within_three_percent(event.frequency, 659.25), "got {}", event.frequency);
}

#[test]
fn fallback_artifact_is_rejected() {
    // A low tone in noise: the autocorrelation walk stops on a noise wiggle
    // and proposes a period of a few samples.
    let config = EngineConfig::default();
    let frame = noisy_sine_frame(41.2, 0.3, 1);
    assert!(YinEstimator::from_config(&config).estimate(&frame).is_none());

    let raw = AutocorrelationEstimator::from_config(&config).estimate(&frame, 0.0);
    let proposed = raw.frequency.expect("fallback proposes a period");
    assert!(proposed > 1000.0, "got {proposed}");

    let mut engine = engine_with(&Arc::new(TuningReference::default()));
    assert!(engine.estimate(&frame).probability < config.acceptance_threshold);
    assert_eq!(engine.process_frame(&frame), Ok(None));
    assert!(engine.smoother().history().is_empty());
}

#[test]
fn fallback_events_stay_on_the_played_pitch() {
    let config = EngineConfig::default();
    let mut yin = YinEstimator::from_config(&config);
    let mut accepted = 0;

    for played in [41.2, 65.4, 110.0, 220.0, 440.0, 880.0] {
        for noise in [0.3, 0.35, 0.4, 0.45] {
            for seed in 1..=6 {
                let frame = noisy_sine_frame(played, noise, seed);
                if !yin.estimate(&frame).is_none() {
                    continue;
                }
                let mut engine = engine_with(&Arc::new(TuningReference::default()));
                if let Some(event) = engine.process_frame(&frame).unwrap() {
                    assert!(
                        within_three_percent(event.frequency, played),
                        "{played} Hz, noise {noise}, seed {seed}: got {} ({})",
                        event.note,
                        event.frequency
                    );
                    accepted += 1;
                }
            }
        }
    }
    assert!(accepted > 0, "no frame exercised an accepted fallback");
}
