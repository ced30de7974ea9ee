//! # Audio Capture Module
//!
//! Frames and the sources that deliver them to the detection cycle.
//!
//! The engine never talks to an audio device directly. Every cycle asks a
//! [`FrameSource`] for the latest window of `N` samples; whether those come
//! from a microphone or a generator is invisible to the estimators.
//!
//! ## Features
//! - Immutable, validated [`AudioFrame`]s
//! - Microphone capture through CPAL with automatic mono downmix
//! - Sliding "latest window" buffering (no continuity between cycles)
//! - Deterministic sine generator for demos and tests

use std::collections::VecDeque;
use std::f64::consts::TAU;

use anyhow::{Result, anyhow};
use cpal::SupportedStreamConfigRange;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::{Receiver, TryRecvError};

use crate::error::FrameError;

/// Sample rate requested from capture devices.
pub const PREFERRED_SAMPLE_RATE: u32 = 48_000;

/// One window of time-domain samples and the rate they were taken at.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioFrame {
    samples: Vec<f32>,
    sample_rate: u32,
}

impl AudioFrame {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self { samples, sample_rate }
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Checks the frame against the session's fixed frame size.
    pub fn validate(&self, expected_len: usize) -> Result<(), FrameError> {
        if self.samples.is_empty() {
            return Err(FrameError::Empty);
        }
        if self.samples.len() != expected_len {
            return Err(FrameError::LengthMismatch {
                expected: expected_len,
                actual: self.samples.len(),
            });
        }
        if self.sample_rate == 0 {
            return Err(FrameError::InvalidSampleRate(self.sample_rate));
        }
        if let Some(index) = self.samples.iter().position(|s| !s.is_finite()) {
            return Err(FrameError::NonFiniteSample { index });
        }
        Ok(())
    }
}

/// Root-mean-square amplitude of a signal. Zero for an empty slice.
pub fn rms(signal: &[f32]) -> f32 {
    if signal.is_empty() {
        return 0.0;
    }
    (signal.iter().map(|&s| s * s).sum::<f32>() / signal.len() as f32).sqrt()
}

/// Anything that can hand the engine a frame on demand.
pub trait FrameSource {
    /// Sample rate of the frames this source produces.
    fn sample_rate(&self) -> u32;

    /// Fixed number of samples per frame.
    fn frame_size(&self) -> usize;

    /// The latest available window, or `None` if a full window has not
    /// been captured yet.
    fn read_frame(&mut self) -> Option<AudioFrame>;
}

/// Live microphone input from the default CPAL input device.
///
/// The device callback pushes every mono chunk through an unbounded
/// channel; `read_frame` drains whatever has arrived and returns the newest
/// `frame_size` samples, so the backlog between two reads never outlives
/// the read.
pub struct MicrophoneSource {
    stream: cpal::Stream,
    chunks: Receiver<Vec<f32>>,
    window: VecDeque<f32>,
    frame_size: usize,
    sample_rate: u32,
    disconnected: bool,
}

impl MicrophoneSource {
    /// Opens the default input device and starts streaming.
    ///
    /// # Audio Configuration
    /// - Sample Rate: as close to 48 kHz as the device allows
    /// - Format: 32-bit float
    /// - Channels: fewest available, downmixed to mono
    pub fn open(frame_size: usize) -> Result<Self> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| anyhow!("No input device available"))?;

        log::info!("Using audio input device: {}", device.name()?);

        let configs = device.supported_input_configs()?.collect::<Vec<_>>();
        let (supported_config, sample_rate) =
            find_supported_config(configs, PREFERRED_SAMPLE_RATE)
                .ok_or_else(|| anyhow!("No suitable f32 input format found"))?;

        let config: cpal::StreamConfig = supported_config
            .with_sample_rate(cpal::SampleRate(sample_rate))
            .into();
        let channels = usize::from(config.channels).max(1);

        log::info!(
            "Selected input format: {} Hz, {} channel(s), frame size {}",
            sample_rate,
            channels,
            frame_size
        );

        let (sender, chunks) = crossbeam_channel::unbounded();
        let err_fn = |err| log::error!("An error occurred on the audio stream: {}", err);

        let stream = device.build_input_stream(
            &config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                // A closed queue means the source is being torn down.
                let _ = sender.send(downmix(data, channels));
            },
            err_fn,
            None,
        )?;

        stream.play()?;

        Ok(Self {
            stream,
            chunks,
            window: VecDeque::with_capacity(frame_size * 2),
            frame_size,
            sample_rate,
            disconnected: false,
        })
    }
}

impl FrameSource for MicrophoneSource {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn frame_size(&self) -> usize {
        self.frame_size
    }

    fn read_frame(&mut self) -> Option<AudioFrame> {
        let open = drain_latest(&self.chunks, &mut self.window, self.frame_size);
        if !open && !self.disconnected {
            log::warn!("Audio stream stopped delivering samples");
            self.disconnected = true;
        }

        if self.window.len() < self.frame_size {
            return None;
        }
        Some(AudioFrame::new(
            self.window.iter().copied().collect(),
            self.sample_rate,
        ))
    }
}

impl Drop for MicrophoneSource {
    fn drop(&mut self) {
        if let Err(e) = self.stream.pause() {
            log::warn!("Error pausing input stream: {}", e);
        }
    }
}

/// Appends `chunk` and discards everything older than the last `capacity`
/// samples.
fn push_latest(window: &mut VecDeque<f32>, chunk: &[f32], capacity: usize) {
    window.extend(chunk.iter().copied());
    if window.len() > capacity {
        let excess = window.len() - capacity;
        window.drain(..excess);
    }
}

/// Moves every pending chunk into `window`, keeping the newest `capacity`
/// samples. Returns `false` once the sending side is gone.
fn drain_latest(chunks: &Receiver<Vec<f32>>, window: &mut VecDeque<f32>, capacity: usize) -> bool {
    loop {
        match chunks.try_recv() {
            Ok(chunk) => push_latest(window, &chunk, capacity),
            Err(TryRecvError::Empty) => return true,
            Err(TryRecvError::Disconnected) => return false,
        }
    }
}

/// Averages interleaved channels into a single mono channel.
fn downmix(data: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return data.to_vec();
    }
    data.chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

/// Finds the best supported audio configuration for the target sample rate.
///
/// Only 32-bit float formats qualify. Among those, fewer channels win, then
/// the smallest distance between the target and the supported rate range.
///
/// # Returns
/// * `Some((config, rate))` - Best matching configuration and the rate to request
/// * `None` - No suitable configuration found
fn find_supported_config(
    configs: Vec<SupportedStreamConfigRange>,
    target_rate: u32,
) -> Option<(SupportedStreamConfigRange, u32)> {
    let rate_for = |c: &SupportedStreamConfigRange| {
        target_rate.clamp(c.min_sample_rate().0, c.max_sample_rate().0)
    };

    configs
        .into_iter()
        .filter(|c| c.sample_format() == cpal::SampleFormat::F32)
        .min_by_key(|c| (c.channels(), rate_for(c).abs_diff(target_rate)))
        .map(|c| {
            let rate = rate_for(&c);
            (c, rate)
        })
}

/// Phase-continuous sine generator.
#[derive(Debug, Clone)]
pub struct SineSource {
    frequency: f64,
    amplitude: f32,
    sample_rate: u32,
    frame_size: usize,
    phase: f64,
}

impl SineSource {
    pub fn new(frequency: f32, amplitude: f32, sample_rate: u32, frame_size: usize) -> Self {
        Self {
            frequency: f64::from(frequency),
            amplitude,
            sample_rate,
            frame_size,
            phase: 0.0,
        }
    }

    /// Changes the generated pitch without resetting phase.
    pub fn set_frequency(&mut self, frequency: f32) {
        self.frequency = f64::from(frequency);
    }
}

impl FrameSource for SineSource {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn frame_size(&self) -> usize {
        self.frame_size
    }

    fn read_frame(&mut self) -> Option<AudioFrame> {
        let step = TAU * self.frequency / f64::from(self.sample_rate.max(1));
        let samples = (0..self.frame_size)
            .map(|_| {
                let value = self.amplitude * self.phase.sin() as f32;
                self.phase = (self.phase + step) % TAU;
                value
            })
            .collect();
        Some(AudioFrame::new(samples, self.sample_rate))
    }
}
