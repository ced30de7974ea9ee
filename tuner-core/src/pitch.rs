//! # Pitch Detection Module
//!
//! This module implements the primary fundamental-frequency estimator used
//! by the detection cycle: the YIN algorithm (de Cheveigné & Kawahara,
//! 2002) with an absolute threshold, a descent to the true minimum, and
//! parabolic refinement.
//!
//! ## Features
//! - Cumulative mean normalized difference function
//! - First-dip search to avoid octave errors
//! - Parabolic interpolation for sub-sample accuracy
//! - Amplitude gating to filter out silence

use crate::audio::{AudioFrame, rms};
use crate::config::EngineConfig;

/// One estimator's opinion about the current frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PitchEstimate {
    /// Fundamental frequency in Hz, or `None` if no usable periodicity
    /// was found.
    pub frequency: Option<f32>,
    /// Heuristic confidence in `[0, 1]`.
    pub probability: f32,
}

impl PitchEstimate {
    /// Creates an estimate for a detected frequency.
    ///
    /// # Arguments
    /// * `frequency` - Fundamental frequency in Hz
    /// * `probability` - Confidence, clamped into `[0, 1]`
    pub fn new(frequency: f32, probability: f32) -> Self {
        Self {
            frequency: Some(frequency),
            probability: probability.clamp(0.0, 1.0),
        }
    }

    /// The "nothing found" estimate: no frequency, zero probability.
    pub fn none() -> Self {
        Self {
            frequency: None,
            probability: 0.0,
        }
    }

    pub fn is_none(&self) -> bool {
        self.frequency.is_none()
    }
}

/// Refines an extremum at integer position `tau` by fitting a parabola
/// through it and its two neighbours. Works for minima and maxima alike.
///
/// Falls back to the unrefined `tau` at the edges of `values` or when the
/// three points are collinear.
pub fn parabolic_interpolation(values: &[f32], tau: usize) -> f32 {
    if tau == 0 || tau + 1 >= values.len() {
        return tau as f32;
    }
    let y1 = values[tau - 1];
    let y2 = values[tau];
    let y3 = values[tau + 1];
    let denom = y1 - 2.0 * y2 + y3;
    if denom.abs() < 1e-12 {
        return tau as f32;
    }
    tau as f32 + (y1 - y3) / (2.0 * denom)
}

/// How much worse than a candidate lag a shorter sub-multiple of it may
/// look in `d'` and still be taken as the real period.
const SUBHARMONIC_TOLERANCE: f32 = 0.05;

/// YIN estimator with a reusable difference buffer.
///
/// The buffer keeps the cumulative mean normalized difference of the last
/// analyzed frame so [`YinEstimator::confidence_at`] can judge a period
/// proposed by another estimator.
#[derive(Debug, Clone)]
pub struct YinEstimator {
    threshold: f32,
    silence_threshold: f32,
    yin_buffer: Vec<f32>,
}

impl YinEstimator {
    /// Creates a YIN estimator.
    ///
    /// # Arguments
    /// * `threshold` - Absolute threshold a dip in `d'` must fall under
    /// * `silence_threshold` - Minimum RMS level for a frame to be analyzed
    pub fn new(threshold: f32, silence_threshold: f32) -> Self {
        Self {
            threshold,
            silence_threshold,
            yin_buffer: Vec::new(),
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        let mut estimator = Self::new(config.yin_threshold, config.silence_threshold);
        estimator.yin_buffer.reserve(config.frame_size / 2);
        estimator
    }

    /// Estimates the fundamental of `frame`.
    ///
    /// # Returns
    /// * The refined frequency with probability `1 - d'(τ)`, or
    ///   [`PitchEstimate::none`] for silent frames and frames without a dip
    ///   under the threshold
    pub fn estimate(&mut self, frame: &AudioFrame) -> PitchEstimate {
        let signal = frame.samples();
        let half = signal.len() / 2;

        // --- Noise Gate: Calculate RMS to filter out silence/noise ---
        let level = rms(signal);
        if level < self.silence_threshold || half < 3 {
            log::trace!("YIN: frame below silence gate (rms {:.5})", level);
            self.yin_buffer.clear();
            return PitchEstimate::none();
        }

        // --- Step 1: Difference function over a window of N/2 ---
        self.yin_buffer.clear();
        self.yin_buffer.resize(half, 0.0);
        for tau in 1..half {
            let mut diff = 0.0;
            for i in 0..half {
                let delta = signal[i] - signal[i + tau];
                diff += delta * delta;
            }
            self.yin_buffer[tau] = diff;
        }

        // --- Step 2: Cumulative mean normalized difference ---
        let mut running_sum = 0.0;
        self.yin_buffer[0] = 1.0;
        for tau in 1..half {
            running_sum += self.yin_buffer[tau];
            if running_sum != 0.0 {
                self.yin_buffer[tau] *= tau as f32 / running_sum;
            } else {
                self.yin_buffer[tau] = 1.0;
            }
        }

        // --- Step 3: First dip under the absolute threshold ---
        let Some(period) = self.find_dip() else {
            log::trace!("YIN: no dip under {}", self.threshold);
            return PitchEstimate::none();
        };

        // --- Step 4: Parabolic interpolation for better precision ---
        let refined = parabolic_interpolation(&self.yin_buffer, period);
        let frequency = frame.sample_rate() as f32 / refined;
        PitchEstimate::new(frequency, 1.0 - self.yin_buffer[period])
    }

    /// How well a period of `lag` samples explains the last analyzed frame.
    ///
    /// Reads `d'` at the rounded lag. A lag that is a multiple of a shorter
    /// lag with a comparable dip is a sub-harmonic and scores zero, as does
    /// any lag outside the analyzed range or after a silent frame.
    ///
    /// # Returns
    /// * `1 - d'(lag)` clamped into `[0, 1]`
    pub fn confidence_at(&self, lag: f32) -> f32 {
        let buffer = &self.yin_buffer;
        let tau = lag.round();
        if tau.is_nan() || tau < 1.0 || tau as usize >= buffer.len() {
            return 0.0;
        }
        let tau = tau as usize;
        let value = buffer[tau];

        for divisor in 2..=tau / 2 {
            let centre = (lag / divisor as f32).round() as usize;
            let lo = centre.saturating_sub(1).max(2);
            let hi = (centre + 1).min(buffer.len() - 1);
            if lo > hi {
                continue;
            }
            let nearby = buffer[lo..=hi].iter().copied().fold(f32::INFINITY, f32::min);
            if nearby <= value + SUBHARMONIC_TOLERANCE {
                log::trace!("YIN: lag {:.1} is a multiple of {}", lag, centre);
                return 0.0;
            }
        }
        (1.0 - value).clamp(0.0, 1.0)
    }

    /// Index of the first local minimum under the threshold. Once a lag
    /// drops below the threshold the search keeps descending so it lands on
    /// the bottom of the dip rather than its shoulder.
    fn find_dip(&self) -> Option<usize> {
        let buffer = &self.yin_buffer;
        let mut tau = (2..buffer.len()).find(|&tau| buffer[tau] < self.threshold)?;
        while tau + 1 < buffer.len() && buffer[tau + 1] < buffer[tau] {
            tau += 1;
        }
        Some(tau)
    }
}
