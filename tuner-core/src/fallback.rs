//! # Autocorrelation Fallback
//!
//! Secondary estimator used only when YIN finds no dip under its threshold.
//! It takes the strongest autocorrelation peak after the zero-lag lobe as
//! the period. It has no confidence measure of its own, so its estimates
//! carry a fixed probability unless the caller can vouch for the chosen
//! period with a stronger one.

use crate::audio::{AudioFrame, rms};
use crate::config::EngineConfig;
use crate::fft::{Autocorrelator, remove_dc_offset};
use crate::pitch::{PitchEstimate, parabolic_interpolation};

/// Autocorrelation pitch estimator with reusable FFT plans and buffers.
///
/// Removes the frame's DC offset, autocorrelates it over every lag and takes
/// the highest peak after the zero-lag lobe as the period.
pub struct AutocorrelationEstimator {
    silence_threshold: f32,
    probability: f32,
    correlator: Autocorrelator,
    signal: Vec<f32>,
    autocorr: Vec<f32>,
}

impl AutocorrelationEstimator {
    /// Creates a fallback estimator.
    ///
    /// # Arguments
    /// * `frame_size` - Expected frame length, used to plan the FFTs
    /// * `silence_threshold` - Minimum RMS level for a frame to be analyzed
    /// * `probability` - Fixed probability attached to every estimate
    pub fn new(frame_size: usize, silence_threshold: f32, probability: f32) -> Self {
        Self {
            silence_threshold,
            probability,
            correlator: Autocorrelator::new(frame_size),
            signal: Vec::with_capacity(frame_size),
            autocorr: Vec::with_capacity(frame_size),
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(
            config.frame_size,
            config.fallback_silence_threshold,
            config.fallback_probability,
        )
    }

    /// Estimates the fundamental of `frame`.
    ///
    /// `upstream_probability` is a confidence already computed for this
    /// frame; the result carries the larger of it and the fixed fallback
    /// probability.
    pub fn estimate(&mut self, frame: &AudioFrame, upstream_probability: f32) -> PitchEstimate {
        self.estimate_with(frame, |_| upstream_probability)
    }

    /// Like [`estimate`](Self::estimate), but the upstream probability is
    /// asked for once the period is known.
    ///
    /// # Arguments
    /// * `frame` - The frame to analyze
    /// * `upstream` - Called with the refined period in samples; returns a
    ///   confidence for that period
    pub fn estimate_with<F>(&mut self, frame: &AudioFrame, upstream: F) -> PitchEstimate
    where
        F: FnOnce(f32) -> f32,
    {
        let samples = frame.samples();
        let level = rms(samples);
        if level < self.silence_threshold {
            log::trace!("Fallback: frame below silence gate (rms {:.5})", level);
            return PitchEstimate::none();
        }
        if samples.len() > self.correlator.frame_len() {
            self.correlator = Autocorrelator::new(samples.len());
        }

        self.signal.clear();
        self.signal.extend_from_slice(samples);
        remove_dc_offset(&mut self.signal);
        self.correlator.compute(&self.signal, &mut self.autocorr);

        let Some(lag) = peak_lag(&self.autocorr) else {
            log::trace!("Fallback: no usable autocorrelation peak");
            return PitchEstimate::none();
        };

        let refined = parabolic_interpolation(&self.autocorr, lag);
        let frequency = frame.sample_rate() as f32 / refined;
        let probability = self.probability.max(upstream(refined));
        log::trace!("Fallback: {:.2} Hz (p {:.3})", frequency, probability);
        PitchEstimate::new(frequency, probability)
    }
}

/// Lag of the highest autocorrelation value after the zero-lag lobe.
///
/// Walks forward from lag 0 while the function keeps decreasing, then takes
/// the maximum over the remaining lags. Lags of 0 or 1 are degenerate.
fn peak_lag(autocorr: &[f32]) -> Option<usize> {
    let mut start = 0;
    while start + 1 < autocorr.len() && autocorr[start + 1] < autocorr[start] {
        start += 1;
    }

    let (offset, _) = autocorr[start..]
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))?;

    let lag = start + offset;
    (lag > 1).then_some(lag)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{FrameSource, SineSource};

    fn estimator() -> AutocorrelationEstimator {
        AutocorrelationEstimator::from_config(&EngineConfig::default())
    }

    #[test]
    fn finds_period_of_a_sine() {
        let frame = SineSource::new(440.0, 0.5, 48_000, 4096).read_frame().unwrap();
        let estimate = estimator().estimate(&frame, 0.0);
        let freq = estimate.frequency.unwrap();
        assert!((freq - 440.0).abs() / 440.0 < 0.01, "got {freq}");
        assert_eq!(estimate.probability, 0.6);
    }

    #[test]
    fn takes_stronger_upstream_probability() {
        let frame = SineSource::new(220.0, 0.5, 48_000, 4096).read_frame().unwrap();
        let mut fallback = estimator();
        assert_eq!(fallback.estimate(&frame, 0.85).probability, 0.85);
        assert_eq!(fallback.estimate(&frame, 0.3).probability, 0.6);
    }

    #[test]
    fn upstream_is_asked_about_the_chosen_period() {
        // 480 Hz at 48 kHz: 100 samples per period.
        let frame = SineSource::new(480.0, 0.5, 48_000, 4096).read_frame().unwrap();
        let mut asked = None;
        let estimate = estimator().estimate_with(&frame, |lag| {
            asked = Some(lag);
            0.9
        });
        let lag = asked.expect("upstream should be consulted");
        assert!((lag - 100.0).abs() < 0.5, "got {lag}");
        assert_eq!(estimate.probability, 0.9);
    }

    #[test]
    fn silence_gives_nothing() {
        let frame = AudioFrame::new(vec![0.0; 4096], 48_000);
        assert_eq!(estimator().estimate(&frame, 0.0), PitchEstimate::none());
    }

    #[test]
    fn peak_after_zero_lag_lobe() {
        let autocorr = [10.0, 6.0, 2.0, 1.0, 3.0, 7.0, 4.0, 2.0];
        assert_eq!(peak_lag(&autocorr), Some(5));
    }

    #[test]
    fn degenerate_lags_are_rejected() {
        // Rises immediately: the maximum after lag 0 is lag 1.
        assert_eq!(peak_lag(&[1.0, 5.0, 2.0, 0.5]), None);
        assert_eq!(peak_lag(&[]), None);
    }
}
