//! # Fast Fourier Transform (FFT) Module
//!
//! FFT helpers for time-domain pitch analysis. The fallback estimator needs
//! the full linear autocorrelation of a frame; computing it directly is
//! O(N²), so it is obtained from the power spectrum instead.
//!
//! ## Features
//! - High-performance FFT using RustFFT
//! - Zero-padded linear (not circular) autocorrelation
//! - DC offset removal

use std::sync::Arc;

use rustfft::{num_complex::Complex, Fft, FftPlanner};

/// Removes the DC offset from a signal by making its average value zero.
///
/// A constant offset adds a large, lag-independent term to the
/// autocorrelation that hides the periodic peaks.
pub fn remove_dc_offset(signal: &mut [f32]) {
    let len = signal.len();
    if len == 0 { return; }
    let avg = signal.iter().sum::<f32>() / len as f32;
    if avg.abs() > 1e-6 {
        for sample in signal.iter_mut() {
            *sample -= avg;
        }
    }
}

/// Planned forward/inverse transforms for computing autocorrelations of a
/// fixed frame length. Plans and the work buffer are reused across frames.
pub struct Autocorrelator {
    frame_len: usize,
    fft: Arc<dyn Fft<f32>>,
    ifft: Arc<dyn Fft<f32>>,
    buffer: Vec<Complex<f32>>,
}

impl Autocorrelator {
    pub fn new(frame_len: usize) -> Self {
        // Padding to at least 2N keeps the wrap-around of the circular
        // correlation out of lags 0..N.
        let fft_len = (frame_len.saturating_mul(2)).next_power_of_two().max(2);
        let mut planner = FftPlanner::new();
        Self {
            frame_len,
            fft: planner.plan_fft_forward(fft_len),
            ifft: planner.plan_fft_inverse(fft_len),
            buffer: vec![Complex { re: 0.0, im: 0.0 }; fft_len],
        }
    }

    pub fn frame_len(&self) -> usize {
        self.frame_len
    }

    /// Writes the unnormalized autocorrelation `r[lag] = Σ x[i]·x[i+lag]`
    /// for lags `0..signal.len()` into `out`.
    ///
    /// # Panics
    /// * If `signal` is longer than the planned frame length
    pub fn compute(&mut self, signal: &[f32], out: &mut Vec<f32>) {
        assert!(
            signal.len() <= self.frame_len,
            "signal longer than planned frame length"
        );

        self.buffer.fill(Complex { re: 0.0, im: 0.0 });
        for (slot, &sample) in self.buffer.iter_mut().zip(signal) {
            slot.re = sample;
        }

        self.fft.process(&mut self.buffer);
        for value in self.buffer.iter_mut() {
            *value = Complex { re: value.norm_sqr(), im: 0.0 };
        }
        self.ifft.process(&mut self.buffer);

        let scale = 1.0 / self.buffer.len() as f32;
        out.clear();
        out.extend(self.buffer.iter().take(signal.len()).map(|c| c.re * scale));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn direct_autocorrelation(signal: &[f32]) -> Vec<f32> {
        (0..signal.len())
            .map(|lag| {
                signal
                    .iter()
                    .zip(&signal[lag..])
                    .map(|(a, b)| a * b)
                    .sum()
            })
            .collect()
    }

    #[test]
    fn matches_direct_computation() {
        let signal: Vec<f32> = (0..64)
            .map(|i| (i as f32 * 0.3).sin() + 0.25 * (i as f32 * 1.7).cos())
            .collect();
        let mut corr = Autocorrelator::new(signal.len());
        let mut out = Vec::new();
        corr.compute(&signal, &mut out);

        let expected = direct_autocorrelation(&signal);
        assert_eq!(out.len(), expected.len());
        for (lag, (a, b)) in out.iter().zip(&expected).enumerate() {
            assert!((a - b).abs() < 1e-3, "lag {lag}: {a} vs {b}");
        }
    }

    #[test]
    fn dc_offset_is_removed() {
        let mut signal = vec![0.5, 1.5, 0.5, 1.5];
        remove_dc_offset(&mut signal);
        assert_eq!(signal, vec![-0.5, 0.5, -0.5, 0.5]);
    }
}
