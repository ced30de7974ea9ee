//! # Smoothing Module
//!
//! Turns per-frame estimates into a stable frequency.
//!
//! The [`ConfidenceGate`] throws away estimates that are missing, outside
//! the audible band, or not confident enough. Accepted frequencies go into
//! a bounded [`FrequencyHistory`] and the [`Smoother`] reports its median,
//! which ignores single-frame outliers but follows a real pitch change
//! within a few cycles.

use std::collections::VecDeque;

use crate::config::EngineConfig;
use crate::pitch::PitchEstimate;

/// Range and probability checks applied to every estimate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConfidenceGate {
    pub min_frequency: f32,
    pub max_frequency: f32,
    pub acceptance_threshold: f32,
}

impl ConfidenceGate {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            min_frequency: config.min_frequency,
            max_frequency: config.max_frequency,
            acceptance_threshold: config.acceptance_threshold,
        }
    }

    /// Returns the estimate's frequency if it passes, `None` otherwise.
    pub fn check(&self, estimate: &PitchEstimate) -> Option<f32> {
        let frequency = estimate.frequency?;
        if !frequency.is_finite()
            || frequency <= self.min_frequency
            || frequency >= self.max_frequency
        {
            log::debug!("Gate: {:.2} Hz is out of range", frequency);
            return None;
        }
        if estimate.probability < self.acceptance_threshold {
            log::debug!(
                "Gate: {:.2} Hz rejected with probability {:.3}",
                frequency,
                estimate.probability
            );
            return None;
        }
        Some(frequency)
    }
}

impl Default for ConfidenceGate {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}

/// Bounded FIFO of the most recently accepted frequencies.
#[derive(Debug, Clone, PartialEq)]
pub struct FrequencyHistory {
    values: VecDeque<f32>,
    capacity: usize,
}

impl FrequencyHistory {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            values: VecDeque::with_capacity(capacity + 1),
            capacity,
        }
    }

    /// Appends `frequency`, evicting the oldest entry once over capacity.
    pub fn push(&mut self, frequency: f32) {
        self.values.push_back(frequency);
        if self.values.len() > self.capacity {
            self.values.pop_front();
        }
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Entries from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = f32> + '_ {
        self.values.iter().copied()
    }

    /// Median of the stored values; even lengths average the two middle
    /// values. `None` when empty.
    pub fn median(&self) -> Option<f32> {
        if self.values.is_empty() {
            return None;
        }
        let mut sorted: Vec<f32> = self.values.iter().copied().collect();
        sorted.sort_by(f32::total_cmp);
        let mid = sorted.len() / 2;
        if sorted.len() % 2 == 0 {
            Some((sorted[mid - 1] + sorted[mid]) / 2.0)
        } else {
            Some(sorted[mid])
        }
    }
}

/// Gate plus history: the only writer of the frequency history.
#[derive(Debug, Clone)]
pub struct Smoother {
    gate: ConfidenceGate,
    history: FrequencyHistory,
}

impl Smoother {
    pub fn new(gate: ConfidenceGate, capacity: usize) -> Self {
        Self {
            gate,
            history: FrequencyHistory::new(capacity),
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(ConfidenceGate::from_config(config), config.history_capacity)
    }

    /// Folds an estimate into the history and returns the stabilized
    /// frequency, or `None` if the gate rejected it. Rejections leave the
    /// history untouched.
    pub fn update(&mut self, estimate: &PitchEstimate) -> Option<f32> {
        let frequency = self.gate.check(estimate)?;
        self.history.push(frequency);
        self.history.median()
    }

    pub fn reset(&mut self) {
        self.history.clear();
    }

    pub fn history(&self) -> &FrequencyHistory {
        &self.history
    }

    pub fn gate(&self) -> &ConfidenceGate {
        &self.gate
    }
}
