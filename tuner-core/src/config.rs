//! # Configuration Module
//!
//! Engine thresholds and the persisted tuning reference.
//!
//! `EngineConfig` gathers every constant the detection cycle depends on so
//! a session can be built with different thresholds without touching the
//! estimators. `TuningConfig` is the single persisted user preference: the
//! frequency assigned to A4.

use std::fs;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::tuning;

/// Smallest supported frame size (samples).
pub const MIN_FRAME_SIZE: usize = 2048;
/// Largest supported frame size (samples).
pub const MAX_FRAME_SIZE: usize = 4096;

/// Thresholds and sizes for one detection session.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Samples per frame; fixed for the lifetime of the session.
    pub frame_size: usize,
    /// Absolute threshold on the normalized difference function.
    pub yin_threshold: f32,
    /// RMS below which the YIN estimator treats a frame as silence.
    pub silence_threshold: f32,
    /// RMS below which the fallback estimator treats a frame as silence.
    pub fallback_silence_threshold: f32,
    /// Probability assigned to fallback estimates.
    pub fallback_probability: f32,
    /// Minimum probability for an estimate to reach the smoother.
    pub acceptance_threshold: f32,
    /// Exclusive lower bound of the accepted band (Hz).
    pub min_frequency: f32,
    /// Exclusive upper bound of the accepted band (Hz).
    pub max_frequency: f32,
    /// Number of accepted frequencies kept for the running median.
    pub history_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            frame_size: 4096,
            yin_threshold: 0.15,
            silence_threshold: 0.005,
            fallback_silence_threshold: 0.01,
            fallback_probability: 0.6,
            acceptance_threshold: 0.7,
            min_frequency: 20.0,
            max_frequency: 5000.0,
            history_capacity: 5,
        }
    }
}

impl EngineConfig {
    /// Same defaults with a different frame size.
    pub fn with_frame_size(frame_size: usize) -> Self {
        Self {
            frame_size,
            ..Self::default()
        }
    }

    /// Checks every field before an engine is built from this config.
    ///
    /// # Returns
    /// * `Ok(())` if the frame size is a power of two in
    ///   [`MIN_FRAME_SIZE`, `MAX_FRAME_SIZE`], the probabilities and YIN
    ///   threshold lie in `[0, 1]`, the silence levels are finite and
    ///   non-negative, `0 < min_frequency < max_frequency` and the history
    ///   holds at least one value
    /// * The first violated constraint as a [`ConfigError`] otherwise
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.frame_size.is_power_of_two()
            || !(MIN_FRAME_SIZE..=MAX_FRAME_SIZE).contains(&self.frame_size)
        {
            return Err(ConfigError::InvalidFrameSize(self.frame_size));
        }

        let unit_interval = [
            ("yin_threshold", self.yin_threshold),
            ("fallback_probability", self.fallback_probability),
            ("acceptance_threshold", self.acceptance_threshold),
        ];
        for (name, value) in unit_interval {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::InvalidThreshold { name, value });
            }
        }

        let amplitudes = [
            ("silence_threshold", self.silence_threshold),
            ("fallback_silence_threshold", self.fallback_silence_threshold),
        ];
        for (name, value) in amplitudes {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::InvalidThreshold { name, value });
            }
        }

        if !(self.min_frequency.is_finite()
            && self.max_frequency.is_finite()
            && self.min_frequency > 0.0
            && self.min_frequency < self.max_frequency)
        {
            return Err(ConfigError::InvalidFrequencyRange {
                min: self.min_frequency,
                max: self.max_frequency,
            });
        }

        if self.history_capacity == 0 {
            return Err(ConfigError::InvalidHistoryCapacity);
        }

        Ok(())
    }
}

/// Persisted tuning preference.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TuningConfig {
    /// Frequency of A4 in Hz.
    pub reference_hz: f32,
}

impl Default for TuningConfig {
    fn default() -> Self {
        Self {
            reference_hz: tuning::DEFAULT_REFERENCE_HZ,
        }
    }
}

impl TuningConfig {
    pub fn new(reference_hz: f32) -> Self {
        Self {
            reference_hz: tuning::clamp_reference(reference_hz),
        }
    }

    /// Location of the settings file for the current user.
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "tuner-monitor")
            .map(|dirs| dirs.config_dir().join("settings.json"))
    }

    /// Loads from the default location, falling back to 440 Hz.
    pub fn load() -> Self {
        Self::default_path()
            .map(|path| Self::load_from(&path))
            .unwrap_or_default()
    }

    /// Loads from `path`. Absent or invalid files, and references outside
    /// the accepted range, yield the default.
    pub fn load_from(path: &Path) -> Self {
        let parsed = fs::read_to_string(path)
            .ok()
            .and_then(|content| serde_json::from_str::<TuningConfig>(&content).ok());

        let accepted = tuning::MIN_REFERENCE_HZ..=tuning::MAX_REFERENCE_HZ;
        match parsed {
            Some(config) if accepted.contains(&config.reference_hz) => config,
            Some(config) => {
                log::warn!(
                    "Ignoring out-of-range reference {} in {}",
                    config.reference_hz,
                    path.display()
                );
                Self::default()
            }
            None => Self::default(),
        }
    }

    /// Saves to the default location.
    pub fn save(&self) -> Result<PathBuf, ConfigError> {
        let path = Self::default_path().ok_or(ConfigError::NoConfigDir)?;
        self.save_to(&path)?;
        Ok(path)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let clamped = Self::new(self.reference_hz);
        let content = serde_json::to_string_pretty(&clamped)?;
        fs::write(path, content)?;
        Ok(())
    }
}
