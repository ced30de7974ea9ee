//! # Error Module
//!
//! Error types for frame validation and engine configuration.
//!
//! Nothing here is user-facing: a rejected frame skips one detection
//! cycle and is logged, a rejected configuration stops the engine from
//! being built at all.

use std::fmt;

/// Reasons a frame is refused before any pitch analysis runs.
#[derive(Debug, Clone, PartialEq)]
pub enum FrameError {
    /// The frame holds no samples.
    Empty,
    /// The frame length differs from the session's fixed frame size.
    LengthMismatch { expected: usize, actual: usize },
    /// A sample is NaN or infinite.
    NonFiniteSample { index: usize },
    /// The sample rate is zero.
    InvalidSampleRate(u32),
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameError::Empty => write!(f, "frame is empty"),
            FrameError::LengthMismatch { expected, actual } => {
                write!(f, "frame has {actual} samples, expected {expected}")
            }
            FrameError::NonFiniteSample { index } => {
                write!(f, "sample {index} is not finite")
            }
            FrameError::InvalidSampleRate(rate) => write!(f, "invalid sample rate {rate} Hz"),
        }
    }
}

impl std::error::Error for FrameError {}

/// Reasons an engine configuration or settings file is refused.
#[derive(Debug)]
pub enum ConfigError {
    /// Frame size is not a power of two within the supported range.
    InvalidFrameSize(usize),
    /// A threshold or probability lies outside its valid interval.
    InvalidThreshold { name: &'static str, value: f32 },
    /// The accepted frequency band is empty or not positive.
    InvalidFrequencyRange { min: f32, max: f32 },
    /// The smoothing history must hold at least one value.
    InvalidHistoryCapacity,
    /// No platform configuration directory could be resolved.
    NoConfigDir,
    Io(std::io::Error),
    Parse(serde_json::Error),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidFrameSize(size) => write!(
                f,
                "frame size {size} must be a power of two between {} and {}",
                crate::config::MIN_FRAME_SIZE,
                crate::config::MAX_FRAME_SIZE
            ),
            ConfigError::InvalidThreshold { name, value } => {
                write!(f, "{name} = {value} is out of range")
            }
            ConfigError::InvalidFrequencyRange { min, max } => {
                write!(f, "invalid frequency range ({min} Hz, {max} Hz)")
            }
            ConfigError::InvalidHistoryCapacity => {
                write!(f, "history capacity must be at least 1")
            }
            ConfigError::NoConfigDir => write!(f, "no configuration directory available"),
            ConfigError::Io(e) => write!(f, "settings I/O error: {e}"),
            ConfigError::Parse(e) => write!(f, "settings parse error: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io(e) => Some(e),
            ConfigError::Parse(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        ConfigError::Io(e)
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(e: serde_json::Error) -> Self {
        ConfigError::Parse(e)
    }
}
