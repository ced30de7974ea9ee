// tuner-core/src/lib.rs

//! The core logic for the live note monitor.
//! This crate turns time-domain audio frames into musical-note events:
//! YIN pitch estimation with an autocorrelation fallback, confidence
//! gating, median smoothing and note mapping. It is completely headless;
//! capture devices sit behind the `FrameSource` trait and events leave
//! through a channel.

pub mod audio;
pub mod config;
pub mod engine;
pub mod error;
pub mod fallback;
pub mod fft;
pub mod monitor;
pub mod pitch;
pub mod smoothing;
pub mod tuning;

pub use audio::{AudioFrame, FrameSource, MicrophoneSource, SineSource};
pub use config::{EngineConfig, TuningConfig};
pub use engine::{EngineState, PitchEngine};
pub use error::{ConfigError, FrameError};
pub use monitor::{ControlCommand, Monitor, TICK_INTERVAL};
pub use pitch::PitchEstimate;
pub use tuning::{NoteEvent, TuningReference};
