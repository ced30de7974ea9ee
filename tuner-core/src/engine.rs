//! # Pitch Engine
//!
//! Owns every piece of state a detection session needs and runs one
//! detection cycle per driver tick:
//!
//! 1. YIN estimate
//! 2. Autocorrelation fallback, only if YIN found nothing
//! 3. Confidence gate and median smoothing
//! 4. Note mapping under the current tuning reference
//!
//! The engine has two states. Ticks while [`EngineState::Idle`] do
//! nothing; starting from idle clears the frequency history, stopping
//! abandons it. A start while already running changes nothing.
//! Cycles are synchronous, so a stop can never land in the middle of one.

use std::sync::Arc;

use crate::audio::{AudioFrame, FrameSource};
use crate::config::EngineConfig;
use crate::error::{ConfigError, FrameError};
use crate::fallback::AutocorrelationEstimator;
use crate::pitch::{PitchEstimate, YinEstimator};
use crate::smoothing::Smoother;
use crate::tuning::{self, NoteEvent, TuningReference};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// No monitoring; history is empty.
    Idle,
    /// Ticks run detection cycles.
    Running,
}

/// One detection session: both estimators, the smoother and a handle to the
/// shared tuning reference.
///
/// Built from a validated [`EngineConfig`]; every buffer the cycle needs is
/// owned here and reused between frames.
pub struct PitchEngine {
    config: EngineConfig,
    yin: YinEstimator,
    fallback: AutocorrelationEstimator,
    smoother: Smoother,
    tuning: Arc<TuningReference>,
    state: EngineState,
}

impl PitchEngine {
    /// Builds an idle engine. The tuning reference stays shared with the
    /// caller so it can be changed between cycles.
    pub fn new(config: EngineConfig, tuning: Arc<TuningReference>) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            yin: YinEstimator::from_config(&config),
            fallback: AutocorrelationEstimator::from_config(&config),
            smoother: Smoother::from_config(&config),
            tuning,
            state: EngineState::Idle,
            config,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == EngineState::Running
    }

    pub fn tuning(&self) -> &Arc<TuningReference> {
        &self.tuning
    }

    pub fn smoother(&self) -> &Smoother {
        &self.smoother
    }

    /// Idle → Running with an empty history. Ignored while running.
    pub fn start(&mut self) {
        if self.state == EngineState::Running {
            log::debug!("Start ignored: already monitoring");
            return;
        }
        self.smoother.reset();
        self.state = EngineState::Running;
        log::info!("Monitoring started");
    }

    /// Running → Idle. History is discarded.
    pub fn stop(&mut self) {
        self.smoother.reset();
        if self.state == EngineState::Running {
            log::info!("Monitoring stopped");
        }
        self.state = EngineState::Idle;
    }

    /// Runs one cycle on the source's latest frame. Does nothing while idle.
    ///
    /// Invalid frames skip the cycle with a warning; they never reach the
    /// caller as errors.
    pub fn tick<S: FrameSource + ?Sized>(&mut self, source: &mut S) -> Option<NoteEvent> {
        if !self.is_running() {
            return None;
        }
        let Some(frame) = source.read_frame() else {
            log::debug!("No full frame available yet");
            return None;
        };
        match self.process_frame(&frame) {
            Ok(event) => event,
            Err(e) => {
                log::warn!("Skipping cycle: {}", e);
                None
            }
        }
    }

    /// Runs one detection cycle on `frame`, whatever the engine state.
    pub fn process_frame(&mut self, frame: &AudioFrame) -> Result<Option<NoteEvent>, FrameError> {
        frame.validate(self.config.frame_size)?;

        let estimate = self.estimate(frame);
        let Some(frequency) = self.smoother.update(&estimate) else {
            return Ok(None);
        };

        let event = tuning::map_frequency(frequency, self.tuning.get());
        log::debug!(
            "Detected {} at {:.2} Hz ({:+.1} cents)",
            event.note,
            event.frequency,
            event.cents
        );
        Ok(Some(event))
    }

    /// YIN first; the fallback only when YIN returns no frequency. The
    /// fallback's period is then scored against YIN's normalized difference,
    /// which is the only way its estimate can beat its fixed probability.
    pub fn estimate(&mut self, frame: &AudioFrame) -> PitchEstimate {
        let estimate = self.yin.estimate(frame);
        if !estimate.is_none() {
            return estimate;
        }
        let yin = &self.yin;
        self.fallback.estimate_with(frame, |lag| yin.confidence_at(lag))
    }
}
