//! # Monitor Loop
//!
//! The periodic driver around a [`PitchEngine`]. A ticker channel supplies
//! the detection cadence, a control channel starts and stops monitoring,
//! and detected notes leave through an event channel.
//!
//! Everything runs on the calling thread: one message is handled at a
//! time, so cycles never overlap and a stop always falls between cycles.

use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender};

use crate::audio::FrameSource;
use crate::engine::PitchEngine;
use crate::tuning::NoteEvent;

/// Default period between detection cycles.
pub const TICK_INTERVAL: Duration = Duration::from_millis(150);

/// Commands accepted by a running monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlCommand {
    /// Begin monitoring with an empty history. Ignored while monitoring.
    Start,
    /// Stop monitoring and drop the history.
    Stop,
    /// Leave the loop.
    Shutdown,
}

impl std::str::FromStr for ControlCommand {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "start" => Ok(ControlCommand::Start),
            "stop" => Ok(ControlCommand::Stop),
            "quit" | "exit" | "shutdown" => Ok(ControlCommand::Shutdown),
            other => Err(format!("unknown command '{other}'")),
        }
    }
}

/// Periodic driver that owns a [`PitchEngine`] and the [`FrameSource`] it
/// reads from.
///
/// Ticks run one detection cycle while the engine is running and are
/// ignored otherwise. [`Monitor::run`] hands the monitor back when the loop
/// ends so callers can inspect it.
pub struct Monitor<S: FrameSource> {
    engine: PitchEngine,
    source: S,
    cycles: u64,
}

impl<S: FrameSource> Monitor<S> {
    /// Creates an idle monitor.
    ///
    /// # Arguments
    /// * `engine` - The engine to drive; its state is left untouched
    /// * `source` - Frame source; a frame size differing from the engine's
    ///   is logged, and every cycle on it will be skipped
    pub fn new(engine: PitchEngine, source: S) -> Self {
        if source.frame_size() != engine.config().frame_size {
            log::warn!(
                "Source delivers {} samples per frame but the engine expects {}",
                source.frame_size(),
                engine.config().frame_size
            );
        }
        Self {
            engine,
            source,
            cycles: 0,
        }
    }

    pub fn engine(&self) -> &PitchEngine {
        &self.engine
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Number of detection cycles run while monitoring.
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Applies a control command. Returns `false` when the loop should end.
    pub fn handle_command(&mut self, command: ControlCommand) -> bool {
        match command {
            ControlCommand::Start => self.engine.start(),
            ControlCommand::Stop => self.engine.stop(),
            ControlCommand::Shutdown => {
                log::info!("Monitor received shutdown");
                return false;
            }
        }
        true
    }

    /// Runs one cycle if monitoring and forwards any event. Returns `false`
    /// when the event receiver is gone.
    pub fn handle_tick(&mut self, events: &Sender<NoteEvent>) -> bool {
        if !self.engine.is_running() {
            return true;
        }
        self.cycles += 1;
        match self.engine.tick(&mut self.source) {
            Some(event) => events.send(event).is_ok(),
            None => true,
        }
    }

    /// Drives the engine until shutdown, a closed control channel, or a
    /// closed event channel. Returns the monitor for inspection.
    pub fn run(
        mut self,
        ticks: Receiver<Instant>,
        control: Receiver<ControlCommand>,
        events: Sender<NoteEvent>,
    ) -> Self {
        log::debug!("Entering monitor loop");
        loop {
            crossbeam_channel::select! {
                recv(ticks) -> msg => match msg {
                    Ok(_) => {
                        if !self.handle_tick(&events) {
                            log::info!("Event receiver closed");
                            break;
                        }
                    }
                    Err(_) => {
                        log::info!("Ticker closed");
                        break;
                    }
                },
                recv(control) -> msg => match msg {
                    Ok(command) => {
                        if !self.handle_command(command) {
                            break;
                        }
                    }
                    Err(_) => {
                        log::info!("Control channel closed");
                        break;
                    }
                },
            }
        }
        self.engine.stop();
        log::debug!("Monitor loop finished after {} cycles", self.cycles);
        self
    }
}
