//! # Tuner Monitor
//!
//! Command-line driver for the note detection engine.
//!
//! ## Architecture
//! - **Main Thread**: monitor loop, one detection cycle every 150 ms
//! - **Control Thread**: reads `start` / `stop` / `a4 <hz>` / `quit` from stdin
//! - **Output Thread**: writes each note event to stdout as one JSON line
//! - **Communication**: Crossbeam channels between all three
//!
//! Logs go to stderr (`RUST_LOG`, default `info`) so stdout carries only
//! events.

use std::io::{self, BufRead, Write};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use anyhow::{Context, Result, anyhow, bail};
use crossbeam_channel::{Receiver, Sender};
use tuner_core::{
    ControlCommand, EngineConfig, MicrophoneSource, Monitor, NoteEvent, PitchEngine, SineSource,
    TICK_INTERVAL, TuningConfig, TuningReference,
};

/// Sample rate used by the synthetic source.
const SINE_SAMPLE_RATE: u32 = 48_000;
const SINE_AMPLITUDE: f32 = 0.5;

const USAGE: &str = "\
usage: tuner-monitor [--sine <hz>] [--a4 <hz>] [--frame-size <n>]

  --sine <hz>        analyse a generated sine instead of the microphone
  --a4 <hz>          set and remember the tuning reference (400-480)
  --frame-size <n>   samples per frame: 2048 or 4096 (default 4096)

stdin commands: start, stop, a4 <hz>, quit";

#[derive(Debug, Clone, PartialEq)]
struct Options {
    sine: Option<f32>,
    reference: Option<f32>,
    frame_size: usize,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            sine: None,
            reference: None,
            frame_size: EngineConfig::default().frame_size,
        }
    }
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<Option<Options>> {
    let mut options = Options::default();
    while let Some(arg) = args.next() {
        let mut value = |flag: &str| {
            args.next()
                .ok_or_else(|| anyhow!("{flag} needs a value"))
        };
        match arg.as_str() {
            "-h" | "--help" => return Ok(None),
            "--sine" => {
                let raw = value("--sine")?;
                options.sine = Some(raw.parse().with_context(|| format!("bad frequency '{raw}'"))?);
            }
            "--a4" => {
                let raw = value("--a4")?;
                options.reference =
                    Some(raw.parse().with_context(|| format!("bad reference '{raw}'"))?);
            }
            "--frame-size" => {
                let raw = value("--frame-size")?;
                options.frame_size = raw.parse().with_context(|| format!("bad frame size '{raw}'"))?;
            }
            other => bail!("unknown argument '{other}'\n\n{USAGE}"),
        }
    }
    Ok(Some(options))
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let Some(options) = parse_args(std::env::args().skip(1))? else {
        eprintln!("{USAGE}");
        return Ok(());
    };

    let mut settings = TuningConfig::load();
    if let Some(hz) = options.reference {
        settings = TuningConfig::new(hz);
        persist_reference(settings.reference_hz);
    }
    log::info!("Tuning reference A4 = {} Hz", settings.reference_hz);

    let tuning = Arc::new(TuningReference::new(settings.reference_hz));
    let engine = PitchEngine::new(
        EngineConfig::with_frame_size(options.frame_size),
        Arc::clone(&tuning),
    )
    .context("invalid engine configuration")?;

    let (control_tx, control_rx) = crossbeam_channel::unbounded();
    let (event_tx, event_rx) = crossbeam_channel::unbounded();
    let printer = spawn_event_printer(event_rx);
    spawn_control_reader(control_tx.clone(), Arc::clone(&tuning));

    // Monitoring begins right away; stdin can stop and restart it. This
    // sender stays alive so closing stdin does not end the session.
    control_tx.send(ControlCommand::Start)?;
    let ticks = crossbeam_channel::tick(TICK_INTERVAL);

    match options.sine {
        Some(freq) => {
            log::info!("Using synthetic {} Hz sine", freq);
            let source =
                SineSource::new(freq, SINE_AMPLITUDE, SINE_SAMPLE_RATE, options.frame_size);
            Monitor::new(engine, source).run(ticks, control_rx, event_tx);
        }
        None => {
            let source = MicrophoneSource::open(options.frame_size)
                .context("failed to start audio capture")?;
            Monitor::new(engine, source).run(ticks, control_rx, event_tx);
        }
    }

    printer
        .join()
        .map_err(|_| anyhow!("event printer panicked"))??;
    drop(control_tx);
    Ok(())
}

/// Writes every event as a JSON line until the monitor drops its sender.
fn spawn_event_printer(events: Receiver<NoteEvent>) -> JoinHandle<Result<()>> {
    thread::spawn(move || {
        let stdout = io::stdout();
        for event in events {
            let line = serde_json::to_string(&event)?;
            let mut out = stdout.lock();
            writeln!(out, "{line}")?;
            out.flush()?;
        }
        Ok(())
    })
}

/// Reads control lines from stdin for as long as it stays open.
fn spawn_control_reader(control: Sender<ControlCommand>, tuning: Arc<TuningReference>) {
    thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            if let Some(raw) = line.strip_prefix("a4") {
                match raw.trim().parse::<f32>() {
                    Ok(hz) => {
                        let stored = tuning.set(hz);
                        log::info!("Tuning reference A4 = {} Hz", stored);
                        persist_reference(stored);
                    }
                    Err(_) => log::warn!("Expected 'a4 <hz>', got '{}'", line),
                }
                continue;
            }

            match line.parse::<ControlCommand>() {
                Ok(command) => {
                    if control.send(command).is_err() || command == ControlCommand::Shutdown {
                        break;
                    }
                }
                Err(e) => log::warn!("{}", e),
            }
        }
        log::debug!("Control input closed");
    });
}

fn persist_reference(hz: f32) {
    match TuningConfig::new(hz).save() {
        Ok(path) => log::debug!("Saved tuning reference to {}", path.display()),
        Err(e) => log::warn!("Could not save tuning reference: {}", e),
    }
}
