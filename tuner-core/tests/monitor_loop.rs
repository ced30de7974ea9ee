use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, unbounded};
use tuner_core::{
    ControlCommand, EngineConfig, EngineState, Monitor, PitchEngine, SineSource, TuningReference,
};

fn monitor() -> Monitor<SineSource> {
    let engine =
        PitchEngine::new(EngineConfig::default(), Arc::new(TuningReference::default())).unwrap();
    Monitor::new(engine, SineSource::new(440.0, 0.5, 48_000, 4096))
}

#[test]
fn start_tick_stop_sequence() {
    // Zero-capacity channels make every send wait for the loop to take it,
    // so ticks and commands are handled in exactly the order sent here.
    let (tick_tx, tick_rx) = bounded(0);
    let (control_tx, control_rx) = bounded(0);
    let (event_tx, event_rx) = unbounded();

    let handle = thread::spawn(move || monitor().run(tick_rx, control_rx, event_tx));

    tick_tx.send(Instant::now()).unwrap(); // idle: ignored
    control_tx.send(ControlCommand::Start).unwrap();
    tick_tx.send(Instant::now()).unwrap();
    tick_tx.send(Instant::now()).unwrap();
    control_tx.send(ControlCommand::Stop).unwrap();
    tick_tx.send(Instant::now()).unwrap(); // idle again: ignored
    control_tx.send(ControlCommand::Shutdown).unwrap();

    let finished = handle.join().unwrap();
    assert_eq!(finished.cycles(), 2);
    assert_eq!(finished.engine().state(), EngineState::Idle);

    let events: Vec<_> = event_rx.try_iter().collect();
    assert_eq!(events.len(), 2);
    assert!(events.iter().all(|e| e.note == "A4"));
}

#[test]
fn second_start_does_not_restart_the_session() {
    let mut monitor = monitor();
    let (event_tx, event_rx) = unbounded();

    assert!(monitor.handle_command(ControlCommand::Start));
    assert!(monitor.handle_tick(&event_tx));
    assert!(monitor.handle_tick(&event_tx));
    assert!(monitor.handle_command(ControlCommand::Start));

    assert_eq!(monitor.engine().state(), EngineState::Running);
    assert_eq!(monitor.engine().smoother().history().len(), 2);
    assert_eq!(event_rx.try_iter().count(), 2);
}

#[test]
fn closed_control_channel_ends_the_loop() {
    let (_tick_tx, tick_rx) = unbounded::<Instant>();
    let (control_tx, control_rx) = unbounded();
    let (event_tx, _event_rx) = unbounded();
    drop(control_tx);

    let finished = monitor().run(tick_rx, control_rx, event_tx);
    assert_eq!(finished.cycles(), 0);
}

#[test]
fn closed_event_channel_ends_the_loop() {
    let (tick_tx, tick_rx) = unbounded();
    let (control_tx, control_rx) = unbounded();
    let (event_tx, event_rx) = unbounded();
    drop(event_rx);

    control_tx.send(ControlCommand::Start).unwrap();
    let handle = thread::spawn(move || monitor().run(tick_rx, control_rx, event_tx));

    // Keep ticking until the loop notices nobody is listening.
    while !handle.is_finished() {
        let _ = tick_tx.send(Instant::now());
        thread::sleep(Duration::from_millis(5));
    }
    let finished = handle.join().unwrap();
    assert!(finished.cycles() >= 1);
    drop(control_tx);
}
