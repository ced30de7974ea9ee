//! # Musical Tuning Module
//!
//! This module converts stabilized frequencies into musical notes under a
//! configurable concert pitch.
//!
//! ## Features
//! - MIDI-style note numbering (A4 = 69)
//! - Sharps-only chromatic names (C, C#, D, ... B)
//! - Signed cent deviation from the nearest equal-tempered semitone
//! - A shared, lock-free tuning reference that may change between cycles

use std::sync::atomic::{AtomicU32, Ordering};

use serde::{Deserialize, Serialize};

/// Default frequency of A4 in Hz.
pub const DEFAULT_REFERENCE_HZ: f32 = 440.0;
/// Lowest accepted A4 reference in Hz.
pub const MIN_REFERENCE_HZ: f32 = 400.0;
/// Highest accepted A4 reference in Hz.
pub const MAX_REFERENCE_HZ: f32 = 480.0;

/// Note number assigned to A4.
const A4_NOTE_NUMBER: i32 = 69;

const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// Clamps a reference pitch into the accepted range. Non-finite values
/// fall back to the default.
pub fn clamp_reference(hz: f32) -> f32 {
    if hz.is_finite() {
        hz.clamp(MIN_REFERENCE_HZ, MAX_REFERENCE_HZ)
    } else {
        DEFAULT_REFERENCE_HZ
    }
}

/// The frequency assigned to A4, shared between the engine (reader) and
/// whoever configures it (writer).
///
/// Stored as raw `f32` bits in an atomic so a write made between two cycles
/// is simply seen by the next one.
#[derive(Debug)]
pub struct TuningReference {
    bits: AtomicU32,
}

impl TuningReference {
    pub fn new(hz: f32) -> Self {
        Self {
            bits: AtomicU32::new(clamp_reference(hz).to_bits()),
        }
    }

    pub fn get(&self) -> f32 {
        f32::from_bits(self.bits.load(Ordering::Relaxed))
    }

    /// Stores a new reference, clamped, and returns the value stored.
    pub fn set(&self, hz: f32) -> f32 {
        let clamped = clamp_reference(hz);
        self.bits.store(clamped.to_bits(), Ordering::Relaxed);
        clamped
    }
}

impl Default for TuningReference {
    fn default() -> Self {
        Self::new(DEFAULT_REFERENCE_HZ)
    }
}

/// A detected note, ready for the transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteEvent {
    /// Name and octave as one token, e.g. `"C#3"`.
    pub note: String,
    pub octave: i32,
    /// Stabilized frequency in Hz.
    pub frequency: f32,
    /// Deviation from the nearest semitone, in `(-50, +50]`.
    pub cents: f32,
}

impl NoteEvent {
    /// The note name without its octave, e.g. `"C#"`.
    pub fn name(&self) -> &str {
        self.note.trim_end_matches(|c: char| c.is_ascii_digit() || c == '-')
    }
}

/// Fractional note number of `freq` relative to `reference_hz` (A4 = 69).
pub fn note_number(freq: f32, reference_hz: f32) -> f32 {
    12.0 * (freq / reference_hz).log2() + A4_NOTE_NUMBER as f32
}

/// Name (e.g. `"A"`) and octave of an integer note number.
pub fn note_name_and_octave(note_number: i32) -> (&'static str, i32) {
    let name = NOTE_NAMES[note_number.rem_euclid(12) as usize];
    let octave = note_number.div_euclid(12) - 1;
    (name, octave)
}

/// Rounds a fractional note number to the nearest semitone. Halves round
/// down so the deviation stays inside (-50, +50].
fn nearest_semitone(number: f32) -> f32 {
    (number - 0.5).ceil()
}

/// Maps a stabilized frequency to the nearest note under `reference_hz`.
///
/// Cents are a logarithmic unit of pitch measurement where:
/// - 100 cents = 1 semitone
/// - 1200 cents = 1 octave
/// - Positive values indicate sharpness, negative values indicate flatness
pub fn map_frequency(freq: f32, reference_hz: f32) -> NoteEvent {
    let number = note_number(freq, reference_hz);
    let nearest = nearest_semitone(number);
    let cents = 100.0 * (number - nearest);
    let (name, octave) = note_name_and_octave(nearest as i32);

    NoteEvent {
        note: format!("{name}{octave}"),
        octave,
        frequency: freq,
        cents,
    }
}
