//! Music primitives — pitch names and note durations.
//!
//! Pure, clock-free conversions used by the compiler and reusable as
//! library routines: pitch name → MIDI number → frequency, and duration
//! fraction → seconds at a tempo.

pub mod duration;
pub mod pitch;

pub use duration::NoteValue;
pub use pitch::{midi_to_freq, Accidental, Letter, Pitch};
