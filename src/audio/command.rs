//! Commands sent from the scheduler thread to the audio thread.

use crate::event::{Adsr, Waveform};

/// A note dispatch, flattened to what the audio thread needs to voice it.
#[derive(Debug, Clone, Copy)]
pub struct ScheduledNote {
    /// Onset in seconds on the engine clock.
    pub when: f64,
    pub freq: f64,
    /// Hold duration before the release phase begins.
    pub dur: f64,
    pub velocity: f64,
    pub waveform: Waveform,
    pub gain: f64,
    pub adsr: Adsr,
}

/// Commands crossing the ring buffer to the audio thread.
#[derive(Debug)]
pub enum SynthCommand {
    /// Start a voice at the note's scheduled time.
    Note(ScheduledNote),
    /// Set master volume (clamped to 0.0..=1.0 on the audio thread).
    SetVolume(f32),
    /// Drop all pending and sounding voices immediately.
    CancelAll,
}
