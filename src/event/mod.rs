//! Compiled event stream — the data handed from the compiler to the scheduler.
//!
//! Events live in the seconds domain and are kept sorted by onset time with
//! a deterministic tie-break so identical programs always compile to
//! identical event lists.

pub mod types;

pub use types::{Adsr, Event, EventKind, Waveform};

/// Sort events by onset time, breaking ties by track name then MIDI
/// number. Untracked events compare under the name `default`, the same
/// substitution the scheduler's track filter uses.
///
/// The sort is stable, so events that compare equal keep their emission
/// order.
pub fn sort_by_time(events: &mut [Event]) {
    events.sort_by(|a, b| {
        a.t.total_cmp(&b.t)
            .then_with(|| a.track_name().cmp(b.track_name()))
            .then_with(|| a.midi.cmp(&b.midi))
    });
}

/// Total span of an event list: the latest `t + dur`, or 0 when empty.
pub fn total_duration(events: &[Event]) -> f64 {
    events.iter().map(Event::end).fold(0.0, f64::max)
}
