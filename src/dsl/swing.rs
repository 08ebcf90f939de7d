//! Swing — delays odd-numbered grid subdivisions by a fraction of the
//! subdivision period.
//!
//! Only events sitting exactly on an odd grid position move; downbeats and
//! off-grid events are untouched. "Exactly" uses a relative tolerance of
//! one thousandth of the subdivision period, which must be preserved so
//! different float accumulation strategies produce identical output.

use crate::event::{self, Event};

/// On-grid tolerance as a fraction of the subdivision period.
const GRID_EPSILON: f64 = 1e-3;

/// Apply swing to an event list and return it re-sorted.
///
/// `swing` is the fractional delay (0 disables the transform), `grid` the
/// subdivision denominator (16 for sixteenth notes), `bpm` the tempo the
/// events were compiled at.
pub fn apply_swing(mut events: Vec<Event>, swing: f64, grid: u32, bpm: f64) -> Vec<Event> {
    if swing <= 0.0 || grid == 0 || bpm <= 0.0 {
        return events;
    }

    let period = 60.0 / bpm * (4.0 / grid as f64);
    for e in &mut events {
        let slot = (e.t / period).round() as i64;
        let on_grid = (e.t - slot as f64 * period).abs() < GRID_EPSILON * period;
        if on_grid && slot % 2 != 0 {
            e.t = (e.t + swing * period).max(0.0);
        }
    }

    event::sort_by_time(&mut events);
    events
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{EventKind, Waveform};

    fn note_at(t: f64) -> Event {
        Event {
            t,
            dur: 0.125,
            kind: EventKind::Note,
            midi: Some(60),
            freq: Some(261.63),
            velocity: 0.8,
            instrument: "lead".into(),
            waveform: Waveform::Sine,
            track: None,
            gain: None,
            adsr: None,
        }
    }

    #[test]
    fn zero_swing_is_identity() {
        let events = vec![note_at(0.0), note_at(0.125), note_at(0.25)];
        let out = apply_swing(events.clone(), 0.0, 16, 120.0);
        assert_eq!(out, events);
    }

    #[test]
    fn odd_slots_shift_by_swing_fraction() {
        // 120 BPM, grid 16: period = 0.125s.
        let events = vec![note_at(0.0), note_at(0.125), note_at(0.25), note_at(0.375)];
        let out = apply_swing(events, 0.5, 16, 120.0);
        let times: Vec<_> = out.iter().map(|e| e.t).collect();
        let expected = [0.0, 0.1875, 0.25, 0.4375];
        for (t, e) in times.iter().zip(expected.iter()) {
            assert!((t - e).abs() < 1e-12, "expected {e}, got {t}");
        }
    }

    #[test]
    fn even_slots_unchanged() {
        let out = apply_swing(vec![note_at(0.0), note_at(0.25)], 0.5, 16, 120.0);
        assert_eq!(out[0].t, 0.0);
        assert_eq!(out[1].t, 0.25);
    }

    #[test]
    fn off_grid_events_unchanged() {
        // 0.15 is nowhere near a 0.125 multiple.
        let out = apply_swing(vec![note_at(0.15)], 0.5, 16, 120.0);
        assert!((out[0].t - 0.15).abs() < 1e-12);
    }

    #[test]
    fn near_grid_within_tolerance_shifts() {
        // Within 1e-3 of the period counts as on-grid.
        let period = 0.125;
        let nudge = period * 5e-4;
        let out = apply_swing(vec![note_at(period + nudge)], 0.5, 16, 120.0);
        assert!((out[0].t - (period + nudge + 0.5 * period)).abs() < 1e-12);
    }

    #[test]
    fn near_grid_outside_tolerance_stays() {
        let period = 0.125;
        let nudge = period * 2e-3;
        let out = apply_swing(vec![note_at(period + nudge)], 0.5, 16, 120.0);
        assert!((out[0].t - (period + nudge)).abs() < 1e-12);
    }

    #[test]
    fn result_is_sorted() {
        let events = vec![note_at(0.125), note_at(0.25)];
        let out = apply_swing(events, 0.75, 16, 120.0);
        for pair in out.windows(2) {
            assert!(pair[0].t <= pair[1].t);
        }
    }

    #[test]
    fn grid_scales_period() {
        // Grid 8 at 120 BPM: period = 0.25. The event at 0.25 is slot 1.
        let out = apply_swing(vec![note_at(0.25)], 0.5, 8, 120.0);
        assert!((out[0].t - 0.375).abs() < 1e-12);
    }

    #[test]
    fn rests_shift_too() {
        let mut rest = note_at(0.125);
        rest.kind = EventKind::Rest;
        rest.midi = None;
        rest.freq = None;
        rest.velocity = 0.0;
        let out = apply_swing(vec![rest], 0.5, 16, 120.0);
        assert!((out[0].t - 0.1875).abs() < 1e-12);
    }

    #[test]
    fn degenerate_inputs_are_identity() {
        let events = vec![note_at(0.125)];
        assert_eq!(apply_swing(events.clone(), 0.5, 0, 120.0), events);
        assert_eq!(apply_swing(events.clone(), 0.5, 16, 0.0), events);
        assert_eq!(apply_swing(events.clone(), -0.1, 16, 120.0), events);
    }
}
