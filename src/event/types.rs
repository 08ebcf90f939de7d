//! Event data model — the unit of compiled musical output.
//!
//! An [`Event`] is a note or rest placed on the seconds timeline, carrying
//! the instrument parameters the tone backend needs to voice it.

use serde::Serialize;

/// Oscillator waveform shapes an instrument can use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Waveform {
    Sine,
    Square,
    Sawtooth,
    Triangle,
}

impl Waveform {
    /// Parse a waveform name, case-insensitively. Returns `None` for
    /// anything outside the four supported shapes.
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "sine" => Some(Waveform::Sine),
            "square" => Some(Waveform::Square),
            "sawtooth" => Some(Waveform::Sawtooth),
            "triangle" => Some(Waveform::Triangle),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Waveform::Sine => "sine",
            Waveform::Square => "square",
            Waveform::Sawtooth => "sawtooth",
            Waveform::Triangle => "triangle",
        }
    }
}

/// Attack-Decay-Sustain-Release envelope parameters.
///
/// Times are in seconds; sustain is a level in 0.0–1.0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Adsr {
    pub attack: f64,
    pub decay: f64,
    pub sustain: f64,
    pub release: f64,
}

impl Default for Adsr {
    fn default() -> Self {
        Self {
            attack: 0.005,
            decay: 0.05,
            sustain: 0.7,
            release: 0.08,
        }
    }
}

/// Whether an event sounds or is silence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Note,
    Rest,
}

/// A single compiled event on the timeline.
///
/// Invariants: a `Note` has `midi` and `freq` set; a `Rest` has neither
/// and its velocity is 0.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Event {
    /// Onset in seconds from the start of the timeline.
    pub t: f64,
    /// Duration in seconds.
    pub dur: f64,
    pub kind: EventKind,
    pub midi: Option<u8>,
    pub freq: Option<f64>,
    /// 0.0–1.0; always 0 for rests.
    pub velocity: f64,
    /// Name of the governing instrument.
    pub instrument: String,
    pub waveform: Waveform,
    /// Owning track name, or `None` for the top-level sequence.
    pub track: Option<String>,
    /// Instrument gain, only if the directive specified one.
    pub gain: Option<f64>,
    /// Envelope, only if the directive set any ADSR parameter.
    pub adsr: Option<Adsr>,
}

impl Event {
    /// The track name used by mute/solo filtering.
    pub fn track_name(&self) -> &str {
        self.track.as_deref().unwrap_or("default")
    }

    /// End of the event: `t + dur`.
    pub fn end(&self) -> f64 {
        self.t + self.dur
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn waveform_parse_known() {
        assert_eq!(Waveform::parse("sine"), Some(Waveform::Sine));
        assert_eq!(Waveform::parse("square"), Some(Waveform::Square));
        assert_eq!(Waveform::parse("sawtooth"), Some(Waveform::Sawtooth));
        assert_eq!(Waveform::parse("triangle"), Some(Waveform::Triangle));
    }

    #[test]
    fn waveform_parse_case_insensitive() {
        assert_eq!(Waveform::parse("SINE"), Some(Waveform::Sine));
        assert_eq!(Waveform::parse("Triangle"), Some(Waveform::Triangle));
    }

    #[test]
    fn waveform_parse_unknown() {
        assert_eq!(Waveform::parse("noise"), None);
        assert_eq!(Waveform::parse(""), None);
    }

    #[test]
    fn waveform_name_round_trip() {
        for wf in [
            Waveform::Sine,
            Waveform::Square,
            Waveform::Sawtooth,
            Waveform::Triangle,
        ] {
            assert_eq!(Waveform::parse(wf.name()), Some(wf));
        }
    }

    #[test]
    fn adsr_defaults() {
        let a = Adsr::default();
        assert!((a.attack - 0.005).abs() < f64::EPSILON);
        assert!((a.decay - 0.05).abs() < f64::EPSILON);
        assert!((a.sustain - 0.7).abs() < f64::EPSILON);
        assert!((a.release - 0.08).abs() < f64::EPSILON);
    }

    #[test]
    fn track_name_defaults() {
        let e = Event {
            t: 0.0,
            dur: 0.5,
            kind: EventKind::Note,
            midi: Some(60),
            freq: Some(261.63),
            velocity: 0.8,
            instrument: "lead".into(),
            waveform: Waveform::Sine,
            track: None,
            gain: None,
            adsr: None,
        };
        assert_eq!(e.track_name(), "default");

        let mut tracked = e.clone();
        tracked.track = Some("melody".into());
        assert_eq!(tracked.track_name(), "melody");
    }

    #[test]
    fn event_end() {
        let e = Event {
            t: 1.5,
            dur: 0.25,
            kind: EventKind::Rest,
            midi: None,
            freq: None,
            velocity: 0.0,
            instrument: "lead".into(),
            waveform: Waveform::Sine,
            track: None,
            gain: None,
            adsr: None,
        };
        assert!((e.end() - 1.75).abs() < f64::EPSILON);
    }
}
