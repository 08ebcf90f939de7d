//! Abstract syntax tree for the sequencer DSL.
//!
//! A [`Program`] is the immutable result of parsing: directives,
//! instrument and pattern definitions, tracks, and an optional top-level
//! sequence. All nodes are tagged unions walked by exhaustive matches.

use serde::Serialize;

use crate::event::{Adsr, Waveform};
use crate::music::{NoteValue, Pitch};

/// A complete parsed program.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    /// Tempo in beats per minute. Defaults to 120 when no `bpm` directive
    /// appears.
    pub bpm: f64,
    /// Instrument directives in declaration order. Never empty: a default
    /// `lead` sine instrument is synthesized when the source declares none.
    /// The first entry is the implicit default instrument.
    pub instruments: Vec<InstrumentDef>,
    /// Named pattern definitions in declaration order.
    pub patterns: Vec<PatternDef>,
    /// Track definitions in declaration order.
    pub tracks: Vec<TrackDef>,
    /// The optional top-level `seq:` block.
    pub sequence: Option<Vec<SequenceItem>>,
    pub settings: Settings,
}

/// Global playback settings gathered from directives.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Settings {
    /// Swing amount in 0.0–0.75.
    pub swing: f64,
    /// Loop length in bars, at least 1.
    pub loop_bars: u32,
    /// Swing grid denominator: one of 2, 4, 8, 16, 32, 64.
    pub grid: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            swing: 0.0,
            loop_bars: 1,
            grid: 16,
        }
    }
}

/// An `inst` directive.
#[derive(Debug, Clone, PartialEq)]
pub struct InstrumentDef {
    pub name: String,
    pub waveform: Waveform,
    pub gain: Option<f64>,
    /// Set when any ADSR parameter appeared; omitted sub-fields are filled
    /// with defaults.
    pub adsr: Option<Adsr>,
}

impl InstrumentDef {
    /// The synthesized fallback instrument used when a program declares no
    /// instruments.
    pub fn default_lead() -> Self {
        Self {
            name: "lead".to_string(),
            waveform: Waveform::Sine,
            gain: None,
            adsr: None,
        }
    }
}

/// A named `pattern` definition.
#[derive(Debug, Clone, PartialEq)]
pub struct PatternDef {
    pub name: String,
    pub items: Vec<SequenceItem>,
}

/// A `track` definition referencing an instrument by name.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackDef {
    pub name: String,
    pub instrument: String,
    pub items: Vec<SequenceItem>,
    /// Position of the instrument reference, for compile-time diagnostics.
    pub line: usize,
    pub col: usize,
}

/// One item in a sequence body.
#[derive(Debug, Clone, PartialEq)]
pub enum SequenceItem {
    Note {
        pitch: Pitch,
        value: NoteValue,
        velocity: Option<f64>,
    },
    Rest {
        value: NoteValue,
    },
    Chord {
        pitches: Vec<Pitch>,
        value: NoteValue,
        velocity: Option<f64>,
    },
    Repeat {
        count: u32,
        items: Vec<SequenceItem>,
    },
    PatternUse {
        name: String,
        repetitions: u32,
        /// Position of the referenced name, for compile-time diagnostics.
        line: usize,
        col: usize,
    },
}
