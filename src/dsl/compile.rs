//! Compiler — walks a parsed [`Program`] into a sorted event list.
//!
//! Each event source (the top-level sequence, then every track in
//! declaration order) is walked once with a local time cursor starting at
//! zero, so tracks are concurrent on a shared timeline. Repeats and
//! pattern uses expand inline, with an expansion stack guarding against
//! pattern cycles.

use std::collections::HashMap;

use serde::Serialize;

use crate::event::{self, Event, EventKind};

use super::ast::*;
use super::error::CompileError;
use super::swing::apply_swing;

/// Velocity used for notes that do not specify one.
pub const DEFAULT_VELOCITY: f64 = 0.8;

/// The result of compiling a program.
#[derive(Debug, Clone, Serialize)]
pub struct CompiledSong {
    pub bpm: f64,
    pub events: Vec<Event>,
    /// Latest `t + dur` across all events; 0 when there are none.
    pub total_duration: f64,
    pub settings: Settings,
}

impl CompiledSong {
    pub fn event_count(&self) -> usize {
        self.events.len()
    }
}

/// Compile a program into a [`CompiledSong`].
pub fn compile_program(program: &Program) -> Result<CompiledSong, CompileError> {
    let instruments: HashMap<&str, &InstrumentDef> = program
        .instruments
        .iter()
        .map(|inst| (inst.name.as_str(), inst))
        .collect();
    let patterns: HashMap<&str, &PatternDef> = program
        .patterns
        .iter()
        .map(|pat| (pat.name.as_str(), pat))
        .collect();

    let mut events = Vec::new();

    // The top-level sequence plays on the default (first) instrument.
    if let Some(items) = &program.sequence {
        let fallback = InstrumentDef::default_lead();
        let default_inst = program.instruments.first().unwrap_or(&fallback);
        let mut walker = Walker::new(program.bpm, &patterns);
        walker.walk(items, default_inst, None)?;
        events.extend(walker.events);
    }

    for track in &program.tracks {
        let inst = instruments.get(track.instrument.as_str()).ok_or_else(|| {
            CompileError::compile(
                format!(
                    "unknown instrument '{}' in track '{}' ({})",
                    track.instrument,
                    track.name,
                    enumerate("instrument", instruments.keys().copied())
                ),
                track.line,
                track.col,
            )
        })?;
        let mut walker = Walker::new(program.bpm, &patterns);
        walker.walk(&track.items, inst, Some(&track.name))?;
        events.extend(walker.events);
    }

    event::sort_by_time(&mut events);
    let events = apply_swing(
        events,
        program.settings.swing,
        program.settings.grid,
        program.bpm,
    );

    let total_duration = event::total_duration(&events);
    Ok(CompiledSong {
        bpm: program.bpm,
        events,
        total_duration,
        settings: program.settings,
    })
}

/// Render a defined-name listing for reference diagnostics.
fn enumerate<'a>(noun: &str, names: impl Iterator<Item = &'a str>) -> String {
    let mut sorted: Vec<&str> = names.collect();
    if sorted.is_empty() {
        return format!("no {noun}s defined");
    }
    sorted.sort_unstable();
    format!("defined {noun}s: {}", sorted.join(", "))
}

/// Walks one event source, carrying the time cursor through expansions.
struct Walker<'a> {
    bpm: f64,
    patterns: &'a HashMap<&'a str, &'a PatternDef>,
    cursor: f64,
    events: Vec<Event>,
    /// Pattern names currently being expanded, for cycle detection.
    expanding: Vec<String>,
}

impl<'a> Walker<'a> {
    fn new(bpm: f64, patterns: &'a HashMap<&'a str, &'a PatternDef>) -> Self {
        Self {
            bpm,
            patterns,
            cursor: 0.0,
            events: Vec::new(),
            expanding: Vec::new(),
        }
    }

    fn walk(
        &mut self,
        items: &[SequenceItem],
        inst: &InstrumentDef,
        track: Option<&str>,
    ) -> Result<(), CompileError> {
        for item in items {
            match item {
                SequenceItem::Note {
                    pitch,
                    value,
                    velocity,
                } => {
                    let dur = value.seconds_at(self.bpm);
                    self.events.push(self.note_event(
                        *pitch,
                        dur,
                        velocity.unwrap_or(DEFAULT_VELOCITY),
                        inst,
                        track,
                    ));
                    self.cursor += dur;
                }
                SequenceItem::Rest { value } => {
                    let dur = value.seconds_at(self.bpm);
                    self.events.push(Event {
                        t: self.cursor,
                        dur,
                        kind: EventKind::Rest,
                        midi: None,
                        freq: None,
                        velocity: 0.0,
                        instrument: inst.name.clone(),
                        waveform: inst.waveform,
                        track: track.map(str::to_string),
                        gain: inst.gain,
                        adsr: inst.adsr,
                    });
                    self.cursor += dur;
                }
                SequenceItem::Chord {
                    pitches,
                    value,
                    velocity,
                } => {
                    // All chord notes share one onset; the cursor advances
                    // by the duration once.
                    let dur = value.seconds_at(self.bpm);
                    for pitch in pitches {
                        self.events.push(self.note_event(
                            *pitch,
                            dur,
                            velocity.unwrap_or(DEFAULT_VELOCITY),
                            inst,
                            track,
                        ));
                    }
                    self.cursor += dur;
                }
                SequenceItem::Repeat { count, items } => {
                    for _ in 0..*count {
                        self.walk(items, inst, track)?;
                    }
                }
                SequenceItem::PatternUse {
                    name,
                    repetitions,
                    line,
                    col,
                } => {
                    let pattern = self.patterns.get(name.as_str()).ok_or_else(|| {
                        CompileError::compile(
                            format!(
                                "unknown pattern '{name}' ({})",
                                enumerate("pattern", self.patterns.keys().copied())
                            ),
                            *line,
                            *col,
                        )
                    })?;
                    if self.expanding.iter().any(|n| n == name) {
                        let mut path = self.expanding.clone();
                        path.push(name.clone());
                        return Err(CompileError::compile(
                            format!("pattern cycle detected: {}", path.join(" -> ")),
                            *line,
                            *col,
                        ));
                    }
                    self.expanding.push(name.clone());
                    for _ in 0..*repetitions {
                        self.walk(&pattern.items, inst, track)?;
                    }
                    self.expanding.pop();
                }
            }
        }
        Ok(())
    }

    fn note_event(
        &self,
        pitch: crate::music::Pitch,
        dur: f64,
        velocity: f64,
        inst: &InstrumentDef,
        track: Option<&str>,
    ) -> Event {
        Event {
            t: self.cursor,
            dur,
            kind: EventKind::Note,
            midi: Some(pitch.midi()),
            freq: Some(pitch.frequency()),
            velocity,
            instrument: inst.name.clone(),
            waveform: inst.waveform,
            track: track.map(str::to_string),
            gain: inst.gain,
            adsr: inst.adsr,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::Compiler;
    use super::*;
    use crate::event::Waveform;

    fn compile(src: &str) -> CompiledSong {
        Compiler::compile(src).unwrap()
    }

    #[test]
    fn empty_source() {
        let song = compile("");
        assert!((song.bpm - 120.0).abs() < f64::EPSILON);
        assert_eq!(song.event_count(), 0);
        assert_eq!(song.total_duration, 0.0);
    }

    #[test]
    fn minimal_melody() {
        let song = compile("bpm 120\nseq: C4 1/4, D4 1/4");
        assert_eq!(song.event_count(), 2);
        let [a, b] = &song.events[..] else {
            panic!("expected 2 events")
        };
        assert_eq!(a.kind, EventKind::Note);
        assert!((a.t - 0.0).abs() < 1e-12);
        assert!((b.t - 0.5).abs() < 1e-12);
        assert!((a.dur - 0.5).abs() < 1e-12);
        assert_eq!(a.midi, Some(60));
        assert_eq!(b.midi, Some(62));
        assert!((a.velocity - DEFAULT_VELOCITY).abs() < f64::EPSILON);
        assert_eq!(a.instrument, "lead");
        assert_eq!(a.waveform, Waveform::Sine);
        assert!(a.track.is_none());
    }

    #[test]
    fn rest_has_no_pitch_and_zero_velocity() {
        let song = compile("seq: r 1/4, C4 1/4");
        let rest = &song.events[0];
        assert_eq!(rest.kind, EventKind::Rest);
        assert_eq!(rest.midi, None);
        assert_eq!(rest.freq, None);
        assert_eq!(rest.velocity, 0.0);
        // The rest still advances the cursor.
        assert!((song.events[1].t - 0.5).abs() < 1e-12);
    }

    #[test]
    fn chord_shares_onset_and_advances_once() {
        let song = compile("bpm 120\nseq: [C4 E4 G4] 1/2, D4 1/4");
        assert_eq!(song.event_count(), 4);
        for e in &song.events[..3] {
            assert!((e.t - 0.0).abs() < 1e-12);
            assert!((e.dur - 1.0).abs() < 1e-12);
        }
        let d4 = &song.events[3];
        assert_eq!(d4.midi, Some(62));
        assert!((d4.t - 1.0).abs() < 1e-12);
        assert!((d4.dur - 0.5).abs() < 1e-12);
    }

    #[test]
    fn chord_notes_sorted_by_midi() {
        let song = compile("seq: [G4 C4 E4] 1/2");
        let midis: Vec<_> = song.events.iter().map(|e| e.midi.unwrap()).collect();
        assert_eq!(midis, vec![60, 64, 67]);
    }

    #[test]
    fn repeat_block_flows_cursor() {
        let song = compile("bpm 120\nseq: x2 { C4 1/4, D4 1/4 }");
        assert_eq!(song.event_count(), 4);
        let times: Vec<_> = song.events.iter().map(|e| e.t).collect();
        assert_eq!(times, vec![0.0, 0.5, 1.0, 1.5]);
        let midis: Vec<_> = song.events.iter().map(|e| e.midi.unwrap()).collect();
        assert_eq!(midis, vec![60, 62, 60, 62]);
    }

    #[test]
    fn repeat_equivalent_to_literal_expansion() {
        let repeated = compile("seq: x2 { C4 1/4, D4 1/4 }");
        let literal = compile("seq: C4 1/4, D4 1/4, C4 1/4, D4 1/4");
        assert_eq!(repeated.events, literal.events);
    }

    #[test]
    fn pattern_use_with_repetitions() {
        let song = compile("bpm 120\npattern riff: C4 1/4, D4 1/4\nseq: use riff x2");
        assert_eq!(song.event_count(), 4);
        let times: Vec<_> = song.events.iter().map(|e| e.t).collect();
        assert_eq!(times, vec![0.0, 0.5, 1.0, 1.5]);
        let midis: Vec<_> = song.events.iter().map(|e| e.midi.unwrap()).collect();
        assert_eq!(midis, vec![60, 62, 60, 62]);
    }

    #[test]
    fn pattern_use_equivalent_to_inline_body() {
        let via_use = compile("pattern p: C4 1/8, E4 1/8\nseq: use p x3");
        let inline = compile("seq: x3 { C4 1/8, E4 1/8 }");
        assert_eq!(via_use.events, inline.events);
    }

    #[test]
    fn nested_pattern_use() {
        let song = compile("pattern a: C4 1/4\npattern b: use a x2, D4 1/4\nseq: use b");
        let midis: Vec<_> = song.events.iter().map(|e| e.midi.unwrap()).collect();
        assert_eq!(midis, vec![60, 60, 62]);
    }

    #[test]
    fn pattern_cycle_fails() {
        let err =
            Compiler::compile("pattern a: use b\npattern b: use a\nseq: use a").unwrap_err();
        assert!(err.message.contains("pattern cycle detected: a -> b -> a"));
    }

    #[test]
    fn self_referential_pattern_fails() {
        let err = Compiler::compile("pattern a: C4 1/4, use a\nseq: use a").unwrap_err();
        assert!(err.message.contains("pattern cycle detected: a -> a"));
    }

    #[test]
    fn unknown_pattern_enumerates_defined() {
        let err =
            Compiler::compile("pattern riff: C4 1/4\npattern bass: C2 1/4\nseq: use lick")
                .unwrap_err();
        assert!(err.message.contains("unknown pattern 'lick'"));
        assert!(err.message.contains("defined patterns: bass, riff"));
    }

    #[test]
    fn unknown_pattern_with_none_defined() {
        let err = Compiler::compile("seq: use lick").unwrap_err();
        assert!(err.message.contains("no patterns defined"));
    }

    #[test]
    fn two_tracks_concurrent() {
        let src = "bpm 120\ninst lead sine\ninst bass square\n\
                   track melody inst = lead: C4 1/4\n\
                   track bassline inst = bass: C2 1/4";
        let song = compile(src);
        assert_eq!(song.event_count(), 2);
        for e in &song.events {
            assert!((e.t - 0.0).abs() < 1e-12);
            assert!((e.dur - 0.5).abs() < 1e-12);
        }
        // Tie-break: track names sort bassline before melody.
        assert_eq!(song.events[0].track.as_deref(), Some("bassline"));
        assert_eq!(song.events[0].waveform, Waveform::Square);
        assert_eq!(song.events[0].midi, Some(36));
        assert_eq!(song.events[1].track.as_deref(), Some("melody"));
        assert_eq!(song.events[1].waveform, Waveform::Sine);
        assert_eq!(song.events[1].midi, Some(60));
    }

    #[test]
    fn two_tracks_with_repeats_interleave() {
        let src = "bpm 120\ninst lead sine\n\
                   track a inst = lead: x2 { C4 1/4 }\n\
                   track b inst = lead: x2 { E4 1/4 }";
        let song = compile(src);
        assert_eq!(song.event_count(), 4);
        let shape: Vec<_> = song
            .events
            .iter()
            .map(|e| (e.t, e.track.clone().unwrap()))
            .collect();
        assert_eq!(
            shape,
            vec![
                (0.0, "a".to_string()),
                (0.0, "b".to_string()),
                (0.5, "a".to_string()),
                (0.5, "b".to_string()),
            ]
        );
    }

    #[test]
    fn unknown_instrument_enumerates_defined() {
        let src = "inst lead sine\ninst bass square\ntrack x inst = led: C4 1/4";
        let err = Compiler::compile(src).unwrap_err();
        assert!(err.message.contains("unknown instrument 'led'"));
        assert!(err.message.contains("defined instruments: bass, lead"));
    }

    #[test]
    fn seq_and_tracks_share_timeline() {
        let src = "inst lead sine\nseq: C4 1/4\ntrack t inst = lead: E4 1/4";
        let song = compile(src);
        assert_eq!(song.event_count(), 2);
        assert!((song.events[0].t - 0.0).abs() < 1e-12);
        assert!((song.events[1].t - 0.0).abs() < 1e-12);
    }

    #[test]
    fn instrument_fields_attached_when_specified() {
        let src = "inst pad sawtooth gain = 0.5 attack = 0.02\nseq: C4 1/4";
        let song = compile(src);
        let e = &song.events[0];
        assert_eq!(e.instrument, "pad");
        assert_eq!(e.waveform, Waveform::Sawtooth);
        assert!((e.gain.unwrap() - 0.5).abs() < f64::EPSILON);
        let adsr = e.adsr.unwrap();
        assert!((adsr.attack - 0.02).abs() < f64::EPSILON);
        assert!((adsr.sustain - 0.7).abs() < f64::EPSILON);
    }

    #[test]
    fn instrument_fields_absent_when_unspecified() {
        let song = compile("inst lead sine\nseq: C4 1/4");
        assert!(song.events[0].gain.is_none());
        assert!(song.events[0].adsr.is_none());
    }

    #[test]
    fn total_duration_is_latest_end() {
        let song = compile("bpm 120\nseq: C4 1/4, D4 1/2");
        assert!((song.total_duration - 1.5).abs() < 1e-12);
    }

    #[test]
    fn events_sorted_by_time() {
        let src = "inst lead sine\nseq: C4 1/4, D4 1/4\n\
                   track t inst = lead: r 1/8, E4 1/4";
        let song = compile(src);
        for pair in song.events.windows(2) {
            assert!(pair[0].t <= pair[1].t);
        }
    }

    #[test]
    fn later_instrument_definition_shadows_earlier() {
        let src = "inst lead sine\ninst lead square\ntrack t inst = lead: C4 1/4";
        let song = compile(src);
        assert_eq!(song.events[0].waveform, Waveform::Square);
    }

    #[test]
    fn swing_applied_during_compile() {
        let src = "bpm 120\ngrid 16\nswing 0.5\nseq: C4 1/16, D4 1/16, E4 1/16, F4 1/16";
        let song = compile(src);
        let times: Vec<_> = song.events.iter().map(|e| e.t).collect();
        let expected = [0.0, 0.1875, 0.25, 0.4375];
        for (t, e) in times.iter().zip(expected.iter()) {
            assert!((t - e).abs() < 1e-9, "expected {e}, got {t}");
        }
    }
}
