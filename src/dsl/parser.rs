//! Parser for the sequencer DSL.
//!
//! Recursive descent over the token stream, dispatching on the next token
//! at the top level. The parser never recovers: it aborts at the first
//! error, carrying the offending token's position.

use crate::event::{Adsr, Waveform};
use crate::music::{NoteValue, Pitch};

use super::ast::*;
use super::error::CompileError;
use super::token::{Token, TokenKind};

const GRID_CHOICES: [u64; 6] = [2, 4, 8, 16, 32, 64];
const MAX_SWING: f64 = 0.75;

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, pos: 0 }
    }

    pub fn parse(&mut self) -> Result<Program, CompileError> {
        let mut bpm: Option<f64> = None;
        let mut instruments = Vec::new();
        let mut patterns = Vec::new();
        let mut tracks = Vec::new();
        let mut sequence: Option<Vec<SequenceItem>> = None;
        let mut settings = Settings::default();

        while !self.is_at_end() {
            let t = self.peek().clone();
            match &t.kind {
                TokenKind::Bpm => {
                    if bpm.is_some() {
                        return Err(CompileError::parse("duplicate bpm directive", t.line, t.col));
                    }
                    self.advance();
                    let (value, vline, vcol) = self.expect_integer("number after bpm")?;
                    if value == 0 {
                        return Err(CompileError::parse("tempo must be positive", vline, vcol));
                    }
                    bpm = Some(value as f64);
                }
                TokenKind::Swing => {
                    self.advance();
                    let (value, vline, vcol) = self.expect_number("number after swing")?;
                    if !(0.0..=MAX_SWING).contains(&value) {
                        return Err(CompileError::parse(
                            format!("swing must be between 0 and {MAX_SWING}"),
                            vline,
                            vcol,
                        ));
                    }
                    settings.swing = value;
                }
                TokenKind::Loop => {
                    self.advance();
                    let (value, vline, vcol) = self.expect_integer("number after loop")?;
                    if value == 0 {
                        return Err(CompileError::parse(
                            "loop length must be at least 1 bar",
                            vline,
                            vcol,
                        ));
                    }
                    settings.loop_bars = value as u32;
                }
                TokenKind::Grid => {
                    self.advance();
                    let (value, vline, vcol) = self.expect_integer("number after grid")?;
                    if !GRID_CHOICES.contains(&value) {
                        return Err(CompileError::parse(
                            "grid must be one of 2, 4, 8, 16, 32, 64",
                            vline,
                            vcol,
                        ));
                    }
                    settings.grid = value as u32;
                }
                TokenKind::Inst => instruments.push(self.parse_inst()?),
                TokenKind::Pattern => patterns.push(self.parse_pattern()?),
                TokenKind::Track => tracks.push(self.parse_track()?),
                TokenKind::Seq => {
                    if sequence.is_some() {
                        return Err(CompileError::parse("duplicate seq block", t.line, t.col));
                    }
                    self.advance();
                    self.expect(TokenKind::Colon, "':' after seq")?;
                    sequence = Some(self.parse_items()?);
                }
                TokenKind::Eof => break,
                _ => {
                    return Err(CompileError::parse(
                        format!("unexpected token: {:?}", t.kind),
                        t.line,
                        t.col,
                    ));
                }
            }
        }

        if instruments.is_empty() {
            instruments.push(InstrumentDef::default_lead());
        }

        Ok(Program {
            bpm: bpm.unwrap_or(120.0),
            instruments,
            patterns,
            tracks,
            sequence,
            settings,
        })
    }

    /// `inst <name> <waveform> (<param> = <number>)*`
    fn parse_inst(&mut self) -> Result<InstrumentDef, CompileError> {
        self.advance(); // inst
        let (name, ..) = self.expect_ident("instrument name after inst")?;
        let (wave, wline, wcol) = self.expect_ident("waveform after instrument name")?;
        let waveform = Waveform::parse(&wave).ok_or_else(|| {
            CompileError::parse(
                format!("unknown waveform '{wave}' (expected sine, square, sawtooth, triangle)"),
                wline,
                wcol,
            )
        })?;

        let mut gain = None;
        let mut attack = None;
        let mut decay = None;
        let mut sustain = None;
        let mut release = None;

        while matches!(self.peek().kind, TokenKind::Ident(_))
            && self.peek_ahead(1).kind == TokenKind::Eq
        {
            let (key, kline, kcol) = self.expect_ident("parameter name")?;
            self.expect(TokenKind::Eq, "'=' after parameter name")?;
            let (value, vline, vcol) = self.expect_number(&format!("number after {key}"))?;
            match key.as_str() {
                "gain" => {
                    if !(0.0..=1.0).contains(&value) {
                        return Err(CompileError::parse(
                            "gain must be between 0 and 1",
                            vline,
                            vcol,
                        ));
                    }
                    gain = Some(value);
                }
                "sustain" => {
                    if !(0.0..=1.0).contains(&value) {
                        return Err(CompileError::parse(
                            "sustain must be between 0 and 1",
                            vline,
                            vcol,
                        ));
                    }
                    sustain = Some(value);
                }
                "attack" | "decay" | "release" => {
                    if value < 0.0 {
                        return Err(CompileError::parse(
                            format!("{key} must not be negative"),
                            vline,
                            vcol,
                        ));
                    }
                    match key.as_str() {
                        "attack" => attack = Some(value),
                        "decay" => decay = Some(value),
                        _ => release = Some(value),
                    }
                }
                _ => {
                    return Err(CompileError::parse(
                        format!("unknown instrument parameter '{key}'"),
                        kline,
                        kcol,
                    ));
                }
            }
        }

        // Any ADSR key implies the full envelope, with defaults filling
        // the omitted fields.
        let adsr = if attack.is_some() || decay.is_some() || sustain.is_some() || release.is_some()
        {
            let d = Adsr::default();
            Some(Adsr {
                attack: attack.unwrap_or(d.attack),
                decay: decay.unwrap_or(d.decay),
                sustain: sustain.unwrap_or(d.sustain),
                release: release.unwrap_or(d.release),
            })
        } else {
            None
        };

        Ok(InstrumentDef {
            name,
            waveform,
            gain,
            adsr,
        })
    }

    /// `pattern <name> : <items>`
    fn parse_pattern(&mut self) -> Result<PatternDef, CompileError> {
        self.advance(); // pattern
        let (name, ..) = self.expect_ident("pattern name after pattern")?;
        self.expect(TokenKind::Colon, "':' after pattern name")?;
        let items = self.parse_items()?;
        Ok(PatternDef { name, items })
    }

    /// `track <name> inst = <instrument> : <items>`
    fn parse_track(&mut self) -> Result<TrackDef, CompileError> {
        self.advance(); // track
        let (name, ..) = self.expect_ident("track name after track")?;
        self.expect(TokenKind::Inst, "'inst' after track name")?;
        self.expect(TokenKind::Eq, "'=' after inst")?;
        let (instrument, iline, icol) = self.expect_ident("instrument name after inst =")?;
        self.expect(TokenKind::Colon, "':' after instrument name")?;
        let items = self.parse_items()?;
        Ok(TrackDef {
            name,
            instrument,
            items,
            line: iline,
            col: icol,
        })
    }

    /// A run of sequence items, separated by optional commas and
    /// terminated by EOF, a top-level keyword, or `}`.
    fn parse_items(&mut self) -> Result<Vec<SequenceItem>, CompileError> {
        let mut items = Vec::new();

        loop {
            let t = self.peek().clone();
            match &t.kind {
                TokenKind::Eof | TokenKind::RBrace => break,
                kind if kind.is_top_level() => break,
                TokenKind::Comma => {
                    self.advance();
                }
                TokenKind::Rest => {
                    self.advance();
                    let value = self.expect_duration("duration after rest")?;
                    items.push(SequenceItem::Rest { value });
                }
                TokenKind::Note(_) => {
                    let pitch = self.parse_note_token()?;
                    let value = self.expect_duration("duration after note")?;
                    let velocity = self.parse_velocity_suffix()?;
                    items.push(SequenceItem::Note {
                        pitch,
                        value,
                        velocity,
                    });
                }
                TokenKind::LBracket => items.push(self.parse_chord()?),
                TokenKind::Repeat(count) => {
                    let count = *count;
                    if count == 0 {
                        return Err(CompileError::parse(
                            "repeat count must be at least 1",
                            t.line,
                            t.col,
                        ));
                    }
                    self.advance();
                    self.expect(TokenKind::LBrace, "'{' after repeat marker")?;
                    let inner = self.parse_items()?;
                    self.expect(TokenKind::RBrace, "'}' to close repeat block")?;
                    items.push(SequenceItem::Repeat {
                        count,
                        items: inner,
                    });
                }
                TokenKind::Use => {
                    self.advance();
                    let (name, nline, ncol) = self.expect_ident("pattern name after use")?;
                    let next = self.peek().clone();
                    let repetitions = if let TokenKind::Repeat(n) = next.kind {
                        if n == 0 {
                            return Err(CompileError::parse(
                                "repeat count must be at least 1",
                                next.line,
                                next.col,
                            ));
                        }
                        self.advance();
                        n
                    } else {
                        1
                    };
                    items.push(SequenceItem::PatternUse {
                        name,
                        repetitions,
                        line: nline,
                        col: ncol,
                    });
                }
                _ => {
                    return Err(CompileError::parse(
                        format!("unexpected token in sequence: {:?}", t.kind),
                        t.line,
                        t.col,
                    ));
                }
            }
        }

        Ok(items)
    }

    /// `[ <note>+ ] <duration> (vel = <number>)?`
    fn parse_chord(&mut self) -> Result<SequenceItem, CompileError> {
        let open = self.peek().clone();
        self.advance(); // '['

        let mut pitches = Vec::new();
        loop {
            let t = self.peek().clone();
            match &t.kind {
                TokenKind::Note(_) => pitches.push(self.parse_note_token()?),
                TokenKind::RBracket => {
                    self.advance();
                    break;
                }
                TokenKind::Eof => {
                    return Err(CompileError::parse(
                        "expected ']' to close chord",
                        t.line,
                        t.col,
                    ));
                }
                _ => {
                    return Err(CompileError::parse(
                        format!("expected note or ']' in chord, got {:?}", t.kind),
                        t.line,
                        t.col,
                    ));
                }
            }
        }

        if pitches.is_empty() {
            return Err(CompileError::parse(
                "chord must contain at least one note",
                open.line,
                open.col,
            ));
        }

        let value = self.expect_duration("duration after chord")?;
        let velocity = self.parse_velocity_suffix()?;
        Ok(SequenceItem::Chord {
            pitches,
            value,
            velocity,
        })
    }

    /// Consume a note token and validate its pitch.
    fn parse_note_token(&mut self) -> Result<Pitch, CompileError> {
        let t = self.peek().clone();
        match &t.kind {
            TokenKind::Note(name) => {
                self.advance();
                Pitch::parse(name).ok_or_else(|| {
                    CompileError::parse(
                        format!("octave out of range in note '{name}' (expected 0-9)"),
                        t.line,
                        t.col,
                    )
                })
            }
            _ => Err(CompileError::parse(
                format!("expected note, got {:?}", t.kind),
                t.line,
                t.col,
            )),
        }
    }

    /// Optional `vel = <number>` after a note or chord.
    fn parse_velocity_suffix(&mut self) -> Result<Option<f64>, CompileError> {
        if !matches!(&self.peek().kind, TokenKind::Ident(s) if s == "vel") {
            return Ok(None);
        }
        self.advance(); // vel
        self.expect(TokenKind::Eq, "'=' after vel")?;
        let (value, vline, vcol) = self.expect_number("number after vel =")?;
        if !(0.0..=1.0).contains(&value) {
            return Err(CompileError::parse(
                "velocity must be between 0 and 1",
                vline,
                vcol,
            ));
        }
        Ok(Some(value))
    }

    // --- Utility methods ---

    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek_ahead(&self, n: usize) -> &Token {
        &self.tokens[(self.pos + n).min(self.tokens.len() - 1)]
    }

    fn advance(&mut self) -> &Token {
        let t = &self.tokens[self.pos.min(self.tokens.len() - 1)];
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        t
    }

    fn is_at_end(&self) -> bool {
        self.peek().kind == TokenKind::Eof
    }

    fn expect(&mut self, kind: TokenKind, what: &str) -> Result<&Token, CompileError> {
        if std::mem::discriminant(&self.peek().kind) == std::mem::discriminant(&kind) {
            Ok(self.advance())
        } else {
            let t = self.peek();
            Err(CompileError::parse(
                format!("expected {what}, got {:?}", t.kind),
                t.line,
                t.col,
            ))
        }
    }

    fn expect_ident(&mut self, what: &str) -> Result<(String, usize, usize), CompileError> {
        let t = self.peek().clone();
        match t.kind {
            TokenKind::Ident(name) => {
                self.advance();
                Ok((name, t.line, t.col))
            }
            _ => Err(CompileError::parse(
                format!("expected {what}, got {:?}", t.kind),
                t.line,
                t.col,
            )),
        }
    }

    fn expect_integer(&mut self, what: &str) -> Result<(u64, usize, usize), CompileError> {
        let t = self.peek().clone();
        match t.kind {
            TokenKind::Integer(value) => {
                self.advance();
                Ok((value, t.line, t.col))
            }
            _ => Err(CompileError::parse(
                format!("expected {what}, got {:?}", t.kind),
                t.line,
                t.col,
            )),
        }
    }

    fn expect_number(&mut self, what: &str) -> Result<(f64, usize, usize), CompileError> {
        let t = self.peek().clone();
        match t.kind {
            TokenKind::Integer(value) => {
                self.advance();
                Ok((value as f64, t.line, t.col))
            }
            TokenKind::Decimal(value) => {
                self.advance();
                Ok((value, t.line, t.col))
            }
            _ => Err(CompileError::parse(
                format!("expected {what}, got {:?}", t.kind),
                t.line,
                t.col,
            )),
        }
    }

    fn expect_duration(&mut self, what: &str) -> Result<NoteValue, CompileError> {
        let t = self.peek().clone();
        match t.kind {
            TokenKind::Duration(num, den) => {
                self.advance();
                NoteValue::new(num, den).ok_or_else(|| {
                    CompileError::parse(
                        format!("duration parts must be positive in '{num}/{den}'"),
                        t.line,
                        t.col,
                    )
                })
            }
            _ => Err(CompileError::parse(
                format!("expected {what}, got {:?}", t.kind),
                t.line,
                t.col,
            )),
        }
    }
}
