//! Lexer for the sequencer DSL.
//!
//! Converts source text into a stream of [`Token`]s ending with `Eof`.
//! Words are accumulated over the class `[A-Za-z0-9_#/.]` and classified
//! by trying, in priority order: repeat, note, duration, decimal, integer,
//! keyword, identifier.

use super::error::CompileError;
use super::token::{Token, TokenKind};

pub struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    col: usize,
}

impl Lexer {
    pub fn new(source: &str) -> Self {
        Self {
            chars: source.chars().collect(),
            pos: 0,
            line: 1,
            col: 1,
        }
    }

    pub fn tokenize(&mut self) -> Result<Vec<Token>, CompileError> {
        let mut tokens = Vec::new();

        loop {
            self.skip_blank();

            if self.is_at_end() {
                tokens.push(Token {
                    kind: TokenKind::Eof,
                    line: self.line,
                    col: self.col,
                });
                break;
            }

            let ch = self.peek();
            let token = match ch {
                ',' => self.single_char(TokenKind::Comma),
                ':' => self.single_char(TokenKind::Colon),
                '=' => self.single_char(TokenKind::Eq),
                '[' => self.single_char(TokenKind::LBracket),
                ']' => self.single_char(TokenKind::RBracket),
                '{' => self.single_char(TokenKind::LBrace),
                '}' => self.single_char(TokenKind::RBrace),
                c if is_word_char(c) => self.lex_word()?,
                _ => {
                    return Err(CompileError::lex(
                        format!("unexpected character: '{ch}'"),
                        self.line,
                        self.col,
                    ));
                }
            };

            tokens.push(token);
        }

        Ok(tokens)
    }

    fn peek(&self) -> char {
        self.chars[self.pos]
    }

    fn peek_next(&self) -> Option<char> {
        self.chars.get(self.pos + 1).copied()
    }

    fn advance(&mut self) -> char {
        let ch = self.chars[self.pos];
        self.pos += 1;
        if ch == '\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        ch
    }

    fn is_at_end(&self) -> bool {
        self.pos >= self.chars.len()
    }

    /// Skip whitespace, line breaks, and `//` comments.
    fn skip_blank(&mut self) {
        loop {
            while !self.is_at_end() && self.peek().is_whitespace() {
                self.advance();
            }
            if !self.is_at_end() && self.peek() == '/' && self.peek_next() == Some('/') {
                while !self.is_at_end() && self.peek() != '\n' {
                    self.advance();
                }
                continue;
            }
            break;
        }
    }

    fn single_char(&mut self, kind: TokenKind) -> Token {
        let line = self.line;
        let col = self.col;
        self.advance();
        Token { kind, line, col }
    }

    fn lex_word(&mut self) -> Result<Token, CompileError> {
        let line = self.line;
        let col = self.col;
        let mut word = String::new();

        while !self.is_at_end() && is_word_char(self.peek()) {
            word.push(self.advance());
        }

        match classify(&word) {
            Some(kind) => Ok(Token { kind, line, col }),
            None => Err(CompileError::lex(
                format!("invalid token: '{word}'"),
                line,
                col,
            )),
        }
    }
}

fn is_word_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || matches!(ch, '_' | '#' | '/' | '.')
}

/// Classify a word by trying each literal shape in priority order, then
/// the keyword table, then the identifier shape.
fn classify(word: &str) -> Option<TokenKind> {
    if let Some(count) = as_repeat(word) {
        return Some(TokenKind::Repeat(count));
    }
    if as_note(word) {
        return Some(TokenKind::Note(word.to_string()));
    }
    if let Some((num, den)) = as_duration(word) {
        return Some(TokenKind::Duration(num, den));
    }
    if word.contains('.') {
        if let Ok(value) = word.parse::<f64>() {
            return Some(TokenKind::Decimal(value));
        }
    }
    if word.chars().all(|c| c.is_ascii_digit()) {
        if let Ok(value) = word.parse::<u64>() {
            return Some(TokenKind::Integer(value));
        }
    }
    if let Some(kw) = as_keyword(word) {
        return Some(kw);
    }
    if as_ident(word) {
        return Some(TokenKind::Ident(word.to_string()));
    }
    None
}

/// `x<digits>` or `X<digits>`.
fn as_repeat(word: &str) -> Option<u32> {
    let digits = word.strip_prefix(['x', 'X'])?;
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// `[A-Ga-g][#b]?<digits>`.
fn as_note(word: &str) -> bool {
    let mut chars = word.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() && c.to_ascii_uppercase() <= 'G' => {}
        _ => return false,
    }
    let rest: Vec<char> = chars.collect();
    let digits = match rest.first() {
        Some('#') | Some('b') => &rest[1..],
        _ => &rest[..],
    };
    !digits.is_empty() && digits.iter().all(|c| c.is_ascii_digit())
}

/// `<digits>/<digits>`.
fn as_duration(word: &str) -> Option<(u32, u32)> {
    let (num, den) = word.split_once('/')?;
    if num.is_empty()
        || den.is_empty()
        || !num.chars().all(|c| c.is_ascii_digit())
        || !den.chars().all(|c| c.is_ascii_digit())
    {
        return None;
    }
    Some((num.parse().ok()?, den.parse().ok()?))
}

fn as_keyword(word: &str) -> Option<TokenKind> {
    match word.to_ascii_lowercase().as_str() {
        "bpm" => Some(TokenKind::Bpm),
        "inst" => Some(TokenKind::Inst),
        "seq" => Some(TokenKind::Seq),
        "swing" => Some(TokenKind::Swing),
        "loop" => Some(TokenKind::Loop),
        "grid" => Some(TokenKind::Grid),
        "track" => Some(TokenKind::Track),
        "pattern" => Some(TokenKind::Pattern),
        "use" => Some(TokenKind::Use),
        "r" => Some(TokenKind::Rest),
        _ => None,
    }
}

fn as_ident(word: &str) -> bool {
    let mut chars = word.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
