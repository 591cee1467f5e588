//! ANSI escape sequence parser
//!
//! Splits a chunk of shell output into text and color spans, or strips the
//! escape sequences entirely.
//!
//! Recognized grammar (ECMA-48):
//!
//! ```text
//! ESC  0x40-0x5A | 0x5C-0x5F                  (two-byte escape)
//! ESC  [  params(0x30-0x3F)*  inter(0x20-0x2F)*  final(0x40-0x7E)   (CSI)
//! ```
//!
//! Anything that starts with ESC but does not match is left as literal text.
//!
//! SGR parameters follow ECMA-48 rather than plain digit matching: an omitted
//! parameter means `0`, so `ESC[m` and the first slot of `ESC[;32m` reset the
//! color, and parameters are compared as numbers, so `031` is red.
//!
//! The parser is stateless between calls. A sequence split across two chunks
//! is not reassembled: its head renders as literal text in the first chunk.
//! Shell output reaches the parser as whole lines, so this only matters for
//! a line that itself ends mid-sequence.

use std::borrow::Cow;
use std::fmt;

const ESC: u8 = 0x1B;

/// Foreground colors understood by the renderer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnsiColor {
    Black,
    Red,
    Green,
    Yellow,
    Blue,
    Magenta,
    Cyan,
    White,
    Grey,
}

impl AnsiColor {
    /// Map an SGR parameter to a color. Only 30-37 and 90 are recognized.
    pub fn from_sgr(code: u16) -> Option<Self> {
        match code {
            30 => Some(Self::Black),
            31 => Some(Self::Red),
            32 => Some(Self::Green),
            33 => Some(Self::Yellow),
            34 => Some(Self::Blue),
            35 => Some(Self::Magenta),
            36 => Some(Self::Cyan),
            37 => Some(Self::White),
            90 => Some(Self::Grey),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Black => "black",
            Self::Red => "red",
            Self::Green => "green",
            Self::Yellow => "yellow",
            Self::Blue => "blue",
            Self::Magenta => "magenta",
            Self::Cyan => "cyan",
            Self::White => "white",
            Self::Grey => "grey",
        }
    }
}

impl fmt::Display for AnsiColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One piece of a parsed chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnsiSpan<'a> {
    /// Literal text between escape sequences (never empty)
    Text(&'a str),
    /// Switch the active foreground color
    ColorSwitch(AnsiColor),
    /// SGR 0: back to the default style
    Reset,
}

/// Scanner state while matching a single sequence
#[derive(Clone, Copy, PartialEq)]
enum ScanState {
    Escape,
    CsiParam,
    CsiIntermediate,
}

/// A matched escape sequence
struct Sequence<'a> {
    /// Index one past the final byte
    end: usize,
    /// Parameter bytes of a CSI sequence (empty otherwise)
    params: &'a [u8],
    /// Final byte of a CSI sequence
    final_byte: Option<u8>,
}

impl Sequence<'_> {
    fn is_sgr(&self) -> bool {
        self.final_byte == Some(b'm')
    }
}

/// Try to match an escape sequence starting at `start` (which must hold ESC)
fn scan_sequence(bytes: &[u8], start: usize) -> Option<Sequence<'_>> {
    let mut state = ScanState::Escape;
    let mut params_end = start + 2;
    let mut i = start + 1;

    while let Some(&byte) = bytes.get(i) {
        match state {
            ScanState::Escape => match byte {
                b'[' => state = ScanState::CsiParam,
                0x40..=0x5A | 0x5C..=0x5F => {
                    return Some(Sequence {
                        end: i + 1,
                        params: &[],
                        final_byte: None,
                    });
                }
                _ => return None,
            },
            ScanState::CsiParam => match byte {
                0x30..=0x3F => {}
                0x20..=0x2F => {
                    params_end = i;
                    state = ScanState::CsiIntermediate;
                }
                0x40..=0x7E => {
                    return Some(Sequence {
                        end: i + 1,
                        params: &bytes[start + 2..i],
                        final_byte: Some(byte),
                    });
                }
                _ => return None,
            },
            ScanState::CsiIntermediate => match byte {
                0x20..=0x2F => {}
                0x40..=0x7E => {
                    return Some(Sequence {
                        end: i + 1,
                        params: &bytes[start + 2..params_end],
                        final_byte: Some(byte),
                    });
                }
                _ => return None,
            },
        }
        i += 1;
    }

    // Ran out of input mid-sequence
    None
}

/// Item produced while walking a chunk
enum Token<'a> {
    Text(&'a str),
    Sequence(Sequence<'a>),
}

/// Walk `text` left to right, handing out literal runs and sequences
fn scan<'a>(text: &'a str, mut emit: impl FnMut(Token<'a>)) {
    let bytes = text.as_bytes();
    let mut last = 0;
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == ESC {
            if let Some(seq) = scan_sequence(bytes, i) {
                if i > last {
                    emit(Token::Text(&text[last..i]));
                }
                i = seq.end;
                last = i;
                emit(Token::Sequence(seq));
                continue;
            }
        }
        i += 1;
    }

    if last < bytes.len() {
        emit(Token::Text(&text[last..]));
    }
}

/// Remove every recognized escape sequence, leaving literal text untouched
pub fn strip(text: &str) -> Cow<'_, str> {
    if !text.as_bytes().contains(&ESC) {
        return Cow::Borrowed(text);
    }

    let mut out = String::with_capacity(text.len());
    scan(text, |token| {
        if let Token::Text(run) = token {
            out.push_str(run);
        }
    });
    Cow::Owned(out)
}

/// Decompose `text` into spans in left-to-right order
pub fn parse(text: &str) -> Vec<AnsiSpan<'_>> {
    let mut spans = Vec::new();
    scan(text, |token| match token {
        Token::Text(run) => spans.push(AnsiSpan::Text(run)),
        Token::Sequence(seq) if seq.is_sgr() => push_sgr(seq.params, &mut spans),
        Token::Sequence(_) => {}
    });
    spans
}

/// Emit one span per recognized SGR parameter; unknown ones are dropped
fn push_sgr(params: &[u8], spans: &mut Vec<AnsiSpan<'_>>) {
    for param in params.split(|&b| b == b';') {
        let code = if param.is_empty() {
            // ECMA-48: an omitted parameter means 0
            Some(0)
        } else {
            std::str::from_utf8(param)
                .ok()
                .and_then(|s| s.parse::<u16>().ok())
        };

        match code {
            Some(0) => spans.push(AnsiSpan::Reset),
            Some(n) => {
                if let Some(color) = AnsiColor::from_sgr(n) {
                    spans.push(AnsiSpan::ColorSwitch(color));
                }
            }
            None => {}
        }
    }
}
