//! Buffered character cursor with pushback and position restore.
//!
//! The lexer needs bounded lookahead over a byte stream: `getc` decodes
//! one UTF-8 character and advances the line/column/byte/parse counters;
//! `ungetc` pushes a character back *and* restores the exact position it
//! was read at, courtesy of a small ring of saved positions.

use std::collections::VecDeque;

use crate::error::{LexError, LexErrorKind, Result};
use crate::input::ParseInput;
use crate::token::Position;

/// Guaranteed pushback depth (characters).
pub const PUSHBACK_BUFSIZE: usize = 16;

/// Character cursor over a [`ParseInput`].
pub struct Cursor<'a> {
    input: ParseInput<'a>,
    /// Pushed-back characters, most recent last.
    pushback: Vec<char>,
    /// Positions before each of the most recent reads.
    history: VecDeque<Position>,
    /// Byte stashed while normalizing CR/LF.
    pending_byte: Option<u8>,
    pos: Position,
    /// Line number to report after the next newline (`#line` directives).
    line_override: Option<u32>,
}

impl<'a> Cursor<'a> {
    pub fn new(input: ParseInput<'a>) -> Self {
        Self {
            input,
            pushback: Vec::with_capacity(PUSHBACK_BUFSIZE),
            history: VecDeque::with_capacity(PUSHBACK_BUFSIZE),
            pending_byte: None,
            pos: Position::default(),
            line_override: None,
        }
    }

    /// Current position (start of the next unread character).
    #[inline]
    pub fn pos(&self) -> Position {
        self.pos
    }

    /// Report `line` as the line number of the next source line.
    pub fn set_next_line(&mut self, line: u32) {
        self.line_override = Some(line);
    }

    /// Read one character, or `None` at end of input.
    pub fn getc(&mut self) -> Result<Option<char>> {
        let c = match self.pushback.pop() {
            Some(c) => c,
            None => match self.read_char()? {
                Some(c) => c,
                None => return Ok(None),
            },
        };
        if self.history.len() == PUSHBACK_BUFSIZE {
            self.history.pop_front();
        }
        self.history.push_back(self.pos);
        self.advance(c);
        Ok(Some(c))
    }

    /// Push `c` back; the next `getc` returns it at its original position.
    pub fn ungetc(&mut self, c: char) {
        if let Some(p) = self.history.pop_back() {
            self.pos = p;
        }
        self.pushback.push(c);
    }

    /// Look at the next character without consuming it.
    pub fn peek(&mut self) -> Result<Option<char>> {
        match self.getc()? {
            Some(c) => {
                self.ungetc(c);
                Ok(Some(c))
            }
            None => Ok(None),
        }
    }

    /// Consume the next character when it equals `expected`.
    pub fn eat(&mut self, expected: char) -> Result<bool> {
        match self.getc()? {
            Some(c) if c == expected => Ok(true),
            Some(c) => {
                self.ungetc(c);
                Ok(false)
            }
            None => Ok(false),
        }
    }

    fn advance(&mut self, c: char) {
        self.pos.byte += c.len_utf8() as u32;
        match c {
            '\n' => {
                self.pos.line = match self.line_override.take() {
                    Some(line) => line,
                    None => self.pos.line + 1,
                };
                self.pos.parse += 1;
                self.pos.col = 0;
            }
            '\t' => {
                // tabs advance to the next 8-column stop
                self.pos.col = (self.pos.col / 8 + 1) * 8;
            }
            _ => self.pos.col += 1,
        }
    }

    fn next_byte(&mut self) -> Result<Option<u8>> {
        if let Some(b) = self.pending_byte.take() {
            return Ok(Some(b));
        }
        self.input
            .next_byte()
            .map_err(|e| LexError::new(LexErrorKind::Io(e.to_string()), self.pos.line, self.pos.col))
    }

    /// Decode one UTF-8 character, normalizing CR and CRLF to `\n`.
    fn read_char(&mut self) -> Result<Option<char>> {
        let b0 = match self.next_byte()? {
            Some(b) => b,
            None => return Ok(None),
        };
        if b0 == b'\r' {
            match self.next_byte()? {
                Some(b'\n') | None => {}
                Some(other) => self.pending_byte = Some(other),
            }
            return Ok(Some('\n'));
        }
        if b0 < 0x80 {
            return Ok(Some(b0 as char));
        }
        let len = match b0 {
            0xC2..=0xDF => 2,
            0xE0..=0xEF => 3,
            0xF0..=0xF4 => 4,
            _ => return Err(self.mbcs_error()),
        };
        let mut value = (b0 as u32) & (0x7F >> len);
        for _ in 1..len {
            let b = match self.next_byte()? {
                Some(b) if (0x80..=0xBF).contains(&b) => b,
                _ => return Err(self.mbcs_error()),
            };
            value = (value << 6) | (b as u32 & 0x3F);
        }
        match char::from_u32(value) {
            Some(c) => Ok(Some(c)),
            None => Err(self.mbcs_error()),
        }
    }

    fn mbcs_error(&self) -> LexError {
        LexError::new(LexErrorKind::InvalidMbcs, self.pos.line, self.pos.col)
    }
}
