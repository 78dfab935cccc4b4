//! Core lexer: dispatch and shared helpers.

use crate::cursor::Cursor;
use crate::error::{LexError, LexErrorKind, Result};
use crate::input::ParseInput;
use crate::token::{Position, SrcSpan, Token, TokenKind, TokenValue};

/// Lexer over a character stream.
///
/// `next_token` skips insignificant whitespace and returns the next
/// token; newlines are significant and come back as tokens of their own.
/// Comments and `#line` directives are returned too (the token-wrapping
/// layer records them in the parse data and hides them from the parser).
pub struct Lexer<'a> {
    pub cursor: Cursor<'a>,
    /// Current source file name as set by `#line` directives.
    pub src_file: Option<String>,
    /// Deferred lexer warnings (integer-literal conversions and the like).
    pub warnings: Vec<String>,
    token_start: Position,
}

impl<'a> Lexer<'a> {
    pub fn new(input: ParseInput<'a>) -> Self {
        Self {
            cursor: Cursor::new(input),
            src_file: None,
            warnings: Vec::new(),
            token_start: Position::default(),
        }
    }

    /// Position where the most recent token started.
    pub fn token_start(&self) -> Position {
        self.token_start
    }

    /// Scan and return the next token.
    pub fn next_token(&mut self) -> Result<Token> {
        loop {
            let start = self.cursor.pos();
            let c = match self.cursor.getc()? {
                Some(c) => c,
                None => {
                    self.token_start = start;
                    return Ok(self.finish(TokenKind::EndOfInput, "", TokenValue::None));
                }
            };
            if matches!(c, ' ' | '\t' | '\u{0c}' | '\u{a0}') {
                continue;
            }
            self.token_start = start;
            return self.dispatch(c);
        }
    }

    fn dispatch(&mut self, c: char) -> Result<Token> {
        match c {
            '\n' => Ok(self.finish(TokenKind::Newline, "\n", TokenValue::None)),
            '#' => self.lex_comment(),
            '"' | '\'' => self.lex_string(c),
            '`' => self.lex_backtick(),
            'r' | 'R' => {
                match self.cursor.peek()? {
                    Some('"') | Some('\'') => self.lex_raw_string(c),
                    _ => self.lex_identifier(c),
                }
            }
            '0'..='9' => self.lex_number(c),
            '.' => match self.cursor.peek()? {
                Some(d) if d.is_ascii_digit() => self.lex_number(c),
                _ => self.lex_identifier(c),
            },
            '_' => {
                // the pipe placeholder is a token of its own; an
                // underscore-led identifier is not a thing
                match self.cursor.peek()? {
                    Some(d) if is_ident_continue(d) => {
                        let mut text = String::from('_');
                        while let Some(d) = self.cursor.peek()? {
                            if is_ident_continue(d) {
                                self.cursor.getc()?;
                                text.push(d);
                            } else {
                                break;
                            }
                        }
                        Ok(self.finish(TokenKind::Error, text, TokenValue::None))
                    }
                    _ => Ok(self.finish(
                        TokenKind::Placeholder,
                        "_",
                        TokenValue::Name("_".to_string()),
                    )),
                }
            }
            c if is_ident_start(c) => self.lex_identifier(c),
            c => self.lex_operator(c),
        }
    }

    /// Build a token spanning from the recorded start to the current
    /// cursor position.
    pub(super) fn finish(
        &self,
        kind: TokenKind,
        text: impl Into<String>,
        value: TokenValue,
    ) -> Token {
        Token::new(
            kind,
            text,
            value,
            SrcSpan::new(self.token_start, self.cursor.pos()),
        )
    }

    /// A lexical error anchored at the current token's start.
    pub(super) fn err(&self, kind: LexErrorKind) -> LexError {
        LexError::new(kind, self.token_start.line, self.token_start.col)
    }

    /// Queue a deferred warning for the driver to surface at a safe point.
    pub(super) fn warn(&mut self, message: String) {
        log::debug!("deferred parse warning: {}", message);
        self.warnings.push(message);
    }
}

/// Identifier start: letters (any script) and `.`.
pub(super) fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '.'
}

/// Identifier continuation: letters, digits, `.` and `_`.
pub(super) fn is_ident_continue(c: char) -> bool {
    c.is_alphanumeric() || c == '.' || c == '_'
}
