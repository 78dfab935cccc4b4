//! String literal lexing: quoted strings, raw strings, backtick names.

use crate::error::{LexErrorKind, Result};
use crate::token::{Token, TokenKind, TokenValue};
use crate::Lexer;

/// Directional formatting characters rejected in literals: the range
/// U+202A..=U+2069 excluding U+202F..=U+2066.
fn is_forbidden_bidi(c: char) -> bool {
    matches!(c, '\u{202A}'..='\u{202E}' | '\u{2067}'..='\u{2069}')
}

/// Which escape families a literal has used; mixing them is an error.
#[derive(Default)]
struct EscapeUse {
    unicode: bool,
    byte: bool,
}

impl<'a> Lexer<'a> {
    /// Classic quoted string (`"` or `'`).
    ///
    /// A newline inside the literal continues the string. End of input
    /// inside the literal is reported as incomplete so interactive
    /// drivers can re-prompt.
    pub(super) fn lex_string(&mut self, quote: char) -> Result<Token> {
        let mut text = String::new();
        text.push(quote);
        let mut cooked = String::new();
        let mut escapes = EscapeUse::default();
        loop {
            let c = match self.cursor.getc()? {
                Some(c) => c,
                None => {
                    return Err(self.err(LexErrorKind::UnexpectedEof {
                        context: "a character string",
                    }))
                }
            };
            if c == quote {
                text.push(quote);
                break;
            }
            match c {
                '\\' => {
                    let cooked_char = self.lex_escape(&mut text, &mut escapes, false)?;
                    if let Some(ch) = cooked_char {
                        self.push_checked(&mut cooked, ch)?;
                    }
                }
                _ => {
                    text.push(c);
                    self.push_checked(&mut cooked, c)?;
                }
            }
        }
        if escapes.unicode && escapes.byte {
            return Err(self.err(LexErrorKind::MixedEscapes));
        }
        Ok(self.finish(TokenKind::StrConst, text, TokenValue::Str(cooked)))
    }

    fn push_checked(&self, out: &mut String, c: char) -> Result<()> {
        if c == '\0' {
            return Err(self.err(LexErrorKind::NulNotAllowed));
        }
        if is_forbidden_bidi(c) {
            return Err(self.err(LexErrorKind::BidiNotAllowed {
                codepoint: c as u32,
            }));
        }
        out.push(c);
        Ok(())
    }

    /// One escape sequence after the backslash was consumed. Returns the
    /// cooked character (None only for escapes that produce nothing).
    fn lex_escape(
        &mut self,
        text: &mut String,
        escapes: &mut EscapeUse,
        in_backticks: bool,
    ) -> Result<Option<char>> {
        text.push('\\');
        let c = match self.cursor.getc()? {
            Some(c) => c,
            None => {
                return Err(self.err(LexErrorKind::UnexpectedEof {
                    context: "an escape sequence",
                }))
            }
        };
        text.push(c);
        let cooked = match c {
            'a' => '\u{7}',
            'b' => '\u{8}',
            'f' => '\u{c}',
            'n' => '\n',
            'r' => '\r',
            't' => '\t',
            'v' => '\u{b}',
            '\\' => '\\',
            '"' => '"',
            '\'' => '\'',
            '`' => '`',
            ' ' => ' ',
            '\n' => '\n',
            '0'..='7' => {
                escapes.byte = true;
                let mut value = c.to_digit(8).unwrap_or(0);
                for _ in 0..2 {
                    match self.cursor.peek()? {
                        Some(d @ '0'..='7') => {
                            self.cursor.getc()?;
                            text.push(d);
                            value = value * 8 + d.to_digit(8).unwrap_or(0);
                        }
                        _ => break,
                    }
                }
                if value > 0xFF {
                    return Err(self.err(LexErrorKind::InvalidOctal));
                }
                char::from_u32(value).unwrap_or('\0')
            }
            'x' => {
                escapes.byte = true;
                let mut value = 0u32;
                let mut digits = 0;
                while digits < 2 {
                    match self.cursor.peek()? {
                        Some(d) if d.is_ascii_hexdigit() => {
                            self.cursor.getc()?;
                            text.push(d);
                            value = value * 16 + d.to_digit(16).unwrap_or(0);
                            digits += 1;
                        }
                        _ => break,
                    }
                }
                if digits == 0 {
                    return Err(self.err(LexErrorKind::BadHex));
                }
                char::from_u32(value).unwrap_or('\0')
            }
            'u' | 'U' => {
                if in_backticks {
                    return Err(self.err(LexErrorKind::UnicodeInBackticks));
                }
                escapes.unicode = true;
                let max_digits = if c == 'u' { 4 } else { 8 };
                self.lex_unicode_escape(text, c, max_digits)?
            }
            other => {
                return Err(self.err(LexErrorKind::UnrecognizedEscape { escape: other }));
            }
        };
        Ok(Some(cooked))
    }

    fn lex_unicode_escape(
        &mut self,
        text: &mut String,
        escape: char,
        max_digits: usize,
    ) -> Result<char> {
        let braced = matches!(self.cursor.peek()?, Some('{'));
        if braced {
            self.cursor.getc()?;
            text.push('{');
        }
        let mut value: u32 = 0;
        let mut digits = 0;
        loop {
            match self.cursor.peek()? {
                Some(d) if d.is_ascii_hexdigit() => {
                    self.cursor.getc()?;
                    text.push(d);
                    digits += 1;
                    if digits > max_digits {
                        return Err(self.err(LexErrorKind::UnicodeTooLong { escape }));
                    }
                    value = value * 16 + d.to_digit(16).unwrap_or(0);
                }
                _ => break,
            }
            if !braced && digits == max_digits {
                break;
            }
        }
        if digits == 0 {
            return Err(self.err(LexErrorKind::BadUnicodeHex { escape }));
        }
        if braced {
            match self.cursor.getc()? {
                Some('}') => text.push('}'),
                _ => return Err(self.err(LexErrorKind::BadUnicodeHex { escape })),
            }
        }
        match char::from_u32(value) {
            Some(c) if value <= 0x10FFFF => Ok(c),
            _ => Err(self.err(LexErrorKind::InvalidUnicode { escape, value })),
        }
    }

    /// Raw string literal: `r"(...)"` with optional dashes, any of the
    /// `(`, `[`, `{` delimiter pairs or the self-matching `|`.
    pub(super) fn lex_raw_string(&mut self, marker: char) -> Result<Token> {
        let mut text = String::new();
        text.push(marker);
        let quote = match self.cursor.getc()? {
            Some(q @ ('"' | '\'')) => q,
            _ => return Err(self.err(LexErrorKind::InvalidRawLiteral)),
        };
        text.push(quote);
        let mut dashes = 0usize;
        loop {
            match self.cursor.getc()? {
                Some('-') => {
                    text.push('-');
                    dashes += 1;
                }
                Some(open @ ('(' | '[' | '{' | '|')) => {
                    text.push(open);
                    let close = match open {
                        '(' => ')',
                        '[' => ']',
                        '|' => '|',
                        _ => '}',
                    };
                    return self.lex_raw_body(text, quote, dashes, close);
                }
                Some(_) | None => return Err(self.err(LexErrorKind::InvalidRawLiteral)),
            }
        }
    }

    fn lex_raw_body(
        &mut self,
        mut text: String,
        quote: char,
        dashes: usize,
        close: char,
    ) -> Result<Token> {
        let eof = |lexer: &Self| {
            lexer.err(LexErrorKind::UnexpectedEof {
                context: "a raw character string",
            })
        };
        let mut cooked = String::new();
        loop {
            let c = match self.cursor.getc()? {
                Some(c) => c,
                None => return Err(eof(self)),
            };
            if c != close {
                text.push(c);
                self.push_checked(&mut cooked, c)?;
                continue;
            }
            // candidate terminator: close delimiter, dashes, quote
            let mut got_dashes = 0;
            let mut mismatch: Option<char> = None;
            while got_dashes < dashes {
                match self.cursor.getc()? {
                    Some('-') => got_dashes += 1,
                    Some(other) => {
                        mismatch = Some(other);
                        break;
                    }
                    None => return Err(eof(self)),
                }
            }
            if mismatch.is_none() {
                match self.cursor.getc()? {
                    Some(q) if q == quote => {
                        text.push(c);
                        for _ in 0..dashes {
                            text.push('-');
                        }
                        text.push(q);
                        return Ok(self.finish(TokenKind::StrConst, text, TokenValue::Str(cooked)));
                    }
                    Some(other) => mismatch = Some(other),
                    None => return Err(eof(self)),
                }
            }
            // not the terminator after all; what we consumed is content,
            // and the mismatching character gets re-examined
            text.push(c);
            self.push_checked(&mut cooked, c)?;
            for _ in 0..got_dashes {
                text.push('-');
                self.push_checked(&mut cooked, '-')?;
            }
            if let Some(other) = mismatch {
                self.cursor.ungetc(other);
            }
        }
    }

    /// Backtick-quoted name; yields a `Symbol` token. Unicode escapes are
    /// forbidden here.
    pub(super) fn lex_backtick(&mut self) -> Result<Token> {
        let mut text = String::from("`");
        let mut cooked = String::new();
        let mut escapes = EscapeUse::default();
        loop {
            let c = match self.cursor.getc()? {
                Some(c) => c,
                None => {
                    return Err(self.err(LexErrorKind::UnexpectedEof {
                        context: "a backtick-quoted name",
                    }))
                }
            };
            match c {
                '`' => {
                    text.push('`');
                    break;
                }
                '\\' => {
                    if let Some(ch) = self.lex_escape(&mut text, &mut escapes, true)? {
                        self.push_checked(&mut cooked, ch)?;
                    }
                }
                _ => {
                    text.push(c);
                    self.push_checked(&mut cooked, c)?;
                }
            }
        }
        let value = TokenValue::Name(cooked);
        Ok(self.finish(TokenKind::Symbol, text, value))
    }
}
