//! Numeric literal lexing.
//!
//! Accepts decimal integers and floats, scientific notation, hex with an
//! `0x` prefix, hex floats with a `p` exponent, a trailing `L` for
//! integer literals and a trailing `i` for imaginary literals. The policy
//! is longest match; malformed literals come back as `Error` tokens.

use crate::error::Result;
use crate::token::{NumValue, Token, TokenKind, TokenValue};
use crate::Lexer;

impl<'a> Lexer<'a> {
    pub(super) fn lex_number(&mut self, first: char) -> Result<Token> {
        let mut text = String::new();
        text.push(first);

        if first == '0' {
            if let Some(x) = self.cursor.peek()? {
                if x == 'x' || x == 'X' {
                    self.cursor.getc()?;
                    text.push(x);
                    return self.lex_hex(text);
                }
            }
        }

        let mut seen_dot = first == '.';
        let mut seen_exp = false;
        loop {
            match self.cursor.peek()? {
                Some(c) if c.is_ascii_digit() => {
                    self.cursor.getc()?;
                    text.push(c);
                }
                Some('.') if !seen_dot && !seen_exp => {
                    self.cursor.getc()?;
                    text.push('.');
                    seen_dot = true;
                }
                Some(e) if (e == 'e' || e == 'E') && !seen_exp => {
                    self.cursor.getc()?;
                    text.push(e);
                    seen_exp = true;
                    if let Some(sign) = self.cursor.peek()? {
                        if sign == '+' || sign == '-' {
                            self.cursor.getc()?;
                            text.push(sign);
                        }
                    }
                    match self.cursor.peek()? {
                        Some(d) if d.is_ascii_digit() => {}
                        _ => return Ok(self.finish(TokenKind::Error, text, TokenValue::None)),
                    }
                }
                _ => break,
            }
        }

        let value: f64 = match text.parse() {
            Ok(v) => v,
            Err(_) => return Ok(self.finish(TokenKind::Error, text, TokenValue::None)),
        };
        self.finish_number(text, value, seen_dot)
    }

    fn lex_hex(&mut self, mut text: String) -> Result<Token> {
        let mut digits = String::new();
        let mut frac = String::new();
        let mut seen_dot = false;
        let mut exponent: Option<i32> = None;

        loop {
            match self.cursor.peek()? {
                Some(c) if c.is_ascii_hexdigit() => {
                    self.cursor.getc()?;
                    text.push(c);
                    if seen_dot {
                        frac.push(c);
                    } else {
                        digits.push(c);
                    }
                }
                Some('.') if !seen_dot => {
                    self.cursor.getc()?;
                    text.push('.');
                    seen_dot = true;
                }
                Some(p) if p == 'p' || p == 'P' => {
                    self.cursor.getc()?;
                    text.push(p);
                    let mut exp_text = String::new();
                    if let Some(sign) = self.cursor.peek()? {
                        if sign == '+' || sign == '-' {
                            self.cursor.getc()?;
                            text.push(sign);
                            if sign == '-' {
                                exp_text.push('-');
                            }
                        }
                    }
                    let mut any = false;
                    while let Some(d) = self.cursor.peek()? {
                        if d.is_ascii_digit() {
                            self.cursor.getc()?;
                            text.push(d);
                            exp_text.push(d);
                            any = true;
                        } else {
                            break;
                        }
                    }
                    if !any {
                        return Ok(self.finish(TokenKind::Error, text, TokenValue::None));
                    }
                    exponent = exp_text.parse().ok();
                    if exponent.is_none() {
                        return Ok(self.finish(TokenKind::Error, text, TokenValue::None));
                    }
                    break;
                }
                _ => break,
            }
        }

        if digits.is_empty() && frac.is_empty() {
            return Ok(self.finish(TokenKind::Error, text, TokenValue::None));
        }
        // a hex fraction is only meaningful with a binary exponent
        if seen_dot && exponent.is_none() {
            return Ok(self.finish(TokenKind::Error, text, TokenValue::None));
        }

        let mut value = 0.0f64;
        for d in digits.chars() {
            value = value * 16.0 + d.to_digit(16).unwrap_or(0) as f64;
        }
        let mut scale = 1.0 / 16.0;
        for d in frac.chars() {
            value += d.to_digit(16).unwrap_or(0) as f64 * scale;
            scale /= 16.0;
        }
        if let Some(exp) = exponent {
            value *= (exp as f64).exp2();
        }
        self.finish_number(text, value, seen_dot)
    }

    /// Apply the `L`/`i` suffixes and build the token.
    fn finish_number(&mut self, mut text: String, value: f64, seen_dot: bool) -> Result<Token> {
        match self.cursor.peek()? {
            Some('L') => {
                self.cursor.getc()?;
                text.push('L');
                if seen_dot {
                    self.warn(format!(
                        "integer literal {} contains decimal; using numeric value",
                        text
                    ));
                    return Ok(self.finish(
                        TokenKind::NumConst,
                        text,
                        TokenValue::Num(NumValue::Real(value)),
                    ));
                }
                if value.fract() != 0.0 || value.abs() > i32::MAX as f64 {
                    self.warn(format!(
                        "non-integer value {} qualified with L; using numeric value",
                        text
                    ));
                    return Ok(self.finish(
                        TokenKind::NumConst,
                        text,
                        TokenValue::Num(NumValue::Real(value)),
                    ));
                }
                Ok(self.finish(
                    TokenKind::NumConst,
                    text,
                    TokenValue::Num(NumValue::Int(value as i32)),
                ))
            }
            Some('i') => {
                self.cursor.getc()?;
                text.push('i');
                Ok(self.finish(
                    TokenKind::NumConst,
                    text,
                    TokenValue::Num(NumValue::Imaginary(value)),
                ))
            }
            _ => Ok(self.finish(
                TokenKind::NumConst,
                text,
                TokenValue::Num(NumValue::Real(value)),
            )),
        }
    }
}
