//! Identifier and keyword lexing.

use super::core::is_ident_continue;
use crate::error::Result;
use crate::token::{NumValue, Token, TokenKind, TokenValue};
use crate::Lexer;

/// Reserved words and the literal constants that lex as numbers.
const KEYWORDS: &[(&str, TokenKind)] = &[
    ("NULL", TokenKind::NullConst),
    ("NA", TokenKind::NumConst),
    ("TRUE", TokenKind::NumConst),
    ("FALSE", TokenKind::NumConst),
    ("Inf", TokenKind::NumConst),
    ("NaN", TokenKind::NumConst),
    ("NA_integer_", TokenKind::NumConst),
    ("NA_real_", TokenKind::NumConst),
    ("NA_character_", TokenKind::NumConst),
    ("function", TokenKind::Function),
    ("while", TokenKind::While),
    ("repeat", TokenKind::Repeat),
    ("for", TokenKind::For),
    ("if", TokenKind::If),
    ("in", TokenKind::In),
    ("else", TokenKind::Else),
    ("next", TokenKind::Next),
    ("break", TokenKind::Break),
];

fn keyword_value(name: &str) -> TokenValue {
    match name {
        "NA" => TokenValue::Num(NumValue::NaLogical),
        "TRUE" => TokenValue::Num(NumValue::True),
        "FALSE" => TokenValue::Num(NumValue::False),
        "Inf" => TokenValue::Num(NumValue::Inf),
        "NaN" => TokenValue::Num(NumValue::NaN),
        "NA_integer_" => TokenValue::Num(NumValue::NaInt),
        "NA_real_" => TokenValue::Num(NumValue::NaReal),
        "NA_character_" => TokenValue::Num(NumValue::NaChar),
        _ => TokenValue::None,
    }
}

impl<'a> Lexer<'a> {
    pub(super) fn lex_identifier(&mut self, first: char) -> Result<Token> {
        let mut text = String::new();
        text.push(first);
        while let Some(c) = self.cursor.peek()? {
            if is_ident_continue(c) {
                self.cursor.getc()?;
                text.push(c);
            } else {
                break;
            }
        }
        if let Some(&(_, kind)) = KEYWORDS.iter().find(|(kw, _)| *kw == text) {
            let value = keyword_value(&text);
            return Ok(self.finish(kind, text, value));
        }
        let value = TokenValue::Name(text.clone());
        Ok(self.finish(TokenKind::Symbol, text, value))
    }
}
