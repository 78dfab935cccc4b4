//! Operator and punctuation lexing.

use crate::error::{LexErrorKind, Result};
use crate::token::{Token, TokenKind, TokenValue};
use crate::Lexer;

impl<'a> Lexer<'a> {
    pub(super) fn lex_operator(&mut self, c: char) -> Result<Token> {
        let name = |s: &str| TokenValue::Name(s.to_string());
        match c {
            '+' => Ok(self.finish(TokenKind::Plus, "+", name("+"))),
            '-' => {
                if self.cursor.eat('>')? {
                    if self.cursor.eat('>')? {
                        Ok(self.finish(TokenKind::SuperRightAssign, "->>", name("<<-")))
                    } else {
                        Ok(self.finish(TokenKind::RightAssign, "->", name("<-")))
                    }
                } else {
                    Ok(self.finish(TokenKind::Minus, "-", name("-")))
                }
            }
            '*' => {
                // the original grammar folds ** into ^
                if self.cursor.eat('*')? {
                    Ok(self.finish(TokenKind::Caret, "**", name("^")))
                } else {
                    Ok(self.finish(TokenKind::Star, "*", name("*")))
                }
            }
            '/' => Ok(self.finish(TokenKind::Div, "/", name("/"))),
            '^' => Ok(self.finish(TokenKind::Caret, "^", name("^"))),
            '<' => {
                if self.cursor.eat('=')? {
                    Ok(self.finish(TokenKind::Le, "<=", name("<=")))
                } else if self.cursor.eat('-')? {
                    Ok(self.finish(TokenKind::LeftAssign, "<-", name("<-")))
                } else if self.cursor.eat('<')? {
                    if self.cursor.eat('-')? {
                        Ok(self.finish(TokenKind::SuperAssign, "<<-", name("<<-")))
                    } else {
                        Ok(self.finish(TokenKind::Error, "<<", TokenValue::None))
                    }
                } else {
                    Ok(self.finish(TokenKind::Lt, "<", name("<")))
                }
            }
            '>' => {
                if self.cursor.eat('=')? {
                    Ok(self.finish(TokenKind::Ge, ">=", name(">=")))
                } else {
                    Ok(self.finish(TokenKind::Gt, ">", name(">")))
                }
            }
            '=' => {
                if self.cursor.eat('=')? {
                    Ok(self.finish(TokenKind::Eq2, "==", name("==")))
                } else if self.cursor.eat('>')? {
                    Ok(self.finish(TokenKind::PipeBind, "=>", name("=>")))
                } else {
                    Ok(self.finish(TokenKind::EqAssign, "=", name("=")))
                }
            }
            '!' => {
                if self.cursor.eat('=')? {
                    Ok(self.finish(TokenKind::Ne, "!=", name("!=")))
                } else {
                    Ok(self.finish(TokenKind::Not, "!", name("!")))
                }
            }
            '&' => {
                if self.cursor.eat('&')? {
                    Ok(self.finish(TokenKind::And2, "&&", name("&&")))
                } else {
                    Ok(self.finish(TokenKind::And, "&", name("&")))
                }
            }
            '|' => {
                if self.cursor.eat('|')? {
                    Ok(self.finish(TokenKind::Or2, "||", name("||")))
                } else if self.cursor.eat('>')? {
                    Ok(self.finish(TokenKind::Pipe, "|>", name("|>")))
                } else {
                    Ok(self.finish(TokenKind::Or, "|", name("|")))
                }
            }
            ':' => {
                if self.cursor.eat(':')? {
                    if self.cursor.eat(':')? {
                        Ok(self.finish(TokenKind::NsGetInt, ":::", name(":::")))
                    } else {
                        Ok(self.finish(TokenKind::NsGet, "::", name("::")))
                    }
                } else if self.cursor.eat('=')? {
                    // := parses like <- but keeps its own operator symbol
                    Ok(self.finish(TokenKind::LeftAssign, ":=", name(":=")))
                } else {
                    Ok(self.finish(TokenKind::Colon, ":", name(":")))
                }
            }
            '%' => self.lex_special(),
            '~' => Ok(self.finish(TokenKind::Tilde, "~", name("~"))),
            '?' => Ok(self.finish(TokenKind::Question, "?", name("?"))),
            '$' => Ok(self.finish(TokenKind::Dollar, "$", name("$"))),
            '@' => Ok(self.finish(TokenKind::At, "@", name("@"))),
            '(' => Ok(self.finish(TokenKind::LParen, "(", name("("))),
            ')' => Ok(self.finish(TokenKind::RParen, ")", TokenValue::None)),
            '{' => Ok(self.finish(TokenKind::LBrace, "{", name("{"))),
            '}' => Ok(self.finish(TokenKind::RBrace, "}", TokenValue::None)),
            '[' => {
                if self.cursor.eat('[')? {
                    Ok(self.finish(TokenKind::Lbb, "[[", name("[[")))
                } else {
                    Ok(self.finish(TokenKind::LBracket, "[", name("[")))
                }
            }
            ']' => Ok(self.finish(TokenKind::RBracket, "]", TokenValue::None)),
            ';' => Ok(self.finish(TokenKind::Semicolon, ";", TokenValue::None)),
            ',' => Ok(self.finish(TokenKind::Comma, ",", TokenValue::None)),
            '\\' => Ok(self.finish(TokenKind::Lambda, "\\", name("function"))),
            other => {
                let mut text = String::new();
                text.push(other);
                Ok(self.finish(TokenKind::Error, text, TokenValue::None))
            }
        }
    }

    /// `%...%` user operators (including `%%` itself).
    fn lex_special(&mut self) -> Result<Token> {
        let mut text = String::from("%");
        loop {
            match self.cursor.getc()? {
                None => {
                    return Err(self.err(LexErrorKind::UnexpectedEof {
                        context: "a special operator",
                    }))
                }
                Some('\n') => {
                    // a special cannot span lines; report the mangled text
                    self.cursor.ungetc('\n');
                    return Ok(self.finish(TokenKind::Error, text, TokenValue::None));
                }
                Some('%') => {
                    text.push('%');
                    let value = TokenValue::Name(text.clone());
                    return Ok(self.finish(TokenKind::Special, text, value));
                }
                Some(c) => text.push(c),
            }
        }
    }
}
