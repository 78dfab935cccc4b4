//! The token-wrapping layer: context-sensitive newlines.
//!
//! The lexer emits every newline; this layer decides whether one
//! continues or terminates the expression. It keeps a small context
//! stack over `(`, `[`, `{` and a synthetic `i` sentinel for "inside an
//! if body, an else may follow", plus an eat-lines flag set after any
//! token that cannot end an expression (operators, control keywords, a
//! left brace). Newlines are swallowed inside `(`/`[`, while eat-lines
//! is on, and between an if body and its `else`; a delivered `else` pops
//! the sentinel of the if body it terminates.
//!
//! Comments and `#line` directives never reach the parser; they are
//! recorded into the parse data here.

use std::sync::OnceLock;

use rye_lex::{input::ParseInput, Lexer, Token, TokenKind};

use crate::error::{ParseError, ParseSubclass, Result};
use crate::state::ParseState;

/// Depth of the newline context stack.
pub const CONTEXT_STACK_SIZE: usize = 256;

/// Is the pipe-bind operator enabled? Read once from `_R_USE_PIPEBIND_`.
pub(crate) fn pipebind_enabled() -> bool {
    static ENABLED: OnceLock<bool> = OnceLock::new();
    *ENABLED.get_or_init(|| match std::env::var("_R_USE_PIPEBIND_") {
        Ok(v) => {
            let v = v.trim();
            !v.is_empty() && v != "0" && !v.eq_ignore_ascii_case("false")
        }
        Err(_) => false,
    })
}

pub(crate) struct TokenWrap<'a> {
    pub lexer: Lexer<'a>,
    context: Vec<u8>,
    pub eat_lines: bool,
    saved: Option<Token>,
    pipebind: bool,
}

impl<'a> TokenWrap<'a> {
    pub fn new(input: ParseInput<'a>) -> Self {
        Self {
            lexer: Lexer::new(input),
            context: Vec::with_capacity(16),
            eat_lines: false,
            saved: None,
            pipebind: pipebind_enabled(),
        }
    }

    /// Reset the newline context at a statement boundary. Any saved
    /// lookahead token survives: it belongs to the next statement.
    pub fn reset_context(&mut self) {
        self.context.clear();
        self.eat_lines = false;
    }

    /// Next significant token for the parser.
    pub fn next(&mut self, state: &mut ParseState) -> Result<Token> {
        if let Some(t) = self.saved.take() {
            return self.deliver(t, state);
        }
        loop {
            let t = self.raw_next(state)?;
            if t.kind != TokenKind::Newline {
                return self.deliver(t, state);
            }
            if self.eat_lines || matches!(self.context.last(), Some(&b'(') | Some(&b'[')) {
                continue;
            }
            if self.context.last() == Some(&b'i') {
                // skip newlines looking for an else
                let t2 = loop {
                    let x = self.raw_next(state)?;
                    if x.kind != TokenKind::Newline {
                        break x;
                    }
                };
                match t2.kind {
                    TokenKind::Else => {
                        return self.deliver(t2, state);
                    }
                    TokenKind::RBrace
                    | TokenKind::RParen
                    | TokenKind::RBracket
                    | TokenKind::Comma => {
                        // every pending if body has been terminated
                        while self.context.last() == Some(&b'i') {
                            self.context.pop();
                        }
                        return self.deliver(t2, state);
                    }
                    _ => {
                        self.saved = Some(t2);
                        return Ok(t);
                    }
                }
            }
            return Ok(t);
        }
    }

    /// Raw tokens from the lexer: comments and line directives are
    /// recorded in the parse data and skipped.
    fn raw_next(&mut self, state: &mut ParseState) -> Result<Token> {
        loop {
            let t = self
                .lexer
                .next_token()
                .map_err(|e| ParseError::from_lex(e, state.filename()))?;
            if t.kind.is_diagnostic_only() {
                state.record_token(t.kind, t.span, &t.text);
                continue;
            }
            return Ok(t);
        }
    }

    /// Track contexts and eat-lines, then hand the token to the parser.
    fn deliver(&mut self, t: Token, state: &mut ParseState) -> Result<Token> {
        if t.kind == TokenKind::PipeBind && !self.pipebind {
            return Err(ParseError::new(
                ParseSubclass::PipebindDisabled,
                "the pipe bind operator is disabled in this session",
                state.filename(),
                t.span.first,
            ));
        }
        match t.kind {
            TokenKind::If => self.push_context(b'i', &t, state)?,
            TokenKind::Else => {
                // the else terminates the innermost pending if body
                if self.context.last() == Some(&b'i') {
                    self.context.pop();
                }
            }
            TokenKind::LParen => self.push_context(b'(', &t, state)?,
            TokenKind::LBracket => self.push_context(b'[', &t, state)?,
            TokenKind::Lbb => {
                // `[[` closes with two `]` tokens
                self.push_context(b'[', &t, state)?;
                self.push_context(b'[', &t, state)?;
            }
            TokenKind::LBrace => self.push_context(b'{', &t, state)?,
            TokenKind::RParen | TokenKind::RBracket | TokenKind::RBrace => {
                while self.context.last() == Some(&b'i') {
                    self.context.pop();
                }
                self.context.pop();
            }
            TokenKind::Comma => {
                // a comma can only end an if body inside a call or index
                while self.context.last() == Some(&b'i') {
                    self.context.pop();
                }
            }
            _ => {}
        }
        self.eat_lines = sets_eat_lines(t.kind);
        Ok(t)
    }

    fn push_context(&mut self, c: u8, t: &Token, state: &ParseState) -> Result<()> {
        if self.context.len() >= CONTEXT_STACK_SIZE {
            return Err(ParseError::new(
                ParseSubclass::ContextStackOverflow,
                "contextstack overflow",
                state.filename(),
                t.span.first,
            ));
        }
        self.context.push(c);
        Ok(())
    }
}


/// Tokens after which a newline cannot terminate the expression.
fn sets_eat_lines(kind: TokenKind) -> bool {
    use TokenKind::*;
    matches!(
        kind,
        Plus | Minus
            | Star
            | Div
            | Caret
            | Lt
            | Le
            | Gt
            | Ge
            | Eq2
            | Ne
            | And
            | And2
            | Or
            | Or2
            | Not
            | LeftAssign
            | SuperAssign
            | RightAssign
            | SuperRightAssign
            | EqAssign
            | Tilde
            | Question
            | Colon
            | Dollar
            | At
            | NsGet
            | NsGetInt
            | Special
            | Pipe
            | PipeBind
            | Comma
            | If
            | Else
            | While
            | For
            | Repeat
            | Function
            | Lambda
            | In
            | LBrace
    )
}
