//! The shift-reduce driver.
//!
//! Tables are built once, on first use, by the in-crate LALR(1)
//! generator; the driver then runs the usual loop: consult the action
//! table for (state, lookahead), shift tokens (materializing their heap
//! values inside the parse's precious multi-set) or reduce productions
//! (running the semantic action and reparenting parse-data rows). States
//! whose only move is a single reduction reduce without lookahead, which
//! is what lets a statement be accepted the moment its terminating
//! newline or semicolon is shifted - interactive inputs are never read
//! past the current statement.

use std::sync::OnceLock;

use rye_gc::{Complex, GcError, Heap, Kind, Value};
use rye_lex::{input::ParseInput, NumValue, SrcSpan, Token, TokenKind, TokenValue};

use crate::error::{ErrorClass, ParseError, ParseSubclass, Result};
use crate::grammar::{self, Grammar, N_TERMINALS};
use crate::lalr::{build_tables, Action, ParseTables};
use crate::state::{ParseOptions, ParseState, ParseStatus, Statement};
use crate::wrap::TokenWrap;

/// A heap failure surfacing through the parser keeps the runtime error
/// class; the REPL treats it like any other error condition.
pub(crate) fn heap_error(e: GcError) -> ParseError {
    ParseError {
        class: ErrorClass::Runtime,
        subclass: "memoryExhausted",
        message: e.to_string(),
        filename: String::new(),
        line: 0,
        col: 0,
    }
}

pub(crate) struct CompiledGrammar {
    pub grammar: Grammar,
    pub tables: ParseTables,
}

/// Grammar and tables, built once per process.
pub(crate) fn compiled() -> &'static CompiledGrammar {
    static COMPILED: OnceLock<CompiledGrammar> = OnceLock::new();
    COMPILED.get_or_init(|| {
        let grammar = grammar::grammar();
        let tables = build_tables(&grammar.def);
        log::debug!(
            "parser tables: {} states over {} productions",
            tables.action.len(),
            grammar.def.productions.len()
        );
        CompiledGrammar { grammar, tables }
    })
}

/// Semantic value carried on the parser stack.
#[derive(Clone, Debug)]
pub(crate) struct SemVal {
    pub value: Value,
    pub span: Option<SrcSpan>,
    /// Parse-data rows owned by this element, awaiting a parent.
    pub records: Vec<usize>,
    /// The terminal row when this expression is a bare symbol or string
    /// (the retag targets: call heads, namespace packages, slots).
    pub term_record: Option<usize>,
    /// An empty `sub` (the bare hole in `f(, x)`).
    pub empty_sub: bool,
}

impl SemVal {
    pub fn nil() -> Self {
        Self {
            value: Value::NIL,
            span: None,
            records: Vec::new(),
            term_record: None,
            empty_sub: false,
        }
    }

    /// Merged span of a reduction's children.
    pub fn merge_spans(children: &[SemVal]) -> Option<SrcSpan> {
        let mut spans = children.iter().filter_map(|c| c.span);
        let first = spans.next()?;
        let last = spans.last().unwrap_or(first);
        Some(SrcSpan::merge(first, last))
    }
}

/// A parser over one input stream.
///
/// Statement-at-a-time: each call to [`Parser::parse_next`] reads one
/// expression (terminated by newline or `;`) and reports its status.
/// Values returned stay rooted in the parser's precious multi-set until
/// the parser is finished or dropped; callers keeping them longer must
/// root them first.
pub struct Parser<'a, 'h> {
    pub(crate) heap: &'h mut Heap,
    pub(crate) wrap: TokenWrap<'a>,
    pub(crate) state: ParseState,
}

impl<'a, 'h> Parser<'a, 'h> {
    pub fn new(heap: &'h mut Heap, input: ParseInput<'a>, options: ParseOptions) -> Result<Self> {
        let mut state = ParseState::new(heap, options).map_err(heap_error)?;
        if state.options.keep_src_refs {
            let filename = state.filename().to_string();
            let srcfile = crate::srcref::srcfile_env(heap, &filename).map_err(heap_error)?;
            state.srcfile = srcfile;
            state.preserve(heap, srcfile).map_err(heap_error)?;
        }
        Ok(Self {
            heap,
            wrap: TokenWrap::new(input),
            state,
        })
    }

    /// Parse the next statement.
    pub fn parse_next(&mut self) -> Result<(ParseStatus, Value)> {
        let stmt = self.parse_prog()?;
        Ok((stmt.status, stmt.value))
    }

    /// Deferred warnings accumulated by the lexer (flushed at the safe
    /// point of the embedder's choosing).
    pub fn take_warnings(&mut self) -> Vec<String> {
        std::mem::take(&mut self.wrap.lexer.warnings)
    }

    /// Release the parse state's roots; the parser is done.
    pub fn finish(&mut self) {
        let warnings = self.take_warnings();
        for w in warnings {
            self.heap.defer_warning(w);
        }
        self.state.finalize(self.heap);
    }

    pub(crate) fn parse_prog(&mut self) -> Result<Statement> {
        let cg = compiled();
        self.wrap.reset_context();
        let mut stack: Vec<(u32, SemVal)> = vec![(0, SemVal::nil())];
        let mut lookahead: Option<(usize, Token, SemVal)> = None;
        let mut accepted: Option<Statement> = None;

        loop {
            // safe point: asynchronous interrupts land between iterations
            if rye_gc::take_interrupt() {
                return Err(ParseError {
                    class: ErrorClass::Runtime,
                    subclass: ParseSubclass::Interrupted.name(),
                    message: "parse interrupted".to_string(),
                    filename: self.state.filename().to_string(),
                    line: 0,
                    col: 0,
                });
            }
            let st = stack.last().map(|s| s.0).unwrap_or(0) as usize;
            let act = match cg.tables.default_reduce[st] {
                Some(p) => Action::Reduce(p),
                None => {
                    if lookahead.is_none() {
                        let tok = self.wrap.next(&mut self.state)?;
                        if tok.kind == TokenKind::Error {
                            return Err(self.unexpected(&tok));
                        }
                        let term = grammar::term_index(tok.kind);
                        let sv = self.token_semval(&tok)?;
                        lookahead = Some((term, tok, sv));
                    }
                    let (term, _, _) = lookahead.as_ref().expect("lookahead present");
                    cg.tables.action[st][*term]
                }
            };
            match act {
                Action::Shift(s) => {
                    let (_, _, sv) = lookahead.take().expect("shift without lookahead");
                    stack.push((s, sv));
                }
                Action::Reduce(p) => {
                    let prod = &cg.grammar.def.productions[p as usize];
                    let n = prod.rhs.len();
                    let children: Vec<SemVal> = stack
                        .split_off(stack.len() - n)
                        .into_iter()
                        .map(|(_, sv)| sv)
                        .collect();
                    let act = cg.grammar.acts[p as usize];
                    let result = self.apply(act, prod.lhs, children, &mut accepted)?;
                    if let Some(stmt) = accepted.take() {
                        return Ok(stmt);
                    }
                    let st = stack.last().map(|s| s.0).unwrap_or(0) as usize;
                    match cg.tables.goto_[st][prod.lhs as usize - N_TERMINALS] {
                        Some(s) => stack.push((s, result)),
                        None => {
                            return Err(ParseError {
                                class: ErrorClass::Parse,
                                subclass: "internalError",
                                message: "parser tables missing a goto entry".to_string(),
                                filename: self.state.filename().to_string(),
                                line: 0,
                                col: 0,
                            })
                        }
                    }
                }
                Action::Err => {
                    let (_, tok, _) = lookahead.as_ref().expect("error without lookahead");
                    if tok.kind == TokenKind::EndOfInput && stack.len() > 1 {
                        return Ok(Statement::empty(ParseStatus::Incomplete));
                    }
                    let err = self.unexpected(tok);
                    return Err(err);
                }
            }
        }
    }

    fn unexpected(&self, tok: &Token) -> ParseError {
        let (subclass, what) = match tok.kind {
            TokenKind::EndOfInput => (ParseSubclass::UnexpectedEndOfInput, "end of input".into()),
            TokenKind::Newline => (ParseSubclass::UnexpectedEndOfLine, "end of line".into()),
            TokenKind::StrConst => (
                ParseSubclass::UnexpectedString,
                format!("string constant {}", tok.text),
            ),
            TokenKind::NumConst => (
                ParseSubclass::UnexpectedNumber,
                format!("numeric constant '{}'", tok.text),
            ),
            TokenKind::Symbol => (
                ParseSubclass::UnexpectedSymbol,
                format!("symbol '{}'", tok.text),
            ),
            TokenKind::EqAssign
            | TokenKind::LeftAssign
            | TokenKind::SuperAssign
            | TokenKind::RightAssign
            | TokenKind::SuperRightAssign => (
                ParseSubclass::UnexpectedAssignment,
                format!("assignment '{}'", tok.text),
            ),
            _ => (
                ParseSubclass::UnexpectedInput,
                format!("'{}'", tok.text),
            ),
        };
        ParseError::new(
            subclass,
            format!("unexpected {}", what),
            self.state.filename(),
            tok.span.first,
        )
    }

    /// Heap value and parse-data row for a delivered token.
    fn token_semval(&mut self, tok: &Token) -> Result<SemVal> {
        let value = self.token_value(tok)?;
        if !value.is_nil() {
            self.state.preserve(self.heap, value).map_err(heap_error)?;
        }
        let rec = match tok.kind {
            TokenKind::Newline | TokenKind::EndOfInput => None,
            k => self.state.record_token(k, tok.span, &tok.text),
        };
        let term_record = match tok.kind {
            TokenKind::Symbol | TokenKind::StrConst => rec,
            _ => None,
        };
        Ok(SemVal {
            value,
            span: Some(tok.span),
            records: rec.into_iter().collect(),
            term_record,
            empty_sub: false,
        })
    }

    fn token_value(&mut self, tok: &Token) -> Result<Value> {
        let heap = &mut *self.heap;
        let globals = *heap.globals();
        let value = match (tok.kind, &tok.value) {
            (TokenKind::NumConst, TokenValue::Num(nv)) => match *nv {
                NumValue::Int(i) => heap.scalar_int(i),
                NumValue::Real(r) => heap.scalar_real(r),
                NumValue::Imaginary(im) => heap.scalar_cplx(Complex { re: 0.0, im }),
                NumValue::True => heap.scalar_logical(1),
                NumValue::False => heap.scalar_logical(0),
                NumValue::NaLogical => heap.scalar_logical(rye_gc::NA_LOGICAL),
                NumValue::NaInt => heap.scalar_int(rye_gc::NA_INTEGER),
                NumValue::NaReal => heap.scalar_real(rye_gc::na_real()),
                NumValue::Inf => heap.scalar_real(f64::INFINITY),
                NumValue::NaN => heap.scalar_real(f64::NAN),
                NumValue::NaChar => {
                    let v = heap.alloc_vector(Kind::Str, 1).map_err(heap_error)?;
                    heap.set_str_elt(v, 0, globals.na_string);
                    Ok(v)
                }
            },
            (TokenKind::StrConst, TokenValue::Str(s)) => heap.mk_string(s),
            (TokenKind::NullConst, _) => Ok(Value::NIL),
            (TokenKind::Placeholder, _) => Ok(globals.placeholder),
            (TokenKind::Symbol, _) => heap.install(tok.name()),
            (TokenKind::Function | TokenKind::Lambda, _) => heap.install("function"),
            (TokenKind::If, _) => heap.install("if"),
            (TokenKind::For, _) => heap.install("for"),
            (TokenKind::While, _) => heap.install("while"),
            (TokenKind::Repeat, _) => heap.install("repeat"),
            (TokenKind::Next, _) => heap.install("next"),
            (TokenKind::Break, _) => heap.install("break"),
            (_, TokenValue::Name(n)) => heap.install(n),
            _ => Ok(Value::NIL),
        };
        value.map_err(heap_error)
    }
}

impl<'a, 'h> Drop for Parser<'a, 'h> {
    fn drop(&mut self) {
        if !self.state.is_finalized() {
            self.state.finalize(self.heap);
        }
    }
}
