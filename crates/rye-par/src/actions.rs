//! Semantic actions: building the expression graph.
//!
//! Reductions construct call (language) cells on the heap. Every freshly
//! built value is preserved in the parse's precious multi-set before the
//! values it subsumes are released, so an allocation-triggered collection
//! can never reclaim a partially attached subtree.

use rye_gc::{Kind, Value};
use rye_lex::TokenKind;

use crate::error::{ParseError, ParseSubclass, Result};
use crate::grammar::{Act, TagKind, NT_EOAH, NT_EOH, NT_EXPR, NT_PROG};
use crate::lalr::Sym;
use crate::parser::{heap_error, Parser, SemVal};
use crate::state::{ParseStatus, Statement};

impl<'a, 'h> Parser<'a, 'h> {
    /// Build a pairlist from rooted parts.
    pub(crate) fn pairlist(&mut self, parts: &[Value]) -> Result<Value> {
        let mut tail = Value::NIL;
        for &v in parts.iter().rev() {
            tail = self
                .heap
                .protected(&[tail], |h| h.alloc_cons(v, tail))
                .map_err(heap_error)?;
        }
        Ok(tail)
    }

    /// Build a call `(head, args...)` from rooted parts.
    pub(crate) fn lang(&mut self, head: Value, args: &[Value]) -> Result<Value> {
        let tail = self.pairlist(args)?;
        self.heap
            .protected(&[tail], |h| h.alloc_lang(head, tail))
            .map_err(heap_error)
    }

    /// Preserve a freshly built value, then release the children it now
    /// holds.
    fn keep(&mut self, result: Value, children: &[SemVal]) -> Result<()> {
        self.state
            .preserve(self.heap, result)
            .map_err(heap_error)?;
        for c in children {
            self.state.release(self.heap, c.value);
        }
        Ok(())
    }

    fn err_at(&self, subclass: ParseSubclass, message: impl Into<String>, sv: &SemVal) -> ParseError {
        let pos = sv.span.map(|s| s.first).unwrap_or_default();
        ParseError::new(subclass, message, self.state.filename(), pos)
    }

    /// Run the semantic action for one reduction.
    pub(crate) fn apply(
        &mut self,
        act: Act,
        lhs: Sym,
        children: Vec<SemVal>,
        accepted: &mut Option<Statement>,
    ) -> Result<SemVal> {
        let span = SemVal::merge_spans(&children);

        // the empty-marker reduction only flips the newline mode
        if act == Act::Cr {
            self.wrap.eat_lines = true;
            return Ok(SemVal::nil());
        }

        // prog reductions finish the statement
        if lhs == NT_PROG {
            let stmt = self.finish_statement(act, &children)?;
            *accepted = Some(stmt);
            return Ok(SemVal::nil());
        }

        let mut term_record = None;
        let mut empty_sub = false;
        let value = match act {
            Act::Start | Act::ProgEof | Act::ProgNull | Act::ProgExpr | Act::Cr => {
                unreachable!("handled above")
            }
            Act::First => {
                term_record = children[0].term_record;
                children[0].value
            }
            Act::Binary | Act::PipeBind => {
                let (l, op, r) = (children[0].value, children[1].value, children[2].value);
                let v = self.lang(op, &[l, r])?;
                self.keep(v, &children)?;
                v
            }
            Act::RightAssign => {
                // `value -> target` becomes the ordinary assignment
                let (value, op, target) = (children[0].value, children[1].value, children[2].value);
                let v = self.lang(op, &[target, value])?;
                self.keep(v, &children)?;
                v
            }
            Act::Unary => {
                let (op, arg) = (children[0].value, children[1].value);
                let v = self.lang(op, &[arg])?;
                self.keep(v, &children)?;
                v
            }
            Act::Paren => {
                let (op, inner) = (children[0].value, children[1].value);
                let v = self.lang(op, &[inner])?;
                self.keep(v, &children)?;
                v
            }
            Act::Block => {
                let (brace, body) = (children[0].value, children[1].value);
                let v = self
                    .heap
                    .alloc_lang(brace, body)
                    .map_err(heap_error)?;
                self.keep(v, &children)?;
                v
            }
            Act::FunCall => {
                let fun = children[0].value;
                let sublist = &children[2];
                let args = if sublist.empty_sub {
                    Value::NIL
                } else {
                    sublist.value
                };
                if self.heap.kind(fun) == Kind::Symbol {
                    self.state
                        .retag(children[0].term_record, TokenKind::SymbolFunctionCall);
                }
                let v = self
                    .heap
                    .alloc_lang(fun, args)
                    .map_err(heap_error)?;
                self.keep(v, &children)?;
                v
            }
            Act::Function => {
                let head = children[0].value;
                let formals = children[2].value;
                let body = children[5].value;
                let srcref = if self.state.options.keep_src_refs {
                    let span = span.expect("function reduction has a span");
                    let r = crate::srcref::build_srcref(self.heap, span).map_err(heap_error)?;
                    self.state.preserve(self.heap, r).map_err(heap_error)?;
                    r
                } else {
                    Value::NIL
                };
                let v = self.lang(head, &[formals, body, srcref])?;
                if !srcref.is_nil() {
                    self.state.release(self.heap, srcref);
                }
                self.keep(v, &children)?;
                v
            }
            Act::If => {
                let v = self.lang(children[0].value, &[children[1].value, children[2].value])?;
                self.keep(v, &children)?;
                v
            }
            Act::IfElse => {
                let v = self.lang(
                    children[0].value,
                    &[children[1].value, children[2].value, children[4].value],
                )?;
                self.keep(v, &children)?;
                v
            }
            Act::For => {
                // forcond is a (variable . sequence) cell
                let var = self.heap.car(children[1].value);
                let seq = self.heap.cdr(children[1].value);
                let v = self.lang(children[0].value, &[var, seq, children[2].value])?;
                self.keep(v, &children)?;
                v
            }
            Act::While => {
                let v = self.lang(children[0].value, &[children[1].value, children[2].value])?;
                self.keep(v, &children)?;
                v
            }
            Act::Repeat => {
                let v = self.lang(children[0].value, &[children[1].value])?;
                self.keep(v, &children)?;
                v
            }
            Act::Subscript { double } => {
                let op = self
                    .heap
                    .install(if double { "[[" } else { "[" })
                    .map_err(heap_error)?;
                let obj = children[0].value;
                let sublist = &children[2];
                let args = if sublist.empty_sub {
                    Value::NIL
                } else {
                    sublist.value
                };
                let head = self
                    .heap
                    .protected(&[args], |h| h.alloc_cons(obj, args))
                    .map_err(heap_error)?;
                let v = self
                    .heap
                    .protected(&[head], |h| h.alloc_lang(op, head))
                    .map_err(heap_error)?;
                self.keep(v, &children)?;
                v
            }
            Act::Namespace => {
                let (l, op, r) = (children[0].value, children[1].value, children[2].value);
                if self.heap.kind(l) == Kind::Symbol {
                    self.state
                        .retag(children[0].term_record, TokenKind::SymbolPackage);
                }
                let v = self.lang(op, &[l, r])?;
                self.keep(v, &children)?;
                v
            }
            Act::DollarAt => {
                let (obj, op, member) = (children[0].value, children[1].value, children[2].value);
                if self.heap.symbol_name(op) == "@" {
                    self.state.retag(children[2].term_record, TokenKind::Slot);
                }
                let v = self.lang(op, &[obj, member])?;
                self.keep(v, &children)?;
                v
            }
            Act::Pipe => {
                let v = self.pipe(&children[0], &children[2])?;
                self.keep(v, &children)?;
                v
            }
            Act::NextBreak => {
                let v = self.lang(children[0].value, &[])?;
                self.keep(v, &children)?;
                v
            }
            Act::CondPass => children[1].value,
            Act::ForCond => {
                // keep the loop variable and sequence as one cons cell
                let (var, seq) = (children[1].value, children[3].value);
                let v = self
                    .heap
                    .alloc_cons(var, seq)
                    .map_err(heap_error)?;
                self.keep(v, &children)?;
                v
            }
            Act::ExprlistEmpty => Value::NIL,
            Act::ExprlistOne => {
                let v = self.pairlist(&[children[0].value])?;
                self.keep(v, &children)?;
                v
            }
            Act::ExprlistAdd => {
                let list = children[0].value;
                let elt = children[2].value;
                if list.is_nil() {
                    let v = self.pairlist(&[elt])?;
                    self.state.preserve(self.heap, v).map_err(heap_error)?;
                    self.state.release(self.heap, elt);
                    v
                } else {
                    self.append_to_list(list, elt, None)?;
                    // the element is now reachable from the list
                    self.state.release(self.heap, elt);
                    list
                }
            }
            Act::ExprlistSame => children[0].value,
            Act::SublistOne => {
                let sub = &children[0];
                if sub.empty_sub {
                    empty_sub = true;
                    let missing = self.heap.globals().missing_arg;
                    let v = self.pairlist(&[missing])?;
                    self.state.preserve(self.heap, v).map_err(heap_error)?;
                    v
                } else {
                    sub.value
                }
            }
            Act::SublistAdd => {
                let list = children[0].value;
                let sub = &children[3];
                let (car, tag) = if sub.empty_sub {
                    (self.heap.globals().missing_arg, Value::NIL)
                } else {
                    (self.heap.car(sub.value), self.heap.tag(sub.value))
                };
                self.append_to_list(list, car, Some(tag))?;
                if !sub.empty_sub {
                    self.state.release(self.heap, sub.value);
                }
                list
            }
            Act::SubEmpty => {
                empty_sub = true;
                Value::NIL
            }
            Act::SubExpr => {
                let v = self.pairlist(&[children[0].value])?;
                self.keep(v, &children)?;
                v
            }
            Act::SubTagged { tag, has_value } => {
                let tag_sym = match tag {
                    TagKind::Symbol => {
                        self.state.retag(children[0].term_record, TokenKind::SymbolSub);
                        children[0].value
                    }
                    TagKind::Str => {
                        let text = {
                            let c = self.heap.str_elt(children[0].value, 0);
                            self.heap.char_text(c).into_owned()
                        };
                        self.heap.install(&text).map_err(heap_error)?
                    }
                    TagKind::Null => self.heap.install("NULL").map_err(heap_error)?,
                };
                self.state.retag(children[1].records.first().copied(), TokenKind::EqSub);
                let car = if has_value {
                    children[2].value
                } else {
                    self.heap.globals().missing_arg
                };
                let cell = self
                    .heap
                    .protected(&[tag_sym], |h| h.alloc_cons(car, Value::NIL))
                    .map_err(heap_error)?;
                self.heap.set_tag(cell, tag_sym);
                self.keep(cell, &children)?;
                cell
            }
            Act::FormlistEmpty => Value::NIL,
            Act::FormlistOne { default } => {
                self.formal_cell(&children, 0, default, Value::NIL)?
            }
            Act::FormlistAdd { default } => {
                let list = children[0].value;
                self.formal_cell(&children, 2, default, list)?
            }
        };

        // parse data: expression reductions get a row of their own;
        // pass-throughs between the expression nonterminals do not, but a
        // literal or name reduced to an expression does
        let mut records: Vec<usize> = children.iter().flat_map(|c| c.records.clone()).collect();
        let makes_row = match lhs {
            NT_EXPR => true,
            NT_EOAH | NT_EOH => act != Act::First,
            _ => false,
        };
        if makes_row && !children.is_empty() {
            if let Some(span) = span {
                if let Some(idx) = self.state.record_expr(span, &records) {
                    records = vec![idx];
                }
            }
        }

        Ok(SemVal {
            value,
            span,
            records,
            term_record,
            empty_sub,
        })
    }

    /// Append one element (with an optional tag) to the end of a pairlist.
    fn append_to_list(&mut self, list: Value, car: Value, tag: Option<Value>) -> Result<()> {
        let cell = self
            .heap
            .alloc_cons(car, Value::NIL)
            .map_err(heap_error)?;
        if let Some(tag) = tag {
            if !tag.is_nil() {
                self.heap.set_tag(cell, tag);
            }
        }
        debug_assert!(!list.is_nil(), "append to an empty pairlist");
        let mut last = list;
        loop {
            let next = self.heap.cdr(last);
            if next.is_nil() {
                break;
            }
            last = next;
        }
        self.heap.set_cdr(last, cell);
        Ok(())
    }

    /// Build (or extend) a formal-argument list entry.
    fn formal_cell(
        &mut self,
        children: &[SemVal],
        sym_index: usize,
        default: bool,
        list: Value,
    ) -> Result<Value> {
        let sym = children[sym_index].value;
        self.state
            .retag(children[sym_index].term_record, TokenKind::SymbolFormals);
        if default {
            self.state.retag(
                children[sym_index + 1].records.first().copied(),
                TokenKind::EqFormals,
            );
        }
        // repeated formal names are rejected at parse time
        let mut cursor = list;
        while !cursor.is_nil() {
            if self.heap.tag(cursor) == sym {
                let name = self.heap.symbol_name(sym).into_owned();
                return Err(self.err_at(
                    ParseSubclass::RepeatedFormal,
                    format!("repeated formal argument '{}'", name),
                    &children[sym_index],
                ));
            }
            cursor = self.heap.cdr(cursor);
        }
        let car = if default {
            children[sym_index + 2].value
        } else {
            self.heap.globals().missing_arg
        };
        let cell = self
            .heap
            .alloc_cons(car, Value::NIL)
            .map_err(heap_error)?;
        self.heap.set_tag(cell, sym);
        if list.is_nil() {
            self.state.preserve(self.heap, cell).map_err(heap_error)?;
            for c in children {
                self.state.release(self.heap, c.value);
            }
            Ok(cell)
        } else {
            let mut last = list;
            loop {
                let next = self.heap.cdr(last);
                if next.is_nil() {
                    break;
                }
                last = next;
            }
            self.heap.set_cdr(last, cell);
            if default {
                self.state.release(self.heap, children[sym_index + 2].value);
            }
            Ok(list)
        }
    }

    /// Complete one statement: the prog reductions.
    fn finish_statement(&mut self, act: Act, children: &[SemVal]) -> Result<Statement> {
        match act {
            Act::ProgEof => Ok(Statement::empty(ParseStatus::Eof)),
            Act::ProgNull => Ok(Statement::empty(ParseStatus::Null)),
            Act::ProgExpr => {
                let value = children[0].value;
                self.check_clean(value, &children[0])?;
                let span = children[0].span.unwrap_or_default();
                if self.state.options.keep_src_refs {
                    let r = crate::srcref::build_srcref(self.heap, span).map_err(heap_error)?;
                    self.state.preserve(self.heap, r).map_err(heap_error)?;
                    self.state.srcrefs.push(r);
                }
                Ok(Statement {
                    status: ParseStatus::Ok,
                    value,
                    span,
                })
            }
            _ => unreachable!("not a prog action"),
        }
    }

    /// Post-parse checks: no placeholder and no stray pipe-bind symbol
    /// may survive into the final expression.
    fn check_clean(&self, value: Value, at: &SemVal) -> Result<()> {
        let g = *self.heap.globals();
        let mut work = vec![value];
        while let Some(v) = work.pop() {
            if v.is_nil() {
                continue;
            }
            if v == g.placeholder {
                return Err(self.err_at(
                    ParseSubclass::InvalidPlaceholder,
                    "invalid use of pipe placeholder",
                    at,
                ));
            }
            let kind = self.heap.kind(v);
            if kind.is_list_like() {
                if kind == Kind::Lang && self.heap.car(v) == g.pipe_bind {
                    return Err(self.err_at(
                        ParseSubclass::InvalidPipeBind,
                        "invalid use of pipe bind symbol",
                        at,
                    ));
                }
                work.push(self.heap.car(v));
                work.push(self.heap.cdr(v));
                work.push(self.heap.tag(v));
            }
        }
        Ok(())
    }
}

