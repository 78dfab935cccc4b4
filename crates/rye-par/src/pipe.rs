//! The pipe operator's placement rules.
//!
//! `lhs |> rhs` requires a call on the right. The left-hand side lands,
//! in order of preference: in a placeholder cell found by walking the
//! chain of extractions (`$`, `[`, `[[`, `@`) off the call's first
//! argument; in a named top-level placeholder argument; or as a fresh
//! first argument. Placeholders may appear exactly once, must be named
//! at the top level, and never name the called function itself. The
//! pipe-bind form `lhs |> var => expr` desugars into an immediately
//! called one-parameter function.

use rye_gc::{Heap, Kind, Value};

use crate::error::{ParseSubclass, Result};
use crate::parser::{heap_error, Parser, SemVal};

/// Function heads that cannot be pipe targets (syntactically special
/// forms whose evaluation rules would not see the injected argument).
const SPECIAL_HEADS: &[&str] = &[
    "if", "while", "for", "repeat", "function", "(", "{", "&&", "||", "=", "<-", "<<-", "->",
    "->>", "?", "~",
];

impl<'a, 'h> Parser<'a, 'h> {
    /// Build the call for `lhs |> rhs`.
    pub(crate) fn pipe(&mut self, lhs: &SemVal, rhs: &SemVal) -> Result<Value> {
        let rhs_v = rhs.value;
        if self.heap.kind(rhs_v) != Kind::Lang {
            return Err(self.pipe_err(
                ParseSubclass::RhsNotFnCall,
                "The pipe operator requires a function call as RHS",
                rhs,
            ));
        }
        let g = *self.heap.globals();
        let head = self.heap.car(rhs_v);

        // `lhs |> var => expr` becomes `(function(var) expr)(lhs)`
        if head == g.pipe_bind {
            return self.pipe_bind_call(lhs, rhs);
        }

        if head == g.placeholder {
            return Err(self.pipe_err(
                ParseSubclass::PlaceholderInRhsFn,
                "pipe placeholder cannot be used as the RHS function",
                rhs,
            ));
        }
        if self.heap.kind(head) == Kind::Symbol {
            let name = self.heap.symbol_name(head).into_owned();
            if SPECIAL_HEADS.contains(&name.as_str()) {
                return Err(self.pipe_err(
                    ParseSubclass::UnsupportedInPipe,
                    format!("function '{}' not supported in RHS call of a pipe", name),
                    rhs,
                ));
            }
        }

        let total = count_placeholders(self.heap, rhs_v, g.placeholder);

        // a placeholder reached through a chain of extractions
        if let Some(cell) = find_placeholder_cell(self.heap, rhs_v, g.placeholder) {
            if total > 1 {
                return Err(self.pipe_err(
                    ParseSubclass::TooManyPlaceholders,
                    "pipe placeholder may only appear once",
                    rhs,
                ));
            }
            self.heap.set_car(cell, lhs.value);
            return Ok(rhs_v);
        }

        // more than one placeholder can never be resolved
        if total > 1 {
            return Err(self.pipe_err(
                ParseSubclass::TooManyPlaceholders,
                "pipe placeholder may only appear once",
                rhs,
            ));
        }

        // a named top-level placeholder argument
        let mut arg_cell = self.heap.cdr(rhs_v);
        while !arg_cell.is_nil() {
            if self.heap.car(arg_cell) == g.placeholder {
                if self.heap.tag(arg_cell).is_nil() {
                    return Err(self.pipe_err(
                        ParseSubclass::PlaceholderNotNamed,
                        "pipe placeholder can only be used as a named argument",
                        rhs,
                    ));
                }
                self.heap.set_car(arg_cell, lhs.value);
                return Ok(rhs_v);
            }
            arg_cell = self.heap.cdr(arg_cell);
        }

        // otherwise the left-hand side becomes the first argument
        let old_args = self.heap.cdr(rhs_v);
        let lhs_v = lhs.value;
        let cell = self
            .heap
            .alloc_cons(lhs_v, old_args)
            .map_err(heap_error)?;
        self.heap.set_cdr(rhs_v, cell);
        Ok(rhs_v)
    }

    fn pipe_bind_call(&mut self, lhs: &SemVal, rhs: &SemVal) -> Result<Value> {
        let rhs_v = rhs.value;
        let var = self.heap.car(self.heap.cdr(rhs_v));
        let body = self.heap.car(self.heap.nth_cdr(rhs_v, 2));
        if self.heap.kind(var) != Kind::Symbol {
            return Err(self.pipe_err(
                ParseSubclass::NotASymbol,
                "the left side of => must be a variable name",
                rhs,
            ));
        }
        let missing = self.heap.globals().missing_arg;
        let formals = self
            .heap
            .alloc_cons(missing, Value::NIL)
            .map_err(heap_error)?;
        self.heap.set_tag(formals, var);
        self.state
            .preserve(self.heap, formals)
            .map_err(heap_error)?;
        let fun_sym = self.heap.install("function").map_err(heap_error)?;
        let fun = self.lang(fun_sym, &[formals, body, Value::NIL])?;
        self.state.preserve(self.heap, fun).map_err(heap_error)?;
        let call = self.lang(fun, &[lhs.value]);
        self.state.release(self.heap, fun);
        self.state.release(self.heap, formals);
        call
    }

    fn pipe_err(
        &self,
        subclass: ParseSubclass,
        message: impl Into<String>,
        at: &SemVal,
    ) -> crate::error::ParseError {
        let pos = at.span.map(|s| s.first).unwrap_or_default();
        crate::error::ParseError::new(subclass, message, self.state.filename(), pos)
    }
}

/// Count placeholder occurrences anywhere in the expression.
fn count_placeholders(heap: &Heap, root: Value, placeholder: Value) -> usize {
    let mut count = 0;
    let mut work = vec![root];
    while let Some(v) = work.pop() {
        if v.is_nil() {
            continue;
        }
        if v == placeholder {
            count += 1;
            continue;
        }
        if heap.kind(v).is_list_like() {
            work.push(heap.car(v));
            work.push(heap.cdr(v));
            work.push(heap.tag(v));
        }
    }
    count
}

/// Follow the chain of extractor calls off the call's first argument
/// looking for the cell holding a placeholder.
fn find_placeholder_cell(heap: &Heap, call: Value, placeholder: Value) -> Option<Value> {
    fn is_extractor(heap: &Heap, head: Value) -> bool {
        heap.kind(head) == Kind::Symbol
            && matches!(&*heap.symbol_name(head), "$" | "[" | "[[" | "@")
    }

    let mut expr = call;
    loop {
        let head = heap.car(expr);
        if !is_extractor(heap, head) {
            return None;
        }
        let first_cell = heap.cdr(expr);
        if first_cell.is_nil() {
            return None;
        }
        let arg = heap.car(first_cell);
        if arg == placeholder {
            return Some(first_cell);
        }
        if heap.kind(arg) == Kind::Lang {
            expr = arg;
            continue;
        }
        return None;
    }
}
