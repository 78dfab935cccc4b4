//! rye-par - the parser front-end of the rye runtime.
//!
//! A table-driven LALR(1) parser over the language grammar, built from a
//! hand-written lexer and an in-crate table generator. Parsing reads one
//! expression at a time (newline- or semicolon-terminated), constructs
//! the heap-allocated expression graph through semantic actions, and
//! cooperates with the collector through a precious multi-set: every
//! value the parser builds is rooted there until it is reachable from
//! the finished expression.
//!
//! Alongside the expression graph the parser can record source
//! references (8-integer spans attached through the `srcref` attribute)
//! and the parse-data table (token spans, codes, monotone ids and parent
//! links, with comments attached to their innermost enclosing
//! expression).
//!
//! ```
//! use rye_gc::{GcConfig, Heap};
//! use rye_par::{parse_text, ParseOptions};
//!
//! let mut heap = Heap::new(GcConfig::default()).unwrap();
//! let exprs = parse_text(&mut heap, "x <- 1 + 2").unwrap();
//! assert_eq!(heap.length(exprs), 1);
//! let _ = ParseOptions::default();
//! ```

mod actions;
pub mod error;
mod grammar;
mod lalr;
pub mod parser;
mod pipe;
mod srcref;
pub mod state;
mod wrap;

use rye_gc::{Heap, Kind, Value};
use rye_lex::SrcSpan;

pub use error::{ErrorClass, ParseError, ParseSubclass, Result};
pub use parser::Parser;
pub use rye_lex::input::ParseInput;
pub use state::{ParseOptions, ParseStatus};
pub use wrap::CONTEXT_STACK_SIZE;

use parser::heap_error;

/// Read one expression from the input.
///
/// Returns the status and the expression value; `Null` for an empty
/// line, `Incomplete` when the input ends mid-expression (interactive
/// callers re-prompt), `Eof` at end of stream. The value is unrooted
/// when this returns: callers must protect or preserve it before the
/// next allocation.
pub fn parse_one(
    heap: &mut Heap,
    input: ParseInput<'_>,
    options: ParseOptions,
) -> Result<(ParseStatus, Value)> {
    let mut parser = Parser::new(heap, input, options)?;
    let result = parser.parse_next();
    parser.finish();
    result
}

/// Parse up to `n` expressions (all of them when `None`), returning an
/// expression vector with `srcref`/`srcfile`/`parseData` attributes as
/// requested by the options.
///
/// The result is unrooted when this returns.
pub fn parse_many(
    heap: &mut Heap,
    input: ParseInput<'_>,
    n: Option<usize>,
    options: ParseOptions,
) -> Result<Value> {
    let mut parser = Parser::new(heap, input, options)?;
    let mut stmts: Vec<Value> = Vec::new();
    let mut whole: Option<SrcSpan> = None;
    loop {
        if let Some(limit) = n {
            if stmts.len() >= limit {
                break;
            }
        }
        let stmt = parser.parse_prog()?;
        match stmt.status {
            ParseStatus::Ok => {
                whole = Some(match whole {
                    Some(w) => SrcSpan::merge(w, stmt.span),
                    None => stmt.span,
                });
                stmts.push(stmt.value);
            }
            ParseStatus::Null => continue,
            ParseStatus::Eof => break,
            ParseStatus::Incomplete => {
                return Err(ParseError::new(
                    ParseSubclass::UnexpectedEndOfInput,
                    "unexpected end of input",
                    parser.state.filename(),
                    Default::default(),
                ))
            }
            ParseStatus::Error => unreachable!("errors propagate as conditions"),
        }
    }
    let result = build_result(&mut parser, &stmts, whole)?;
    if !result.is_nil() {
        parser.heap.protect(result).map_err(heap_error)?;
    }
    parser.finish();
    if !result.is_nil() {
        parser.heap.unprotect(1).map_err(heap_error)?;
    }
    Ok(result)
}

/// Parse a whole string with default options.
pub fn parse_text(heap: &mut Heap, text: &str) -> Result<Value> {
    parse_many(heap, ParseInput::from_text(text), None, ParseOptions::default())
}

/// Parse a whole string keeping srcrefs and parse data.
pub fn parse_text_with_source(heap: &mut Heap, text: &str, filename: &str) -> Result<Value> {
    parse_many(
        heap,
        ParseInput::from_text(text),
        None,
        ParseOptions::with_source(filename),
    )
}

fn build_result(
    parser: &mut Parser<'_, '_>,
    stmts: &[Value],
    whole: Option<SrcSpan>,
) -> Result<Value> {
    let vec = parser
        .heap
        .alloc_vector(Kind::Expr, stmts.len())
        .map_err(heap_error)?;
    if vec.is_nil() {
        return Ok(vec);
    }
    parser.heap.protect(vec).map_err(heap_error)?;
    let filled = fill_result(parser, vec, stmts, whole);
    parser.heap.unprotect(1).map_err(heap_error)?;
    filled?;
    Ok(vec)
}

fn fill_result(
    parser: &mut Parser<'_, '_>,
    vec: Value,
    stmts: &[Value],
    whole: Option<SrcSpan>,
) -> Result<()> {
    for (i, &s) in stmts.iter().enumerate() {
        parser.heap.set_elt(vec, i, s);
    }

    if parser.state.options.keep_src_refs {
        let heap = &mut *parser.heap;
        let refs = heap
            .alloc_vector(Kind::List, parser.state.srcrefs.len())
            .map_err(heap_error)?;
        if !refs.is_nil() {
            for (i, &r) in parser.state.srcrefs.iter().enumerate() {
                heap.set_elt(refs, i, r);
            }
        }
        heap.protected(&[refs], |h| {
            let srcref_sym = h.install("srcref")?;
            h.set_attrib(vec, srcref_sym, refs)
        })
        .map_err(heap_error)?;

        if let Some(w) = whole {
            let whole_ref = srcref::build_srcref(parser.heap, w).map_err(heap_error)?;
            parser
                .heap
                .protected(&[whole_ref], |h| {
                    let sym = h.install("wholeSrcref")?;
                    h.set_attrib(vec, sym, whole_ref)
                })
                .map_err(heap_error)?;
        }
        let srcfile = parser.state.srcfile;
        if !srcfile.is_nil() {
            let heap = &mut *parser.heap;
            heap.protected(&[], |h| {
                let sym = h.install("srcfile")?;
                h.set_attrib(vec, sym, srcfile)
            })
            .map_err(heap_error)?;
        }
    }

    if parser.state.options.keep_parse_data {
        let data = srcref::build_parse_data(parser.heap, &mut parser.state)?;
        parser
            .heap
            .protected(&[data], |h| {
                let sym = h.install("parseData")?;
                h.set_attrib(vec, sym, data)
            })
            .map_err(heap_error)?;
    }
    Ok(())
}
