//! Source references and the parse-data table.
//!
//! A source reference is an 8-integer vector `(first_line, first_byte,
//! last_line, last_byte, first_column, last_column, first_parsed,
//! last_parsed)` attached through the `srcref` attribute together with a
//! `srcfile` environment. The parse data is an `(8, N)` integer matrix
//! with one column per recorded token or expression, a parallel text
//! vector and a token-name table; comments are attached to their
//! innermost enclosing expression after the fact.

use rye_gc::{Heap, Kind, Value};
use rye_lex::{SrcSpan, TokenKind};

use crate::error::Result as GenResult;
use crate::state::{DataRecord, ParseState, RecKind};

/// Build the 8-integer srcref vector for a span.
pub(crate) fn build_srcref(heap: &mut Heap, span: SrcSpan) -> rye_gc::Result<Value> {
    let v = heap.alloc_vector(Kind::Int, 8)?;
    let data = heap.int_data_mut(v);
    data[0] = span.first.line as i32;
    data[1] = span.first.byte as i32;
    data[2] = span.last.line as i32;
    data[3] = span.last.byte as i32;
    data[4] = span.first.col as i32;
    data[5] = span.last.col as i32;
    data[6] = span.first.parse as i32;
    data[7] = span.last.parse as i32;
    Ok(v)
}

/// Build (once per parse) the srcfile environment carrying the filename.
pub(crate) fn srcfile_env(heap: &mut Heap, filename: &str) -> rye_gc::Result<Value> {
    let env = heap.alloc_env(Value::NIL, Value::NIL)?;
    heap.protected(&[env], |heap| {
        let name = heap.mk_string(filename)?;
        heap.protected(&[name], |heap| {
            let sym = heap.install("filename")?;
            heap.set_attrib(env, sym, name)
        })
    })?;
    Ok(env)
}

/// Attach a srcref (and the srcfile) to a value via attributes.
pub(crate) fn attach_srcref(
    heap: &mut Heap,
    value: Value,
    srcref: Value,
    srcfile: Value,
) -> rye_gc::Result<()> {
    if value.is_nil() {
        return Ok(());
    }
    let srcref_sym = heap.install("srcref")?;
    heap.set_attrib(value, srcref_sym, srcref)?;
    if !srcfile.is_nil() {
        let srcfile_sym = heap.install("srcfile")?;
        heap.set_attrib(value, srcfile_sym, srcfile)?;
    }
    Ok(())
}

/// Assign parents to comment rows: one right-to-left pass.
///
/// Terminals appear in source order and expressions in reduction order
/// (children before parents), so for a comment the first later row whose
/// end lies past the comment is the innermost candidate; walking its
/// parent chain finds the tightest enclosing expression that starts
/// before the comment. Comments with no enclosing expression attach to
/// the next top-level expression with a negated parent id.
pub(crate) fn assign_comment_parents(records: &mut [DataRecord]) {
    let index_by_id: rustc_hash::FxHashMap<i32, usize> = records
        .iter()
        .enumerate()
        .map(|(i, r)| (r.id, i))
        .collect();

    for i in (0..records.len()).rev() {
        if records[i].kind != RecKind::Terminal(TokenKind::Comment) {
            continue;
        }
        let c_start = records[i].first.byte;
        let c_end = records[i].last.byte;

        // smallest later row ending past the comment
        let mut candidate = None;
        for (j, rec) in records.iter().enumerate().skip(i + 1) {
            if rec.last.byte > c_end && !rec.kind.is_terminal() {
                candidate = Some(j);
                break;
            }
        }
        // ascend until the expression starts at or before the comment
        let mut parent = 0i32;
        let mut cur = candidate;
        while let Some(j) = cur {
            if records[j].first.byte <= c_start {
                parent = records[j].id;
                break;
            }
            cur = if records[j].parent > 0 {
                index_by_id.get(&records[j].parent).copied()
            } else {
                None
            };
        }
        if parent != 0 {
            records[i].parent = parent;
            continue;
        }
        // orphan: best-effort attachment to the next top-level expression
        let next_top = records
            .iter()
            .skip(i + 1)
            .find(|r| !r.kind.is_terminal() && r.parent == 0)
            .map(|r| r.id);
        records[i].parent = match next_top {
            Some(id) => -id,
            None => 0,
        };
    }
}

/// Build the exposed parse-data value: an `(8, N)` integer matrix with
/// `text` and `tokens` attributes.
pub(crate) fn build_parse_data(heap: &mut Heap, state: &mut ParseState) -> GenResult<Value> {
    use crate::parser::heap_error;

    assign_comment_parents(&mut state.records);
    let n = state.records.len();

    let data = heap.alloc_vector(Kind::Int, 8 * n).map_err(heap_error)?;
    heap.protect(data).map_err(heap_error)?;
    {
        let ints = heap.int_data_mut(data);
        for (j, rec) in state.records.iter().enumerate() {
            let col = &mut ints[j * 8..j * 8 + 8];
            col[0] = rec.first.parse as i32;
            col[1] = rec.first.col as i32;
            col[2] = rec.last.parse as i32;
            col[3] = rec.last.col as i32;
            col[4] = rec.kind.is_terminal() as i32;
            col[5] = rec.kind.code();
            col[6] = rec.id;
            col[7] = rec.parent;
        }
    }

    let filled = fill_parse_data_attrs(heap, state, data, n);
    heap.unprotect(1).map_err(heap_error)?;
    filled.map_err(heap_error)?;
    Ok(data)
}

fn fill_parse_data_attrs(
    heap: &mut Heap,
    state: &ParseState,
    data: Value,
    n: usize,
) -> rye_gc::Result<()> {
    // dim attribute: 8 x N
    let dim = heap.alloc_vector(Kind::Int, 2)?;
    {
        let d = heap.int_data_mut(dim);
        d[0] = 8;
        d[1] = n as i32;
    }
    heap.protect(dim)?;
    let dim_sym = heap.install("dim")?;
    heap.set_attrib(data, dim_sym, dim)?;
    heap.unprotect(1)?;

    // literal text of every row
    let text = heap.alloc_vector(Kind::Str, n)?;
    heap.protect(text)?;
    for (j, rec) in state.records.iter().enumerate() {
        let c = heap.mk_char(&rec.text)?;
        heap.set_str_elt(text, j, c);
    }
    let text_sym = heap.install("text")?;
    heap.set_attrib(data, text_sym, text)?;
    heap.unprotect(1)?;

    // symbolic token names
    let tokens = heap.alloc_vector(Kind::Str, n)?;
    heap.protect(tokens)?;
    for (j, rec) in state.records.iter().enumerate() {
        let c = heap.mk_char(rec.kind.name())?;
        heap.set_str_elt(tokens, j, c);
    }
    let tokens_sym = heap.install("tokens")?;
    heap.set_attrib(data, tokens_sym, tokens)?;
    heap.unprotect(1)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rye_lex::Position;

    fn record(id: i32, kind: RecKind, start: u32, end: u32) -> DataRecord {
        DataRecord {
            first: Position {
                line: 1,
                col: start,
                byte: start,
                parse: 1,
            },
            last: Position {
                line: 1,
                col: end,
                byte: end,
                parse: 1,
            },
            kind,
            id,
            parent: 0,
            text: String::new(),
        }
    }

    #[test]
    fn test_comment_attaches_to_enclosing_expression() {
        // layout: x ( # c <newline> y ) as rows: sym x, comment, sym y,
        // expr y, expr whole
        let mut records = vec![
            record(1, RecKind::Terminal(TokenKind::Symbol), 0, 1),
            record(2, RecKind::Terminal(TokenKind::Comment), 4, 8),
            record(3, RecKind::Terminal(TokenKind::Symbol), 10, 11),
            {
                let mut r = record(4, RecKind::Expr, 10, 11);
                r.parent = 5;
                r
            },
            record(5, RecKind::Expr, 0, 12),
        ];
        assign_comment_parents(&mut records);
        assert_eq!(records[1].parent, 5);
    }

    #[test]
    fn test_orphan_comment_attaches_forward_negated() {
        let mut records = vec![
            record(1, RecKind::Terminal(TokenKind::Comment), 0, 5),
            record(2, RecKind::Terminal(TokenKind::Symbol), 6, 7),
            record(3, RecKind::Expr, 6, 7),
        ];
        assign_comment_parents(&mut records);
        assert_eq!(records[0].parent, -3);
    }

    #[test]
    fn test_trailing_orphan_comment_keeps_zero_parent() {
        let mut records = vec![
            record(1, RecKind::Terminal(TokenKind::Symbol), 0, 1),
            record(2, RecKind::Expr, 0, 1),
            record(3, RecKind::Terminal(TokenKind::Comment), 2, 9),
        ];
        assign_comment_parents(&mut records);
        assert_eq!(records[2].parent, 0);
    }
}
