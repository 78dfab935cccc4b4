//! Source references and parse data.

mod common;

use common::heap;
use rye_gc::{Heap, Kind, Value};
use rye_par::{parse_text_with_source, ParseOptions};

fn attrib_by_name(h: &mut Heap, v: Value, name: &str) -> Value {
    let sym = h.install(name).unwrap();
    h.get_attrib(v, sym)
}

#[test]
fn test_statement_srcref_layout() {
    let mut h = heap();
    let exprs = parse_text_with_source(&mut h, "1 + 2", "<text>").unwrap();
    h.protect(exprs).unwrap();

    let refs = attrib_by_name(&mut h, exprs, "srcref");
    assert_eq!(h.kind(refs), Kind::List);
    assert_eq!(h.length(refs), 1);
    let r = h.elt(refs, 0);
    assert_eq!(h.kind(r), Kind::Int);
    // (first_line, first_byte, last_line, last_byte, first_col, last_col, ...)
    assert_eq!(&h.int_data(r)[..6], &[1, 0, 1, 5, 0, 5]);
    assert_eq!(&h.int_data(r)[6..8], &[1, 1]);
    h.unprotect(1).unwrap();
}

#[test]
fn test_srcfile_attribute() {
    let mut h = heap();
    let exprs = parse_text_with_source(&mut h, "x", "demo.ry").unwrap();
    h.protect(exprs).unwrap();
    let srcfile = attrib_by_name(&mut h, exprs, "srcfile");
    assert_eq!(h.kind(srcfile), Kind::Env);
    let fname = attrib_by_name(&mut h, srcfile, "filename");
    assert_eq!(h.char_text(h.str_elt(fname, 0)), "demo.ry");
    h.unprotect(1).unwrap();
}

#[test]
fn test_function_definitions_carry_srcrefs() {
    let mut h = heap();
    let exprs = parse_text_with_source(&mut h, "f <- function(x) x", "<text>").unwrap();
    h.protect(exprs).unwrap();
    let assign = h.elt(exprs, 0);
    // (<- f (function formals body srcref))
    let fun = h.car(h.nth_cdr(assign, 2));
    let srcref = h.car(h.nth_cdr(fun, 3));
    assert_eq!(h.kind(srcref), Kind::Int);
    assert_eq!(h.length(srcref), 8);
    // the function definition starts at column 5
    assert_eq!(h.int_data(srcref)[4], 5);
    h.unprotect(1).unwrap();
}

#[test]
fn test_parse_data_matrix_shape() {
    let mut h = heap();
    let exprs = parse_text_with_source(&mut h, "1 + 2", "<text>").unwrap();
    h.protect(exprs).unwrap();

    let data = attrib_by_name(&mut h, exprs, "parseData");
    assert_eq!(h.kind(data), Kind::Int);
    let dim = attrib_by_name(&mut h, data, "dim");
    assert_eq!(h.int_data(dim), &[8, (h.length(data) / 8) as i32]);

    let tokens = attrib_by_name(&mut h, data, "tokens");
    let text = attrib_by_name(&mut h, data, "text");
    assert_eq!(h.length(tokens), h.length(data) / 8);
    assert_eq!(h.length(text), h.length(tokens));

    let names: Vec<String> = (0..h.length(tokens))
        .map(|i| h.char_text(h.str_elt(tokens, i)).into_owned())
        .collect();
    assert!(names.iter().any(|n| n == "NUM_CONST"));
    assert!(names.iter().any(|n| n == "'+'"));
    assert!(names.iter().any(|n| n == "expr"));

    let texts: Vec<String> = (0..h.length(text))
        .map(|i| h.char_text(h.str_elt(text, i)).into_owned())
        .collect();
    assert!(texts.iter().any(|t| t == "1"));
    assert!(texts.iter().any(|t| t == "+"));
    assert!(texts.iter().any(|t| t == "2"));
    h.unprotect(1).unwrap();
}

#[test]
fn test_parse_data_ids_and_parents() {
    let mut h = heap();
    let exprs = parse_text_with_source(&mut h, "f(x)", "<text>").unwrap();
    h.protect(exprs).unwrap();
    let data = attrib_by_name(&mut h, exprs, "parseData");
    let ints = h.int_data(data).to_vec();
    let n = ints.len() / 8;

    // ids are monotone
    let ids: Vec<i32> = (0..n).map(|j| ints[j * 8 + 6]).collect();
    for pair in ids.windows(2) {
        assert!(pair[0] < pair[1], "ids not monotone: {:?}", ids);
    }
    // every terminal has a parent expression
    for j in 0..n {
        let terminal = ints[j * 8 + 4] == 1;
        let parent = ints[j * 8 + 7];
        if terminal {
            assert_ne!(parent, 0, "terminal row {} has no parent", j);
        }
    }
    h.unprotect(1).unwrap();
}

#[test]
fn test_symbol_retagging() {
    let mut h = heap();
    let exprs = parse_text_with_source(
        &mut h,
        "f(x = 1)\npkg::y\nobj@slot\nfunction(a) a",
        "<text>",
    )
    .unwrap();
    h.protect(exprs).unwrap();
    let data = attrib_by_name(&mut h, exprs, "parseData");
    let tokens = attrib_by_name(&mut h, data, "tokens");
    let names: Vec<String> = (0..h.length(tokens))
        .map(|i| h.char_text(h.str_elt(tokens, i)).into_owned())
        .collect();
    assert!(names.iter().any(|n| n == "SYMBOL_FUNCTION_CALL"));
    assert!(names.iter().any(|n| n == "SYMBOL_SUB"));
    assert!(names.iter().any(|n| n == "EQ_SUB"));
    assert!(names.iter().any(|n| n == "SYMBOL_PACKAGE"));
    assert!(names.iter().any(|n| n == "SLOT"));
    assert!(names.iter().any(|n| n == "SYMBOL_FORMALS"));
    h.unprotect(1).unwrap();
}

#[test]
fn test_comments_recorded_and_parented() {
    let mut h = heap();
    let exprs = parse_text_with_source(&mut h, "x <- (1 + # inner\n  2)", "<text>").unwrap();
    h.protect(exprs).unwrap();
    let data = attrib_by_name(&mut h, exprs, "parseData");
    let tokens = attrib_by_name(&mut h, data, "tokens");
    let ints = h.int_data(data).to_vec();
    let n = ints.len() / 8;
    let mut comment_parent = None;
    for j in 0..n {
        let name = h.char_text(h.str_elt(tokens, j)).into_owned();
        if name == "COMMENT" {
            comment_parent = Some(ints[j * 8 + 7]);
        }
    }
    let parent = comment_parent.expect("comment row missing");
    assert!(parent > 0, "comment inside an expression must have a parent");
    h.unprotect(1).unwrap();
}

#[test]
fn test_orphan_comment_attaches_forward() {
    let mut h = heap();
    let exprs = parse_text_with_source(&mut h, "# leading\nx", "<text>").unwrap();
    h.protect(exprs).unwrap();
    let data = attrib_by_name(&mut h, exprs, "parseData");
    let tokens = attrib_by_name(&mut h, data, "tokens");
    let ints = h.int_data(data).to_vec();
    let n = ints.len() / 8;
    for j in 0..n {
        let name = h.char_text(h.str_elt(tokens, j)).into_owned();
        if name == "COMMENT" {
            assert!(ints[j * 8 + 7] < 0, "orphan comment parent not negated");
        }
    }
    h.unprotect(1).unwrap();
}

#[test]
fn test_line_directive_rewrites_reported_lines() {
    let mut h = heap();
    let exprs = parse_text_with_source(&mut h, "#line 40 \"gen.ry\"\nx + y", "<text>").unwrap();
    h.protect(exprs).unwrap();
    let refs = attrib_by_name(&mut h, exprs, "srcref");
    let r = h.elt(refs, 0);
    let ints = h.int_data(r);
    assert_eq!(ints[0], 40, "first_line ignores the directive");
    // the physical parse counter is untouched
    assert_eq!(ints[6], 2);
    h.unprotect(1).unwrap();
}

#[test]
fn test_srcrefs_off_by_default() {
    let mut h = heap();
    let _ = ParseOptions::default();
    let exprs = rye_par::parse_text(&mut h, "f <- function(x) x").unwrap();
    h.protect(exprs).unwrap();
    let refs = attrib_by_name(&mut h, exprs, "srcref");
    assert!(refs.is_nil());
    let assign = h.elt(exprs, 0);
    let fun = h.car(h.nth_cdr(assign, 2));
    let srcref = h.car(h.nth_cdr(fun, 3));
    assert!(srcref.is_nil());
    h.unprotect(1).unwrap();
}
