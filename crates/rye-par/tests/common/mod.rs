//! Shared helpers for parser tests: a compact s-expression renderer for
//! comparing expression graphs.

use rye_gc::{GcConfig, Heap, Kind, Value};
use rye_par::parse_text;

pub fn heap() -> Heap {
    Heap::new(GcConfig::default()).expect("heap init")
}

/// Parse one statement and return its expression.
pub fn parse1(heap: &mut Heap, text: &str) -> Value {
    let exprs = parse_text(heap, text).unwrap_or_else(|e| panic!("parse of {:?} failed: {}", text, e));
    assert_eq!(heap.kind(exprs), Kind::Expr, "no expressions in {:?}", text);
    assert_eq!(heap.length(exprs), 1, "expected one expression in {:?}", text);
    heap.elt(exprs, 0)
}

/// Render a parsed value as an s-expression for structural comparison.
pub fn lisp(heap: &Heap, v: Value) -> String {
    if v.is_nil() {
        return "NULL".to_string();
    }
    match heap.kind(v) {
        Kind::Symbol => {
            if v == heap.globals().missing_arg {
                "<missing>".to_string()
            } else {
                heap.symbol_name(v).into_owned()
            }
        }
        Kind::Lang | Kind::Cons => {
            let mut out = String::from("(");
            let mut cell = v;
            let mut first = true;
            while !cell.is_nil() {
                if !first {
                    out.push(' ');
                }
                first = false;
                let tag = heap.tag(cell);
                if !tag.is_nil() {
                    out.push_str(&heap.symbol_name(tag));
                    out.push('=');
                }
                let car = heap.car(cell);
                if car == heap.globals().missing_arg {
                    // a named hole renders as just the name=
                    if tag.is_nil() {
                        out.push_str("<missing>");
                    }
                } else {
                    out.push_str(&lisp(heap, car));
                }
                cell = heap.cdr(cell);
            }
            out.push(')');
            out
        }
        Kind::Logical => match heap.logical_data(v)[0] {
            x if x == rye_gc::NA_LOGICAL => "NA".to_string(),
            0 => "FALSE".to_string(),
            _ => "TRUE".to_string(),
        },
        Kind::Int => {
            let x = heap.int_data(v)[0];
            if x == rye_gc::NA_INTEGER {
                "NA_integer_".to_string()
            } else {
                format!("{}L", x)
            }
        }
        Kind::Real => {
            let x = heap.real_data(v)[0];
            if rye_gc::is_na_real(x) {
                "NA_real_".to_string()
            } else if x == x.trunc() && x.is_finite() && x.abs() < 1e15 {
                format!("{}", x as i64)
            } else {
                format!("{}", x)
            }
        }
        Kind::Cplx => {
            let x = heap.cplx_data(v)[0];
            format!("{}i", x.im)
        }
        Kind::Str => {
            let c = heap.str_elt(v, 0);
            if heap.is_na_string(c) {
                "NA_character_".to_string()
            } else {
                format!("{:?}", heap.char_text(c))
            }
        }
        Kind::Expr => {
            let mut out = String::from("#expr(");
            for i in 0..heap.length(v) {
                if i > 0 {
                    out.push(' ');
                }
                out.push_str(&lisp(heap, heap.elt(v, i)));
            }
            out.push(')');
            out
        }
        other => format!("<{}>", other.name()),
    }
}

/// Parse then render in one step.
pub fn parsed(heap: &mut Heap, text: &str) -> String {
    let v = parse1(heap, text);
    lisp(heap, v)
}
