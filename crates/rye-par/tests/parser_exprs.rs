//! Expression-shape tests: precedence, associativity, control flow,
//! calls, indexing, newline handling.

mod common;

use common::{heap, parsed};
use rye_gc::Kind;
use rye_par::{parse_one, parse_text, ParseInput, ParseOptions, ParseStatus};

#[test]
fn test_literals_and_names() {
    let mut h = heap();
    assert_eq!(parsed(&mut h, "1"), "1");
    assert_eq!(parsed(&mut h, "2.5"), "2.5");
    assert_eq!(parsed(&mut h, "3L"), "3L");
    assert_eq!(parsed(&mut h, "TRUE"), "TRUE");
    assert_eq!(parsed(&mut h, "NULL"), "NULL");
    assert_eq!(parsed(&mut h, "NA"), "NA");
    assert_eq!(parsed(&mut h, "\"hi\""), "\"hi\"");
    assert_eq!(parsed(&mut h, "x"), "x");
    assert_eq!(parsed(&mut h, "`odd name`"), "odd name");
}

#[test]
fn test_arithmetic_precedence() {
    let mut h = heap();
    assert_eq!(parsed(&mut h, "1 + 2"), "(+ 1 2)");
    assert_eq!(parsed(&mut h, "1 + 2 * 3"), "(+ 1 (* 2 3))");
    assert_eq!(parsed(&mut h, "1 * 2 + 3"), "(+ (* 1 2) 3)");
    assert_eq!(parsed(&mut h, "a %o% b + c"), "(+ (%o% a b) c)");
}

#[test]
fn test_associativity() {
    let mut h = heap();
    assert_eq!(parsed(&mut h, "a - b - c"), "(- (- a b) c)");
    assert_eq!(parsed(&mut h, "2 ^ 3 ^ 2"), "(^ 2 (^ 3 2))");
    assert_eq!(parsed(&mut h, "a : b : c"), "(: (: a b) c)");
}

#[test]
fn test_unary_operators() {
    let mut h = heap();
    assert_eq!(parsed(&mut h, "-x"), "(- x)");
    assert_eq!(parsed(&mut h, "-x^2"), "(- (^ x 2))");
    assert_eq!(parsed(&mut h, "!a & b"), "(& (! a) b)");
    assert_eq!(parsed(&mut h, "~ y"), "(~ y)");
    assert_eq!(parsed(&mut h, "y ~ x"), "(~ y x)");
}

#[test]
fn test_double_star_spelling() {
    let mut h = heap();
    assert_eq!(parsed(&mut h, "a ** b"), "(^ a b)");
}

#[test]
fn test_comparisons_are_nonassociative() {
    let mut h = heap();
    assert_eq!(parsed(&mut h, "a < b"), "(< a b)");
    let err = parse_text(&mut h, "a < b < c").unwrap_err();
    assert_eq!(err.subclass, "unexpectedInput");
}

#[test]
fn test_assignments() {
    let mut h = heap();
    assert_eq!(parsed(&mut h, "x <- 1"), "(<- x 1)");
    assert_eq!(parsed(&mut h, "x = 1"), "(= x 1)");
    assert_eq!(parsed(&mut h, "x <<- 1"), "(<<- x 1)");
    assert_eq!(parsed(&mut h, "1 -> x"), "(<- x 1)");
    assert_eq!(parsed(&mut h, "1 ->> x"), "(<<- x 1)");
    assert_eq!(parsed(&mut h, "x := 1"), "(:= x 1)");
    // right-associative chains
    assert_eq!(parsed(&mut h, "a <- b <- 1"), "(<- a (<- b 1))");
}

#[test]
fn test_calls_and_arguments() {
    let mut h = heap();
    assert_eq!(parsed(&mut h, "f()"), "(f)");
    assert_eq!(parsed(&mut h, "f(1)"), "(f 1)");
    assert_eq!(parsed(&mut h, "f(1, 2)"), "(f 1 2)");
    assert_eq!(parsed(&mut h, "f(x = 2)"), "(f x=2)");
    assert_eq!(parsed(&mut h, "f(1, y = 2)"), "(f 1 y=2)");
    assert_eq!(parsed(&mut h, "f(\"nm\" = 1)"), "(f nm=1)");
    assert_eq!(parsed(&mut h, "f(x =)"), "(f x=)");
    assert_eq!(parsed(&mut h, "f(, 2)"), "(f <missing> 2)");
    assert_eq!(parsed(&mut h, "f(g(1), 2)"), "(f (g 1) 2)");
    // calls returned by calls
    assert_eq!(parsed(&mut h, "f(1)(2)"), "((f 1) 2)");
}

#[test]
fn test_indexing_and_member_access() {
    let mut h = heap();
    assert_eq!(parsed(&mut h, "x[i]"), "([ x i)");
    assert_eq!(parsed(&mut h, "x[[i]]"), "([[ x i)");
    assert_eq!(parsed(&mut h, "x[1, 2]"), "([ x 1 2)");
    assert_eq!(parsed(&mut h, "x[]"), "([ x)");
    assert_eq!(parsed(&mut h, "a$b"), "($ a b)");
    assert_eq!(parsed(&mut h, "a$\"b\""), "($ a \"b\")");
    assert_eq!(parsed(&mut h, "a@b"), "(@ a b)");
    assert_eq!(parsed(&mut h, "pkg::x"), "(:: pkg x)");
    assert_eq!(parsed(&mut h, "pkg:::x"), "(::: pkg x)");
    assert_eq!(parsed(&mut h, "\"pkg\"::x"), "(:: \"pkg\" x)");
    // chains bind left
    assert_eq!(parsed(&mut h, "a$b$c"), "($ ($ a b) c)");
    assert_eq!(parsed(&mut h, "x[i][j]"), "([ ([ x i) j)");
}

#[test]
fn test_special_operator_calls() {
    let mut h = heap();
    assert_eq!(parsed(&mut h, "a %in% b"), "(%in% a b)");
    assert_eq!(parsed(&mut h, "a %% b"), "(%% a b)");
}

#[test]
fn test_function_definitions() {
    let mut h = heap();
    assert_eq!(
        parsed(&mut h, "f <- function(x) x + 1"),
        "(<- f (function (x=) (+ x 1) NULL))"
    );
    assert_eq!(
        parsed(&mut h, "function(x, y = 2) x"),
        "(function (x= y=2) x NULL)"
    );
    assert_eq!(parsed(&mut h, "function() 1"), "(function NULL 1 NULL)");
    // the backslash spelling builds the same function call
    assert_eq!(parsed(&mut h, "\\(x) x"), "(function (x=) x NULL)");
}

#[test]
fn test_repeated_formals_rejected() {
    let mut h = heap();
    let err = parse_text(&mut h, "function(x, x) 1").unwrap_err();
    assert_eq!(err.subclass, "repeatedFormal");
}

#[test]
fn test_control_flow() {
    let mut h = heap();
    assert_eq!(parsed(&mut h, "if (a) 1"), "(if a 1)");
    assert_eq!(parsed(&mut h, "if (a) 1 else 2"), "(if a 1 2)");
    assert_eq!(parsed(&mut h, "while (a) b"), "(while a b)");
    assert_eq!(parsed(&mut h, "repeat b"), "(repeat b)");
    assert_eq!(parsed(&mut h, "for (i in 1:3) print(i)"), "(for i (: 1 3) (print i))");
    assert_eq!(parsed(&mut h, "next"), "(next)");
    assert_eq!(parsed(&mut h, "break"), "(break)");
    // dangling else binds to the nearest if
    assert_eq!(
        parsed(&mut h, "if (a) if (b) 1 else 2"),
        "(if a (if b 1 2))"
    );
}

#[test]
fn test_if_else_across_newline() {
    let mut h = heap();
    assert_eq!(parsed(&mut h, "if (a) 1\nelse 2"), "(if a 1 2)");
    assert_eq!(parsed(&mut h, "if (a) 1\n\n  else 2"), "(if a 1 2)");
}

#[test]
fn test_if_else_inside_open_brackets() {
    let mut h = heap();
    // the else terminates the pending if body, so the later newline is
    // back inside an ordinary open call and gets eaten
    assert_eq!(
        parsed(&mut h, "f(if (a) 1 else 2\n+ 3)"),
        "(f (if a 1 (+ 2 3)))"
    );
    assert_eq!(
        parsed(&mut h, "f((if (a) 1 else 2)\n+ 3)"),
        "(f (+ (( (if a 1 2)) 3))"
    );
    assert_eq!(
        parsed(&mut h, "x[if (a) 1 else 2\n, 2]"),
        "([ x (if a 1 2) 2)"
    );
    // an if body ended by a comma cleans up the same way
    assert_eq!(
        parsed(&mut h, "f(if (a) 1, b\n+ 2)"),
        "(f (if a 1) (+ b 2))"
    );
}

#[test]
fn test_blocks_and_newlines() {
    let mut h = heap();
    assert_eq!(parsed(&mut h, "{ }"), "({)");
    assert_eq!(parsed(&mut h, "{ a }"), "({ a)");
    assert_eq!(parsed(&mut h, "{\n a\n b\n}"), "({ a b)");
    assert_eq!(parsed(&mut h, "{ a; b }"), "({ a b)");
    assert_eq!(parsed(&mut h, "x +\n y"), "(+ x y)");
    assert_eq!(parsed(&mut h, "f(a,\n b)"), "(f a b)");
    assert_eq!(parsed(&mut h, "x[\n i\n]"), "([ x i)");
    assert_eq!(parsed(&mut h, "function(x)\n x"), "(function (x=) x NULL)");
}

#[test]
fn test_parens_are_calls() {
    let mut h = heap();
    assert_eq!(parsed(&mut h, "(x)"), "(( x)");
    assert_eq!(parsed(&mut h, "(1 + 2) * 3"), "(* (( (+ 1 2)) 3)");
}

#[test]
fn test_help_operator() {
    let mut h = heap();
    assert_eq!(parsed(&mut h, "?mean"), "(? mean)");
    assert_eq!(parsed(&mut h, "a ? b"), "(? a b)");
}

#[test]
fn test_multiple_statements() {
    let mut h = heap();
    let exprs = parse_text(&mut h, "a\nb; c").unwrap();
    assert_eq!(h.kind(exprs), Kind::Expr);
    assert_eq!(h.length(exprs), 3);
    assert_eq!(common::lisp(&h, h.elt(exprs, 0)), "a");
    assert_eq!(common::lisp(&h, h.elt(exprs, 2)), "c");
}

#[test]
fn test_empty_input_is_nil() {
    let mut h = heap();
    let exprs = parse_text(&mut h, "").unwrap();
    assert!(exprs.is_nil());
    let exprs = parse_text(&mut h, "\n\n").unwrap();
    assert!(exprs.is_nil());
}

#[test]
fn test_parse_one_statuses() {
    let mut h = heap();
    let (status, v) = parse_one(
        &mut h,
        ParseInput::from_text("1 + 2\n"),
        ParseOptions::default(),
    )
    .unwrap();
    assert_eq!(status, ParseStatus::Ok);
    assert_eq!(common::lisp(&h, v), "(+ 1 2)");

    let (status, _) = parse_one(&mut h, ParseInput::from_text("\n"), ParseOptions::default())
        .unwrap();
    assert_eq!(status, ParseStatus::Null);

    let (status, _) = parse_one(&mut h, ParseInput::from_text(""), ParseOptions::default())
        .unwrap();
    assert_eq!(status, ParseStatus::Eof);

    let (status, _) = parse_one(
        &mut h,
        ParseInput::from_text("1 +"),
        ParseOptions::default(),
    )
    .unwrap();
    assert_eq!(status, ParseStatus::Incomplete);

    let (status, _) = parse_one(
        &mut h,
        ParseInput::from_text("f(1, \n"),
        ParseOptions::default(),
    )
    .unwrap();
    assert_eq!(status, ParseStatus::Incomplete);
}

#[test]
fn test_unexpected_token_errors() {
    let mut h = heap();
    let err = parse_text(&mut h, ")").unwrap_err();
    assert_eq!(err.subclass, "unexpectedInput");
    let err = parse_text(&mut h, "x y").unwrap_err();
    assert_eq!(err.subclass, "unexpectedSymbol");
    let err = parse_text(&mut h, "1 2").unwrap_err();
    assert_eq!(err.subclass, "unexpectedNumber");
    let err = parse_text(&mut h, "a \"b\"").unwrap_err();
    assert_eq!(err.subclass, "unexpectedString");
    let err = parse_text(&mut h, "f(1,\n= 2)").unwrap_err();
    assert_eq!(err.subclass, "unexpectedAssignment");
    let err = parse_text(&mut h, "1 +").unwrap_err();
    assert_eq!(err.subclass, "unexpectedEndOfInput");
}

#[test]
fn test_console_input_stops_at_statement_end() {
    use std::cell::Cell;
    use std::rc::Rc;

    let mut h = heap();
    let served = Rc::new(Cell::new(0u32));
    let counter = served.clone();
    let input = ParseInput::from_console(Box::new(move |_prompt| {
        counter.set(counter.get() + 1);
        Some("1 + 2".to_string())
    }));
    let (status, v) = parse_one(&mut h, input, ParseOptions::default()).unwrap();
    assert_eq!(status, ParseStatus::Ok);
    assert_eq!(common::lisp(&h, v), "(+ 1 2)");
    // the statement was accepted at its own newline: no extra line reads
    assert_eq!(served.get(), 1);
}

#[test]
fn test_line_vector_input() {
    let mut h = heap();
    let lines = vec!["x <- function(a)".to_string(), "  a * 2".to_string()];
    let exprs = rye_par::parse_many(
        &mut h,
        ParseInput::from_lines(&lines),
        None,
        ParseOptions::default(),
    )
    .unwrap();
    assert_eq!(h.length(exprs), 1);
    assert_eq!(
        common::lisp(&h, h.elt(exprs, 0)),
        "(<- x (function (a=) (* a 2) NULL))"
    );
}
