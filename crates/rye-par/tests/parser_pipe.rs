//! Pipe operator placement and placeholder rules.

mod common;

use common::{heap, parsed};
use rye_par::parse_text;

#[test]
fn test_pipe_inserts_first_argument() {
    let mut h = heap();
    assert_eq!(parsed(&mut h, "x |> sum()"), "(sum x)");
    assert_eq!(parsed(&mut h, "x |> f(y)"), "(f x y)");
    assert_eq!(parsed(&mut h, "x |> f(a = 1)"), "(f x a=1)");
    // pipes chain left to right
    assert_eq!(parsed(&mut h, "x |> f() |> g(2)"), "(g (f x) 2)");
    // the pipe sits on the special-operator level, tighter than `+`
    assert_eq!(parsed(&mut h, "1 + 2 |> f()"), "(+ 1 (f 2))");
}

#[test]
fn test_named_placeholder_substitution() {
    let mut h = heap();
    assert_eq!(parsed(&mut h, "x |> mean(trim = _)"), "(mean trim=x)");
    assert_eq!(parsed(&mut h, "x |> f(1, y = _)"), "(f 1 y=x)");
}

#[test]
fn test_placeholder_in_extractor_chain() {
    let mut h = heap();
    assert_eq!(parsed(&mut h, "x |> _$a"), "($ x a)");
    assert_eq!(parsed(&mut h, "x |> _$a$b"), "($ ($ x a) b)");
    assert_eq!(parsed(&mut h, "x |> _[[1]]"), "([[ x 1)");
    assert_eq!(parsed(&mut h, "x |> _[i]"), "([ x i)");
    assert_eq!(parsed(&mut h, "x |> _@slot"), "(@ x slot)");
}

#[test]
fn test_unnamed_placeholder_rejected() {
    let mut h = heap();
    let err = parse_text(&mut h, "a |> f(_)").unwrap_err();
    assert_eq!(err.subclass, "placeholderNotNamed");
}

#[test]
fn test_multiple_placeholders_rejected() {
    let mut h = heap();
    let err = parse_text(&mut h, "a |> f(_, _)").unwrap_err();
    assert_eq!(err.subclass, "tooManyPlaceholders");
    let err = parse_text(&mut h, "a |> f(x = _, y = _)").unwrap_err();
    assert_eq!(err.subclass, "tooManyPlaceholders");
    let err = parse_text(&mut h, "a |> _$k(x = _)").unwrap_err();
    assert_eq!(err.subclass, "tooManyPlaceholders");
}

#[test]
fn test_rhs_must_be_call() {
    let mut h = heap();
    let err = parse_text(&mut h, "1 |> x").unwrap_err();
    assert_eq!(err.subclass, "RHSnotFnCall");
    let err = parse_text(&mut h, "1 |> 2").unwrap_err();
    assert_eq!(err.subclass, "RHSnotFnCall");
}

#[test]
fn test_placeholder_as_function_rejected() {
    let mut h = heap();
    let err = parse_text(&mut h, "a |> _(1)").unwrap_err();
    assert_eq!(err.subclass, "placeholderInRHSFn");
}

#[test]
fn test_special_forms_rejected_in_rhs() {
    let mut h = heap();
    let err = parse_text(&mut h, "1 |> (x)").unwrap_err();
    assert_eq!(err.subclass, "unsupportedInPipe");
    let err = parse_text(&mut h, "a |> `&&`(b)").unwrap_err();
    assert_eq!(err.subclass, "unsupportedInPipe");
}

#[test]
fn test_stray_placeholder_rejected() {
    let mut h = heap();
    let err = parse_text(&mut h, "_").unwrap_err();
    assert_eq!(err.subclass, "invalidPlaceholder");
    let err = parse_text(&mut h, "f(_)").unwrap_err();
    assert_eq!(err.subclass, "invalidPlaceholder");
    let err = parse_text(&mut h, "x <- _").unwrap_err();
    assert_eq!(err.subclass, "invalidPlaceholder");
}

#[test]
fn test_pipebind_disabled_by_default() {
    // `_R_USE_PIPEBIND_` is unset in the test environment
    let mut h = heap();
    let err = parse_text(&mut h, "x => x + 1").unwrap_err();
    assert_eq!(err.subclass, "pipebindDisabled");
    let err = parse_text(&mut h, "x |> y => y + 1").unwrap_err();
    assert_eq!(err.subclass, "pipebindDisabled");
}
