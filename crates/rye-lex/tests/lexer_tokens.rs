//! Token-level lexer tests.

use rye_lex::{tokenize, LexErrorKind, NumValue, TokenKind, TokenValue};

fn kinds(text: &str) -> Vec<TokenKind> {
    tokenize(text).unwrap().into_iter().map(|t| t.kind).collect()
}

#[test]
fn test_simple_assignment() {
    assert_eq!(
        kinds("x <- 1"),
        vec![
            TokenKind::Symbol,
            TokenKind::LeftAssign,
            TokenKind::NumConst,
            TokenKind::Newline,
            TokenKind::EndOfInput
        ]
    );
}

#[test]
fn test_operator_disambiguation() {
    assert_eq!(
        kinds("a<-b<<-c->d->>e"),
        vec![
            TokenKind::Symbol,
            TokenKind::LeftAssign,
            TokenKind::Symbol,
            TokenKind::SuperAssign,
            TokenKind::Symbol,
            TokenKind::RightAssign,
            TokenKind::Symbol,
            TokenKind::SuperRightAssign,
            TokenKind::Symbol,
            TokenKind::Newline,
            TokenKind::EndOfInput
        ]
    );
    assert_eq!(
        kinds("a < -b"),
        vec![
            TokenKind::Symbol,
            TokenKind::Lt,
            TokenKind::Minus,
            TokenKind::Symbol,
            TokenKind::Newline,
            TokenKind::EndOfInput
        ]
    );
}

#[test]
fn test_pipe_tokens() {
    assert_eq!(
        kinds("x |> f() || y | z => w"),
        vec![
            TokenKind::Symbol,
            TokenKind::Pipe,
            TokenKind::Symbol,
            TokenKind::LParen,
            TokenKind::RParen,
            TokenKind::Or2,
            TokenKind::Symbol,
            TokenKind::Or,
            TokenKind::Symbol,
            TokenKind::PipeBind,
            TokenKind::Symbol,
            TokenKind::Newline,
            TokenKind::EndOfInput
        ]
    );
}

#[test]
fn test_namespace_and_colon_assign() {
    assert_eq!(
        kinds("a::b:::c := d:e"),
        vec![
            TokenKind::Symbol,
            TokenKind::NsGet,
            TokenKind::Symbol,
            TokenKind::NsGetInt,
            TokenKind::Symbol,
            TokenKind::LeftAssign,
            TokenKind::Symbol,
            TokenKind::Colon,
            TokenKind::Symbol,
            TokenKind::Newline,
            TokenKind::EndOfInput
        ]
    );
    let toks = tokenize("a := 1").unwrap();
    assert_eq!(toks[1].kind, TokenKind::LeftAssign);
    assert_eq!(toks[1].name(), ":=");
}

#[test]
fn test_special_operator() {
    let toks = tokenize("a %in% b %% c").unwrap();
    assert_eq!(toks[1].kind, TokenKind::Special);
    assert_eq!(toks[1].text, "%in%");
    assert_eq!(toks[3].kind, TokenKind::Special);
    assert_eq!(toks[3].text, "%%");
}

#[test]
fn test_keywords_and_constants() {
    assert_eq!(
        kinds("function(x) if (TRUE) NULL else NA"),
        vec![
            TokenKind::Function,
            TokenKind::LParen,
            TokenKind::Symbol,
            TokenKind::RParen,
            TokenKind::If,
            TokenKind::LParen,
            TokenKind::NumConst,
            TokenKind::RParen,
            TokenKind::NullConst,
            TokenKind::Else,
            TokenKind::NumConst,
            TokenKind::Newline,
            TokenKind::EndOfInput
        ]
    );
    let toks = tokenize("NA_integer_ NA_real_ NA_character_ Inf NaN").unwrap();
    let values: Vec<_> = toks
        .iter()
        .filter_map(|t| match t.value {
            TokenValue::Num(v) => Some(v),
            _ => None,
        })
        .collect();
    assert_eq!(
        values,
        vec![
            NumValue::NaInt,
            NumValue::NaReal,
            NumValue::NaChar,
            NumValue::Inf,
            NumValue::NaN
        ]
    );
}

#[test]
fn test_placeholder_token() {
    let toks = tokenize("f(_, x_1)").unwrap();
    assert_eq!(toks[2].kind, TokenKind::Placeholder);
    assert_eq!(toks[4].kind, TokenKind::Symbol);
    assert_eq!(toks[4].text, "x_1");
}

#[test]
fn test_numbers() {
    let toks = tokenize("1 2.5 1e3 0xff 3L 2i 0x1p4 .5").unwrap();
    let nums: Vec<_> = toks
        .iter()
        .filter_map(|t| match t.value {
            TokenValue::Num(v) => Some(v),
            _ => None,
        })
        .collect();
    assert_eq!(
        nums,
        vec![
            NumValue::Real(1.0),
            NumValue::Real(2.5),
            NumValue::Real(1000.0),
            NumValue::Real(255.0),
            NumValue::Int(3),
            NumValue::Imaginary(2.0),
            NumValue::Real(16.0),
            NumValue::Real(0.5),
        ]
    );
}

#[test]
fn test_hex_float_with_fraction() {
    let toks = tokenize("0x1.8p1").unwrap();
    assert_eq!(toks[0].kind, TokenKind::NumConst);
    match toks[0].value {
        TokenValue::Num(NumValue::Real(v)) => assert_eq!(v, 3.0),
        ref other => panic!("unexpected value {:?}", other),
    }
}

#[test]
fn test_integer_literal_with_decimal_warns() {
    let mut lexer = rye_lex::Lexer::new(rye_lex::input::ParseInput::from_text("1.5L"));
    let t = lexer.next_token().unwrap();
    assert_eq!(t.kind, TokenKind::NumConst);
    match t.value {
        TokenValue::Num(NumValue::Real(v)) => assert_eq!(v, 1.5),
        ref other => panic!("unexpected value {:?}", other),
    }
    assert_eq!(lexer.warnings.len(), 1);
    assert!(lexer.warnings[0].contains("contains decimal"));
}

#[test]
fn test_string_escapes() {
    let toks = tokenize(r#""a\tb\n" '\x41' "é" "\101""#).unwrap();
    let strs: Vec<_> = toks
        .iter()
        .filter_map(|t| match &t.value {
            TokenValue::Str(s) => Some(s.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(strs, vec!["a\tb\n", "A", "é", "A"]);
}

#[test]
fn test_unicode_brace_escape() {
    let toks = tokenize(r#""\u{e9}""#).unwrap();
    match &toks[0].value {
        TokenValue::Str(s) => assert_eq!(s, "é"),
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_string_continues_over_newline() {
    let toks = tokenize("\"ab\ncd\"").unwrap();
    match &toks[0].value {
        TokenValue::Str(s) => assert_eq!(s, "ab\ncd"),
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_mixed_escapes_rejected() {
    let err = tokenize(r#""\ue9\x41""#).unwrap_err();
    assert_eq!(err.kind, LexErrorKind::MixedEscapes);
}

#[test]
fn test_nul_rejected() {
    let err = tokenize(r#""\x00""#).unwrap_err();
    assert_eq!(err.kind, LexErrorKind::NulNotAllowed);
}

#[test]
fn test_unrecognized_escape() {
    let err = tokenize(r#""\q""#).unwrap_err();
    assert_eq!(err.kind, LexErrorKind::UnrecognizedEscape { escape: 'q' });
}

#[test]
fn test_bidi_rejected() {
    let err = tokenize("\"a\u{202E}b\"").unwrap_err();
    assert!(matches!(err.kind, LexErrorKind::BidiNotAllowed { .. }));
}

#[test]
fn test_raw_strings() {
    let toks = tokenize(r#"r"(a\b)""#).unwrap();
    match &toks[0].value {
        TokenValue::Str(s) => assert_eq!(s, "a\\b"),
        other => panic!("unexpected {:?}", other),
    }

    let toks = tokenize(r#"R"--[x]"] ]--""#).unwrap();
    match &toks[0].value {
        TokenValue::Str(s) => assert_eq!(s, "x]\"] "),
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_raw_string_pipe_delimiter() {
    let toks = tokenize(r#"r"|a(b]c|""#).unwrap();
    match &toks[0].value {
        TokenValue::Str(s) => assert_eq!(s, "a(b]c"),
        other => panic!("unexpected {:?}", other),
    }

    // dashes participate in the self-matching pair too
    let toks = tokenize(r#"R'-|x|y|-'"#).unwrap();
    match &toks[0].value {
        TokenValue::Str(s) => assert_eq!(s, "x|y"),
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_raw_string_wrong_delimiter_is_content() {
    let toks = tokenize(r#"r"(a)b)""#).unwrap();
    match &toks[0].value {
        TokenValue::Str(s) => assert_eq!(s, "a)b"),
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_backtick_symbol() {
    let toks = tokenize("`a b`").unwrap();
    assert_eq!(toks[0].kind, TokenKind::Symbol);
    assert_eq!(toks[0].name(), "a b");
}

#[test]
fn test_unicode_escape_in_backticks_rejected() {
    let err = tokenize(r"`\u0041`").unwrap_err();
    assert_eq!(err.kind, LexErrorKind::UnicodeInBackticks);
}

#[test]
fn test_incomplete_string_is_distinguishable() {
    let err = tokenize("\"abc").unwrap_err();
    assert!(err.is_incomplete());
}

#[test]
fn test_comments_and_line_directives() {
    let toks = tokenize("x # trailing\n#line 10 \"gen.ry\"\ny").unwrap();
    let kinds: Vec<_> = toks.iter().map(|t| t.kind).collect();
    assert_eq!(
        kinds,
        vec![
            TokenKind::Symbol,
            TokenKind::Comment,
            TokenKind::Newline,
            TokenKind::LineDirective,
            TokenKind::Newline,
            TokenKind::Symbol,
            TokenKind::Newline,
            TokenKind::EndOfInput
        ]
    );
    // the directive applies to the following line
    let y = &toks[5];
    assert_eq!(y.span.first.line, 10);
    assert_eq!(y.span.first.parse, 3);
}

#[test]
fn test_spans_match_spec_layout() {
    // "1 + 2": the whole expression spans bytes [0, 5) on line 1
    let toks = tokenize("1 + 2").unwrap();
    assert_eq!(toks[0].span.first.byte, 0);
    assert_eq!(toks[0].span.last.byte, 1);
    assert_eq!(toks[2].span.first.byte, 4);
    assert_eq!(toks[2].span.last.byte, 5);
    assert_eq!(toks[0].span.first.line, 1);
    assert_eq!(toks[2].span.last.col, 5);
}

#[test]
fn test_double_star_is_caret() {
    let toks = tokenize("a ** b").unwrap();
    assert_eq!(toks[1].kind, TokenKind::Caret);
    assert_eq!(toks[1].name(), "^");
}
