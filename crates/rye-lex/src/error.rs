//! Lexical error conditions.
//!
//! Every error carries the position where the offending text started so
//! the parser can build a structured condition value out of it.

use thiserror::Error;

/// What went wrong while scanning.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LexErrorKind {
    #[error("invalid multibyte character in input")]
    InvalidMbcs,
    #[error("nul character not allowed in character strings")]
    NulNotAllowed,
    #[error("'\\{escape}' is an unrecognized escape in character string")]
    UnrecognizedEscape { escape: char },
    #[error("invalid octal escape: exceeds \\377")]
    InvalidOctal,
    #[error("'\\x' used without hex digits in character string")]
    BadHex,
    #[error("'\\{escape}' used without hex digits in character string")]
    BadUnicodeHex { escape: char },
    #[error("invalid \\{escape} value {value:#x}")]
    InvalidUnicode { escape: char, value: u32 },
    #[error("invalid \\{escape} sequence: too many hex digits")]
    UnicodeTooLong { escape: char },
    #[error("mixing Unicode and octal/hex escapes in a character string is not allowed")]
    MixedEscapes,
    #[error("bidi formatting character not allowed ({codepoint:#x})")]
    BidiNotAllowed { codepoint: u32 },
    #[error("\\u sequences not supported inside backticks")]
    UnicodeInBackticks,
    #[error("malformed raw string literal")]
    InvalidRawLiteral,
    #[error("unexpected end of input inside {context}")]
    UnexpectedEof { context: &'static str },
    #[error("input read failed: {0}")]
    Io(String),
}

/// A lexical error at a source position (1-based line, 0-based column).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind} (line {line})")]
pub struct LexError {
    pub kind: LexErrorKind,
    pub line: u32,
    pub col: u32,
}

impl LexError {
    pub fn new(kind: LexErrorKind, line: u32, col: u32) -> Self {
        Self { kind, line, col }
    }

    /// Incomplete input (EOF inside a literal) is not a hard failure for
    /// interactive callers; the driver re-prompts instead of reporting.
    pub fn is_incomplete(&self) -> bool {
        matches!(self.kind, LexErrorKind::UnexpectedEof { .. })
    }

    /// Condition subclass name for structured error values.
    pub fn subclass(&self) -> &'static str {
        match self.kind {
            LexErrorKind::InvalidMbcs => "invalidMBCS",
            LexErrorKind::NulNotAllowed => "nulNotAllowed",
            LexErrorKind::UnrecognizedEscape { .. } => "unrecognizedEscape",
            LexErrorKind::InvalidOctal => "invalidOctal",
            LexErrorKind::BadHex => "badHex",
            LexErrorKind::BadUnicodeHex { .. } => "badUnicodeHex",
            LexErrorKind::InvalidUnicode { .. } => "invalidUnicode",
            LexErrorKind::UnicodeTooLong { .. } => "UnicodeTooLong",
            LexErrorKind::MixedEscapes => "mixedEscapes",
            LexErrorKind::BidiNotAllowed { .. } => "bidiNotAllowed",
            LexErrorKind::UnicodeInBackticks => "unicodeInBackticks",
            LexErrorKind::InvalidRawLiteral => "invalidRawLiteral",
            LexErrorKind::UnexpectedEof { .. } => "unexpectedEndOfInput",
            LexErrorKind::Io(_) => "inputError",
        }
    }
}

/// Result type alias for lexer operations.
pub type Result<T> = std::result::Result<T, LexError>;
