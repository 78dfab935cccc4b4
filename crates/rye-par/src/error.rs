//! Structured parse conditions.
//!
//! Errors are condition values with a class (`parseError` or `lexError`),
//! a subclass naming the precise failure, the source location and a
//! human-readable message. The REPL shows the message; tools dispatch on
//! the subclass.

use rye_lex::{LexError, Position};
use thiserror::Error;

/// Condition class.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ErrorClass {
    Parse,
    Lex,
    /// Heap exhaustion and interrupts surfacing through the parser.
    Runtime,
}

impl ErrorClass {
    pub fn name(self) -> &'static str {
        match self {
            ErrorClass::Parse => "parseError",
            ErrorClass::Lex => "lexError",
            ErrorClass::Runtime => "error",
        }
    }
}

/// Parse-level condition subclasses.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ParseSubclass {
    RhsNotFnCall,
    NotASymbol,
    PlaceholderInRhsFn,
    TooManyPlaceholders,
    PlaceholderNotNamed,
    UnsupportedInPipe,
    PipebindDisabled,
    RepeatedFormal,
    InvalidPlaceholder,
    InvalidPipeBind,
    UnexpectedInput,
    UnexpectedEndOfInput,
    UnexpectedString,
    UnexpectedNumber,
    UnexpectedSymbol,
    UnexpectedAssignment,
    UnexpectedEndOfLine,
    BadTagType,
    ContextStackOverflow,
    Interrupted,
}

impl ParseSubclass {
    pub fn name(self) -> &'static str {
        use ParseSubclass::*;
        match self {
            RhsNotFnCall => "RHSnotFnCall",
            NotASymbol => "notASymbol",
            PlaceholderInRhsFn => "placeholderInRHSFn",
            TooManyPlaceholders => "tooManyPlaceholders",
            PlaceholderNotNamed => "placeholderNotNamed",
            UnsupportedInPipe => "unsupportedInPipe",
            PipebindDisabled => "pipebindDisabled",
            RepeatedFormal => "repeatedFormal",
            InvalidPlaceholder => "invalidPlaceholder",
            InvalidPipeBind => "invalidPipeBind",
            UnexpectedInput => "unexpectedInput",
            UnexpectedEndOfInput => "unexpectedEndOfInput",
            UnexpectedString => "unexpectedString",
            UnexpectedNumber => "unexpectedNumber",
            UnexpectedSymbol => "unexpectedSymbol",
            UnexpectedAssignment => "unexpectedAssignment",
            UnexpectedEndOfLine => "unexpectedEndOfLine",
            BadTagType => "badTagType",
            ContextStackOverflow => "contextstackOverflow",
            Interrupted => "interrupted",
        }
    }
}

/// A parse or lex condition with its source location.
#[derive(Debug, Clone, Error)]
#[error("{message} (line {line})")]
pub struct ParseError {
    pub class: ErrorClass,
    pub subclass: &'static str,
    pub message: String,
    pub filename: String,
    pub line: u32,
    pub col: u32,
}

impl ParseError {
    pub fn new(
        subclass: ParseSubclass,
        message: impl Into<String>,
        filename: &str,
        pos: Position,
    ) -> Self {
        Self {
            class: ErrorClass::Parse,
            subclass: subclass.name(),
            message: message.into(),
            filename: filename.to_string(),
            line: pos.line,
            col: pos.col,
        }
    }

    pub fn from_lex(err: LexError, filename: &str) -> Self {
        Self {
            class: ErrorClass::Lex,
            subclass: err.subclass(),
            message: err.kind.to_string(),
            filename: filename.to_string(),
            line: err.line,
            col: err.col,
        }
    }

    /// End-of-input conditions let interactive drivers re-prompt instead
    /// of reporting.
    pub fn is_incomplete(&self) -> bool {
        self.subclass == "unexpectedEndOfInput"
    }
}

/// Result type alias for parser operations.
pub type Result<T> = std::result::Result<T, ParseError>;
