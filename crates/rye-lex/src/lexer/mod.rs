//! Lexer module.
//!
//! The implementation is split into focused pieces:
//! - `core` - the `Lexer` struct and token dispatch
//! - `number` - numeric literals (decimal, hex, hex-float, suffixes)
//! - `string` - quoted strings, raw strings and backtick names
//! - `identifier` - identifiers and the keyword table
//! - `operator` - operators and punctuation
//! - `comment` - comments and `#line` directives

mod comment;
mod core;
mod identifier;
mod number;
mod operator;
mod string;

pub use core::Lexer;
