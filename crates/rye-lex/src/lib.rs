//! rye-lex - lexical analysis for the rye runtime's parser.
//!
//! Transforms a character stream into the parser's terminal alphabet:
//! numeric and string literals (classic and raw), identifiers and
//! keywords, the full operator set (including `|>`, `=>`, `%...%` and the
//! namespace and assignment operators), significant newlines, comments
//! and `#line` directives.
//!
//! Input is an abstract byte stream ([`input::ParseInput`]): in-memory
//! text, a line vector, any reader or an interactive console callback.
//! The cursor layers UTF-8 decoding, CR/LF normalization, a 16-character
//! pushback ring and line/column/byte/parse position tracking on top.
//!
//! The lexer itself is direct-coded: one function per token family,
//! dispatched on the first character. Tokens carry their source span and
//! cooked payload; heap values are built later by the parser, which owns
//! the rooting discipline.
//!
//! ```
//! use rye_lex::{input::ParseInput, Lexer, TokenKind};
//!
//! let mut lexer = Lexer::new(ParseInput::from_text("x <- 1"));
//! let t = lexer.next_token().unwrap();
//! assert_eq!(t.kind, TokenKind::Symbol);
//! let t = lexer.next_token().unwrap();
//! assert_eq!(t.kind, TokenKind::LeftAssign);
//! let t = lexer.next_token().unwrap();
//! assert_eq!(t.kind, TokenKind::NumConst);
//! // the input layer terminates the buffer with a newline
//! assert_eq!(lexer.next_token().unwrap().kind, TokenKind::Newline);
//! assert_eq!(lexer.next_token().unwrap().kind, TokenKind::EndOfInput);
//! ```

pub mod cursor;
pub mod error;
pub mod input;
pub mod lexer;
pub mod token;

pub use cursor::PUSHBACK_BUFSIZE;
pub use error::{LexError, LexErrorKind, Result};
pub use lexer::Lexer;
pub use token::{NumValue, Position, SrcSpan, Token, TokenKind, TokenValue};

/// Tokenize a whole string (testing convenience; the parser drives the
/// lexer token by token instead).
pub fn tokenize(text: &str) -> Result<Vec<Token>> {
    let mut lexer = Lexer::new(input::ParseInput::from_text(text));
    let mut tokens = Vec::new();
    loop {
        let token = lexer.next_token()?;
        let done = token.kind == TokenKind::EndOfInput;
        tokens.push(token);
        if done {
            return Ok(tokens);
        }
    }
}
