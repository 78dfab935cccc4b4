//! Comment capture and `#line` directives.

use crate::error::Result;
use crate::token::{Token, TokenKind, TokenValue};
use crate::Lexer;

impl<'a> Lexer<'a> {
    /// `#` to end of line. A comment whose `#` sits in column 1 and reads
    /// `#line NN ["file"]` is a line directive: it rewrites the reported
    /// line number (but never the physical parse counter) and the current
    /// source file name.
    pub(super) fn lex_comment(&mut self) -> Result<Token> {
        let at_line_start = self.token_start().col == 0;
        let mut text = String::from("#");
        loop {
            match self.cursor.getc()? {
                Some('\n') => {
                    self.cursor.ungetc('\n');
                    break;
                }
                Some(c) => text.push(c),
                None => break,
            }
        }
        if at_line_start {
            if let Some((line, file)) = parse_line_directive(&text) {
                self.cursor.set_next_line(line);
                if let Some(file) = file {
                    self.src_file = Some(file);
                }
                return Ok(self.finish(TokenKind::LineDirective, text, TokenValue::None));
            }
        }
        Ok(self.finish(TokenKind::Comment, text, TokenValue::None))
    }
}

/// Parse `#line NN ["file"]`; `None` when the comment is not a directive.
fn parse_line_directive(text: &str) -> Option<(u32, Option<String>)> {
    let rest = text.strip_prefix("#line")?;
    if !rest.starts_with([' ', '\t']) {
        return None;
    }
    let rest = rest.trim_start_matches([' ', '\t']);
    let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }
    let line: u32 = digits.parse().ok()?;
    let rest = rest[digits.len()..].trim_start_matches([' ', '\t']);
    let file = if let Some(stripped) = rest.strip_prefix('"') {
        stripped
            .find('"')
            .map(|end| stripped[..end].to_string())
    } else {
        None
    };
    Some((line, file))
}

#[cfg(test)]
mod tests {
    use super::parse_line_directive;

    #[test]
    fn test_plain_comment_is_not_a_directive() {
        assert_eq!(parse_line_directive("# hello"), None);
        assert_eq!(parse_line_directive("#lineage 3"), None);
    }

    #[test]
    fn test_directive_without_file() {
        assert_eq!(parse_line_directive("#line 42"), Some((42, None)));
    }

    #[test]
    fn test_directive_with_file() {
        assert_eq!(
            parse_line_directive("#line 7 \"script.ry\""),
            Some((7, Some("script.ry".to_string())))
        );
    }
}
