//! Character-stream sources for the lexer.
//!
//! The parser reads from files, in-memory text, pre-split line vectors or
//! an interactive console callback; all of them are byte streams behind
//! [`ParseInput`]. Every source guarantees a terminating newline so the
//! final statement of an unterminated buffer still ends properly.
//! Decoding and position tracking happen in the cursor.

use std::io::Read;

/// Callback supplying one console line per request (the readline shape);
/// `None` means end of input.
pub type ConsoleReader<'a> = Box<dyn FnMut(&str) -> Option<String> + 'a>;

/// A byte source feeding the lexer.
pub enum ParseInput<'a> {
    /// An in-memory buffer.
    Text {
        bytes: &'a [u8],
        pos: usize,
        nl_sent: bool,
    },
    /// A vector of lines; a newline is emitted after each.
    Lines {
        lines: &'a [String],
        line: usize,
        pos: usize,
    },
    /// Any reader (files, pipes).
    Reader {
        reader: Box<dyn Read + 'a>,
        buf: Vec<u8>,
        pos: usize,
        eof: bool,
        last_byte: u8,
        nl_sent: bool,
    },
    /// An interactive console; lines are requested on demand.
    Console {
        read_line: ConsoleReader<'a>,
        prompt: String,
        buf: Vec<u8>,
        pos: usize,
        eof: bool,
    },
}

impl<'a> ParseInput<'a> {
    pub fn from_text(text: &'a str) -> Self {
        ParseInput::Text {
            bytes: text.as_bytes(),
            pos: 0,
            nl_sent: false,
        }
    }

    pub fn from_lines(lines: &'a [String]) -> Self {
        ParseInput::Lines {
            lines,
            line: 0,
            pos: 0,
        }
    }

    pub fn from_reader(reader: impl Read + 'a) -> Self {
        ParseInput::Reader {
            reader: Box::new(reader),
            buf: Vec::new(),
            pos: 0,
            eof: false,
            last_byte: b'\n',
            nl_sent: false,
        }
    }

    pub fn from_console(read_line: ConsoleReader<'a>) -> Self {
        ParseInput::Console {
            read_line,
            prompt: String::new(),
            buf: Vec::new(),
            pos: 0,
            eof: false,
        }
    }

    /// Set the prompt handed to the console callback (ignored elsewhere).
    pub fn set_prompt(&mut self, new_prompt: &str) {
        if let ParseInput::Console { prompt, .. } = self {
            prompt.clear();
            prompt.push_str(new_prompt);
        }
    }

    /// Next raw byte, or `None` at end of input.
    pub(crate) fn next_byte(&mut self) -> std::io::Result<Option<u8>> {
        match self {
            ParseInput::Text {
                bytes,
                pos,
                nl_sent,
            } => {
                if *pos < bytes.len() {
                    let b = bytes[*pos];
                    *pos += 1;
                    return Ok(Some(b));
                }
                if !*nl_sent && !bytes.is_empty() && bytes[bytes.len() - 1] != b'\n' {
                    *nl_sent = true;
                    return Ok(Some(b'\n'));
                }
                Ok(None)
            }
            ParseInput::Lines { lines, line, pos } => {
                if *line >= lines.len() {
                    return Ok(None);
                }
                let bytes = lines[*line].as_bytes();
                if *pos < bytes.len() {
                    let b = bytes[*pos];
                    *pos += 1;
                    return Ok(Some(b));
                }
                *line += 1;
                *pos = 0;
                Ok(Some(b'\n'))
            }
            ParseInput::Reader {
                reader,
                buf,
                pos,
                eof,
                last_byte,
                nl_sent,
            } => {
                if *pos >= buf.len() {
                    if !*eof {
                        buf.resize(4096, 0);
                        let n = reader.read(buf)?;
                        buf.truncate(n);
                        *pos = 0;
                        if n == 0 {
                            *eof = true;
                        }
                    }
                    if *eof {
                        if !*nl_sent && *last_byte != b'\n' {
                            *nl_sent = true;
                            return Ok(Some(b'\n'));
                        }
                        return Ok(None);
                    }
                }
                let b = buf[*pos];
                *pos += 1;
                *last_byte = b;
                Ok(Some(b))
            }
            ParseInput::Console {
                read_line,
                prompt,
                buf,
                pos,
                eof,
            } => {
                if *pos >= buf.len() {
                    if *eof {
                        return Ok(None);
                    }
                    match read_line(prompt) {
                        Some(line) => {
                            buf.clear();
                            buf.extend_from_slice(line.as_bytes());
                            if !line.ends_with('\n') {
                                buf.push(b'\n');
                            }
                            *pos = 0;
                        }
                        None => {
                            *eof = true;
                            return Ok(None);
                        }
                    }
                }
                let b = buf[*pos];
                *pos += 1;
                Ok(Some(b))
            }
        }
    }
}
