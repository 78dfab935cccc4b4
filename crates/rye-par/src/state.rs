//! Per-parse mutable state.
//!
//! A `ParseState` carries the options, the monotone id counter, the
//! parse-data records, the collected source references and the precious
//! multi-set that roots every value the parser has built but not yet
//! connected to the final expression. A parse triggered from inside
//! another one gets a state (and parser) of its own, stacked on the call
//! stack; finalizing releases the multi-set and throws oversized buffers
//! away rather than reusing them.

use rye_gc::{Heap, Value};
use rye_lex::{Position, SrcSpan, TokenKind};

/// Above this many parse-data records the buffers are dropped outright
/// at finalization instead of being kept for reuse.
pub const MAX_DATA_COUNT: usize = 16_384;

/// Options accepted by the parse entry points.
#[derive(Clone, Debug)]
pub struct ParseOptions {
    /// Build the expression graph (off for syntax-only checking).
    pub generate_code: bool,
    /// Record source references on statements and function definitions.
    pub keep_src_refs: bool,
    /// Record the token/parent table exposed through the parse data.
    pub keep_parse_data: bool,
    /// Source name used in conditions and the srcfile environment.
    pub src_file: Option<String>,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            generate_code: true,
            keep_src_refs: false,
            keep_parse_data: false,
            src_file: None,
        }
    }
}

impl ParseOptions {
    /// Options for source-faithful parsing (srcrefs + parse data).
    pub fn with_source(file: impl Into<String>) -> Self {
        Self {
            generate_code: true,
            keep_src_refs: true,
            keep_parse_data: true,
            src_file: Some(file.into()),
        }
    }
}

/// What a parse-data row describes.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub(crate) enum RecKind {
    Terminal(TokenKind),
    /// A reduced expression nonterminal.
    Expr,
}

impl RecKind {
    pub fn code(self) -> i32 {
        match self {
            RecKind::Terminal(k) => k.code(),
            RecKind::Expr => 77,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            RecKind::Terminal(k) => k.name(),
            RecKind::Expr => "expr",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, RecKind::Terminal(_))
    }
}

/// One parse-data row.
#[derive(Clone, Debug)]
pub(crate) struct DataRecord {
    pub first: Position,
    pub last: Position,
    pub kind: RecKind,
    pub id: i32,
    pub parent: i32,
    pub text: String,
}

/// Outcome of parsing one statement.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ParseStatus {
    /// A complete expression was read.
    Ok,
    /// An empty line.
    Null,
    /// More input is needed to finish the expression.
    Incomplete,
    /// End of the input stream.
    Eof,
    /// A syntax error (details in the returned condition).
    Error,
}

/// Mutable state of one parse.
pub(crate) struct ParseState {
    pub options: ParseOptions,
    pub records: Vec<DataRecord>,
    pub next_id: i32,
    pub srcrefs: Vec<Value>,
    /// The srcfile environment shared by this parse's srcrefs.
    pub srcfile: Value,
    /// Precious multi-set rooting the parser's working values.
    pub mset: Value,
    finalized: bool,
}

impl ParseState {
    pub fn new(heap: &mut Heap, options: ParseOptions) -> rye_gc::Result<Self> {
        let mset = heap.new_precious_mset(64)?;
        Ok(Self {
            options,
            records: Vec::new(),
            next_id: 0,
            srcrefs: Vec::new(),
            srcfile: Value::NIL,
            mset,
            finalized: false,
        })
    }

    /// Source name for conditions.
    pub fn filename(&self) -> &str {
        self.options.src_file.as_deref().unwrap_or("<text>")
    }

    /// Root a freshly built value for the rest of this parse.
    pub fn preserve(&mut self, heap: &mut Heap, v: Value) -> rye_gc::Result<()> {
        if !v.is_nil() {
            heap.preserve_in_mset(self.mset, v)?;
        }
        Ok(())
    }

    /// Drop one root for a value that is now reachable from the result.
    pub fn release(&mut self, heap: &mut Heap, v: Value) {
        if !v.is_nil() {
            heap.release_from_mset(self.mset, v);
        }
    }

    /// Record a terminal row; returns its record index.
    pub fn record_token(
        &mut self,
        kind: TokenKind,
        span: SrcSpan,
        text: &str,
    ) -> Option<usize> {
        if !self.options.keep_parse_data {
            return None;
        }
        self.next_id += 1;
        self.records.push(DataRecord {
            first: span.first,
            last: span.last,
            kind: RecKind::Terminal(kind),
            id: self.next_id,
            parent: 0,
            text: text.to_string(),
        });
        Some(self.records.len() - 1)
    }

    /// Record an expression row and reparent the given child rows.
    pub fn record_expr(&mut self, span: SrcSpan, children: &[usize]) -> Option<usize> {
        if !self.options.keep_parse_data {
            return None;
        }
        self.next_id += 1;
        let id = self.next_id;
        self.records.push(DataRecord {
            first: span.first,
            last: span.last,
            kind: RecKind::Expr,
            id,
            parent: 0,
            text: String::new(),
        });
        for &c in children {
            self.records[c].parent = id;
        }
        Some(self.records.len() - 1)
    }

    /// Rewrite the token kind of a recorded terminal (the retagged
    /// symbol/equals variants of the parse data).
    pub fn retag(&mut self, record: Option<usize>, kind: TokenKind) {
        if let Some(idx) = record {
            if let Some(rec) = self.records.get_mut(idx) {
                if rec.kind.is_terminal() {
                    rec.kind = RecKind::Terminal(kind);
                }
            }
        }
    }

    /// Release the multi-set and drop oversized buffers.
    pub fn finalize(&mut self, heap: &mut Heap) {
        if self.finalized {
            return;
        }
        self.finalized = true;
        heap.release_mset(self.mset);
        self.mset = Value::NIL;
        self.srcrefs.clear();
        self.srcfile = Value::NIL;
        if self.records.len() > MAX_DATA_COUNT {
            // give the memory back instead of caching an outsized buffer
            self.records = Vec::new();
        }
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }
}

/// Driver-facing result of one statement parse.
pub(crate) struct Statement {
    pub status: ParseStatus,
    pub value: Value,
    pub span: SrcSpan,
}

impl Statement {
    pub fn empty(status: ParseStatus) -> Self {
        Self {
            status,
            value: Value::NIL,
            span: SrcSpan::default(),
        }
    }
}
