//! Interned character cells and the symbol table.
//!
//! Character cells (`Char`) are immutable byte strings deduplicated through
//! a global cache keyed by content and declared encoding. Cached cells are
//! ordinary collectible nodes; the collector drops cache entries whose cell
//! did not survive the cycle, so the cache never keeps a string alive.
//!
//! Symbols are interned through the symbol table, which is a collector
//! root: an installed symbol is never reclaimed.

use crate::error::{GcError, Result};
use crate::heap::Heap;
use crate::object::header::gp;
use crate::object::Value;

/// Declared encoding of a character cell.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum CharEncoding {
    /// Native (unmarked) encoding; pure-ASCII strings normalize here.
    Native = 0,
    Utf8 = 1,
    Latin1 = 2,
    /// Uninterpreted bytes.
    Bytes = 3,
}

/// Cache key: declared encoding plus content bytes.
#[derive(PartialEq, Eq, Hash)]
pub(crate) struct CharKey {
    pub enc: CharEncoding,
    pub bytes: Box<[u8]>,
}

fn encoding_bits(enc: CharEncoding, ascii: bool) -> u16 {
    let mut bits = match enc {
        CharEncoding::Native => 0,
        CharEncoding::Utf8 => gp::UTF8,
        CharEncoding::Latin1 => gp::LATIN1,
        CharEncoding::Bytes => gp::BYTES,
    };
    if ascii {
        bits |= gp::ASCII;
    }
    bits
}

impl Heap {
    /// Intern a UTF-8 character cell.
    pub fn mk_char(&mut self, s: &str) -> Result<Value> {
        self.mk_char_enc(s.as_bytes(), CharEncoding::Utf8)
    }

    /// Intern a character cell with a declared encoding.
    ///
    /// Pure-ASCII content is normalized to the native encoding so that the
    /// same text interns to the same cell regardless of declaration.
    pub fn mk_char_enc(&mut self, bytes: &[u8], enc: CharEncoding) -> Result<Value> {
        let ascii = bytes.is_ascii();
        let enc = if ascii && enc != CharEncoding::Bytes {
            CharEncoding::Native
        } else {
            enc
        };
        let key = CharKey {
            enc,
            bytes: bytes.into(),
        };
        if let Some(&v) = self.char_cache.get(&key) {
            return Ok(v);
        }
        let v = self.alloc_char_uncached(bytes, encoding_bits(enc, ascii) | gp::CACHED)?;
        self.char_cache.insert(key, v);
        Ok(v)
    }

    /// One-element string vector holding the interned text.
    pub fn mk_string(&mut self, s: &str) -> Result<Value> {
        let c = self.mk_char(s)?;
        self.protect(c)?;
        let v = self.alloc_vector(crate::object::Kind::Str, 1);
        self.unprotect(1)?;
        let v = v?;
        self.set_str_elt(v, 0, c);
        Ok(v)
    }

    /// Declared encoding of a character cell.
    pub fn char_encoding(&self, c: Value) -> CharEncoding {
        let h = &self.node(c).header;
        if h.gp_is_set(gp::BYTES) {
            CharEncoding::Bytes
        } else if h.gp_is_set(gp::UTF8) {
            CharEncoding::Utf8
        } else if h.gp_is_set(gp::LATIN1) {
            CharEncoding::Latin1
        } else {
            CharEncoding::Native
        }
    }

    /// True for the NA character cell.
    pub fn is_na_string(&self, c: Value) -> bool {
        self.node(c).header.gp_is_set(gp::NA_STRING)
    }

    // === Symbols ===========================================================

    /// Intern a symbol, creating it on first use.
    ///
    /// # Errors
    /// `InvalidArgument` for the zero-length name, which is reserved for
    /// the missing-argument marker.
    pub fn install(&mut self, name: &str) -> Result<Value> {
        if let Some(&sym) = self.symbols.get(name) {
            return Ok(sym);
        }
        if name.is_empty() {
            return Err(GcError::InvalidArgument(
                "attempt to install a zero-length symbol name".to_string(),
            ));
        }
        let pname = self.mk_char(name)?;
        self.protect(pname)?;
        let sym = self.alloc_raw_symbol(pname);
        self.unprotect(1)?;
        let sym = sym?;
        if is_dd_name(name) {
            self.node_mut(sym).header.gp_set(gp::DDVAL);
        }
        self.symbols.insert(name.into(), sym);
        Ok(sym)
    }

    /// Look up a symbol without creating it.
    pub fn find_symbol(&self, name: &str) -> Option<Value> {
        self.symbols.get(name).copied()
    }

    /// True for `..1`, `..2`, ... symbols.
    pub fn is_dd_symbol(&self, sym: Value) -> bool {
        self.node(sym).header.gp_is_set(gp::DDVAL)
    }

    /// Number of installed symbols.
    pub fn symbol_count(&self) -> usize {
        self.symbols.len()
    }

    /// Number of live interned character cells.
    pub fn char_cache_size(&self) -> usize {
        self.char_cache.len()
    }
}

fn is_dd_name(name: &str) -> bool {
    name.strip_prefix("..")
        .is_some_and(|rest| !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_digit()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{GcConfig, Kind};

    fn heap() -> Heap {
        Heap::new(GcConfig::default()).expect("heap init")
    }

    #[test]
    fn test_mk_char_interns() {
        let mut heap = heap();
        let a = heap.mk_char("hello").unwrap();
        let b = heap.mk_char("hello").unwrap();
        let c = heap.mk_char("world").unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(heap.char_bytes(a), b"hello");
    }

    #[test]
    fn test_ascii_normalizes_across_encodings() {
        let mut heap = heap();
        let utf8 = heap.mk_char_enc(b"plain", CharEncoding::Utf8).unwrap();
        let latin = heap.mk_char_enc(b"plain", CharEncoding::Latin1).unwrap();
        assert_eq!(utf8, latin);
        assert_eq!(heap.char_encoding(utf8), CharEncoding::Native);
    }

    #[test]
    fn test_non_ascii_encodings_stay_distinct() {
        let mut heap = heap();
        let bytes = [0xC3, 0xA9]; // "e-acute" in UTF-8
        let utf8 = heap.mk_char_enc(&bytes, CharEncoding::Utf8).unwrap();
        let latin = heap.mk_char_enc(&bytes, CharEncoding::Latin1).unwrap();
        assert_ne!(utf8, latin);
        assert_eq!(heap.char_encoding(utf8), CharEncoding::Utf8);
        assert_eq!(heap.char_encoding(latin), CharEncoding::Latin1);
    }

    #[test]
    fn test_mk_string_wraps_char() {
        let mut heap = heap();
        let s = heap.mk_string("text").unwrap();
        assert_eq!(heap.kind(s), Kind::Str);
        assert_eq!(heap.length(s), 1);
        let c = heap.str_elt(s, 0);
        assert_eq!(heap.char_bytes(c), b"text");
    }

    #[test]
    fn test_install_interns_symbols() {
        let mut heap = heap();
        let a = heap.install("x").unwrap();
        let b = heap.install("x").unwrap();
        assert_eq!(a, b);
        assert_eq!(heap.symbol_name(a), "x");
        assert_eq!(heap.kind(a), Kind::Symbol);
        assert_eq!(heap.sym_value(a), heap.globals().unbound_value);
    }

    #[test]
    fn test_install_rejects_empty_name() {
        let mut heap = heap();
        assert!(heap.install("").is_err());
    }

    #[test]
    fn test_dd_symbols_are_flagged() {
        let mut heap = heap();
        let dd = heap.install("..3").unwrap();
        let plain = heap.install("..x").unwrap();
        assert!(heap.is_dd_symbol(dd));
        assert!(!heap.is_dd_symbol(plain));
    }

    #[test]
    fn test_na_string_is_not_cached() {
        let mut heap = heap();
        let na = heap.globals().na_string;
        assert!(heap.is_na_string(na));
        let other = heap.mk_char("NA").unwrap();
        assert_ne!(na, other);
        assert!(!heap.is_na_string(other));
    }
}
