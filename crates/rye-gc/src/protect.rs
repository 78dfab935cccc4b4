//! Roots the collector can see: the protect stack, the preserve list and
//! precious multi-sets.
//!
//! The protect stack roots values held only in native-frame locals across
//! allocations. The preserve list anchors long-lived values (optionally
//! behind a hashed index for near-constant deletion). Precious multi-sets
//! are heap-cell-backed bags used by callers, like the parser, that must
//! root many short-lived values without sharing the protect stack.

use rustc_hash::FxHashMap;

use crate::error::{GcError, Result};
use crate::heap::Heap;
use crate::object::{Kind, Value};

/// Capacity of the protect stack.
pub const PROTECT_STACK_SIZE: usize = 10_000;

/// Extra slots made available while an overflow is being reported.
pub const PROTECT_REDZONE: usize = 1_000;

/// Initial slot count of a precious multi-set.
pub const MSET_INITIAL_SIZE: usize = 32;

/// Global-root anchor for long-lived values.
///
/// The plain variant is a vector scanned linearly from the end on release
/// (cheap for stack-like usage); the hashed variant keeps per-value counts
/// so release does not degrade when thousands of values are preserved.
pub(crate) struct PreserveList {
    entries: Vec<Value>,
    index: Option<FxHashMap<Value, u32>>,
}

impl PreserveList {
    pub fn new(hashed: bool) -> Self {
        Self {
            entries: Vec::new(),
            index: hashed.then(FxHashMap::default),
        }
    }

    pub fn add(&mut self, v: Value) {
        if let Some(index) = &mut self.index {
            *index.entry(v).or_insert(0) += 1;
        } else {
            self.entries.push(v);
        }
    }

    /// Remove one occurrence; true when the value was present.
    pub fn remove(&mut self, v: Value) -> bool {
        if let Some(index) = &mut self.index {
            match index.get_mut(&v) {
                Some(n) if *n > 1 => {
                    *n -= 1;
                    true
                }
                Some(_) => {
                    index.remove(&v);
                    true
                }
                None => false,
            }
        } else if let Some(pos) = self.entries.iter().rposition(|&e| e == v) {
            self.entries.remove(pos);
            true
        } else {
            false
        }
    }

    pub fn roots(&self) -> Vec<Value> {
        if let Some(index) = &self.index {
            index.keys().copied().collect()
        } else {
            self.entries.clone()
        }
    }
}

impl Heap {
    // === Protect stack =====================================================

    /// Push a root for the duration of native-frame work.
    ///
    /// # Errors
    /// `ProtectStackOverflow` when the stack is full; the limit is raised by
    /// a red zone so the error can be reported and unwound, and restored
    /// once the stack drains below its normal capacity.
    pub fn protect(&mut self, v: Value) -> Result<()> {
        if self.protect.len() >= self.protect_limit {
            self.protect_limit = PROTECT_STACK_SIZE + PROTECT_REDZONE;
            return Err(GcError::ProtectStackOverflow);
        }
        self.protect.push(v);
        Ok(())
    }

    /// Push a root and return its slot for [`Heap::reprotect`].
    pub fn protect_with_index(&mut self, v: Value) -> Result<usize> {
        self.protect(v)?;
        Ok(self.protect.len() - 1)
    }

    /// Pop `n` roots.
    pub fn unprotect(&mut self, n: usize) -> Result<()> {
        let depth = self.protect.len();
        if n > depth {
            return Err(GcError::ProtectStackUnderflow {
                depth,
                requested: n,
            });
        }
        self.protect.truncate(depth - n);
        if self.protect.len() <= PROTECT_STACK_SIZE {
            self.protect_limit = PROTECT_STACK_SIZE;
        }
        Ok(())
    }

    /// Replace the root in slot `index`.
    pub fn reprotect(&mut self, v: Value, index: usize) -> Result<()> {
        match self.protect.get_mut(index) {
            Some(slot) => {
                *slot = v;
                Ok(())
            }
            None => Err(GcError::InvalidArgument(format!(
                "reprotect: slot {} is not protected",
                index
            ))),
        }
    }

    /// Current protect-stack depth.
    pub fn protect_depth(&self) -> usize {
        self.protect.len()
    }

    /// Run `f` with `roots` protected, popping them on every exit path.
    ///
    /// The scoped-root shape of the protect stack: `f` must leave the
    /// stack balanced with respect to its own pushes.
    pub fn protected<R>(
        &mut self,
        roots: &[Value],
        f: impl FnOnce(&mut Heap) -> Result<R>,
    ) -> Result<R> {
        for &v in roots {
            self.protect(v)?;
        }
        let result = f(self);
        self.unprotect(roots.len())?;
        result
    }

    // === Preserve list =====================================================

    /// Anchor a value for as long as the embedder needs it.
    pub fn preserve_object(&mut self, v: Value) {
        if !v.is_nil() {
            self.preserve.add(v);
        }
    }

    /// Drop one anchor for the value.
    pub fn release_object(&mut self, v: Value) {
        if !v.is_nil() && !self.preserve.remove(v) {
            log::warn!("release_object: value was not preserved");
        }
    }

    // === Precious multi-sets ===============================================

    /// Create a precious multi-set: a cons cell whose car is the slot
    /// vector and whose cdr holds the live count.
    ///
    /// The set itself is anchored on the preserve list; callers drop it
    /// with [`Heap::release_mset`].
    pub fn new_precious_mset(&mut self, initial_size: usize) -> Result<Value> {
        let size = initial_size.max(MSET_INITIAL_SIZE);
        let slots = self.alloc_vector(Kind::List, size)?;
        self.protect(slots)?;
        let count = self.scalar_int(0);
        self.unprotect(1)?;
        let count = count?;
        self.protect(slots)?;
        self.protect(count)?;
        let mset = self.alloc_cons(slots, Value::NIL);
        self.unprotect(2)?;
        let mset = mset?;
        // the count lives in the cdr; the cell is not a proper list
        self.set_cdr(mset, count);
        self.preserve_object(mset);
        Ok(mset)
    }

    fn mset_parts(&self, mset: Value) -> (Value, usize) {
        let slots = self.car(mset);
        let count = self.int_data(self.cdr(mset))[0] as usize;
        (slots, count)
    }

    /// Append a value to the multi-set, growing the slot vector by doubling.
    pub fn preserve_in_mset(&mut self, mset: Value, v: Value) -> Result<()> {
        let (slots, count) = self.mset_parts(mset);
        let capacity = self.length(slots);
        if count == capacity {
            self.protect(v)?;
            let grown = self.alloc_vector(Kind::List, capacity * 2);
            self.unprotect(1)?;
            let grown = grown?;
            for i in 0..count {
                let e = self.elt(slots, i);
                self.set_elt(grown, i, e);
            }
            self.set_car(mset, grown);
            self.set_elt(grown, count, v);
        } else {
            self.set_elt(slots, count, v);
        }
        let counter = self.cdr(mset);
        self.int_data_mut(counter)[0] = (count + 1) as i32;
        Ok(())
    }

    /// Remove a single occurrence of `v` (identity scan from the end).
    pub fn release_from_mset(&mut self, mset: Value, v: Value) {
        let (slots, count) = self.mset_parts(mset);
        for i in (0..count).rev() {
            if self.elt(slots, i) == v {
                let last = self.elt(slots, count - 1);
                self.set_elt(slots, i, last);
                self.set_elt(slots, count - 1, Value::NIL);
                let counter = self.cdr(mset);
                self.int_data_mut(counter)[0] = (count - 1) as i32;
                return;
            }
        }
        log::warn!("release_from_mset: value was not preserved in this set");
    }

    /// Release every value and drop the set's anchor.
    pub fn release_mset(&mut self, mset: Value) {
        let (slots, count) = self.mset_parts(mset);
        for i in 0..count {
            self.set_elt(slots, i, Value::NIL);
        }
        let counter = self.cdr(mset);
        self.int_data_mut(counter)[0] = 0;
        self.release_object(mset);
    }

    /// Number of values currently held by the multi-set.
    pub fn mset_count(&self, mset: Value) -> usize {
        self.mset_parts(mset).1
    }
}
