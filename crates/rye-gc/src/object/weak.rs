//! Weak references and finalizers.
//!
//! A weak reference is a node with `{key, value, finalizer, next}` slots
//! and the `READY_TO_FINALIZE` / `FINALIZE_ON_EXIT` flags. The chain headed
//! at the heap is a runtime root, but the collector traces the slots
//! specially: a value survives only while its key does, and once a key
//! dies the ref is queued for finalization.
//!
//! Finalizers run outside the collector under a re-entrancy guard. Each
//! ref is unlinked from the chain before its finalizer runs, so a
//! finalizer executes at most once and may safely register new weak refs.
//! Native (callback) finalizers are isolated from each other: a panicking
//! finalizer is caught and logged, and later finalizers still run.

use std::panic::{catch_unwind, AssertUnwindSafe};

use crate::error::{GcError, Result};
use crate::heap::{FinalizerHook, Heap, NativeFinalizer};
use crate::object::header::gp;
use crate::object::{Kind, NodeData, Value};

impl Heap {
    /// Create a weak reference.
    ///
    /// `key` must be an environment, an external pointer or Nil; vectors
    /// and other copy-on-modify values cannot be weakly referenced.
    ///
    /// # Arguments
    /// * `key` - the weakly held value
    /// * `value` - kept alive exactly as long as `key`
    /// * `finalizer` - language function run when `key` dies, or Nil
    /// * `on_exit` - also run the finalizer at shutdown
    pub fn new_weak_ref(
        &mut self,
        key: Value,
        value: Value,
        finalizer: Value,
        on_exit: bool,
    ) -> Result<Value> {
        if !key.is_nil() && !matches!(self.kind(key), Kind::Env | Kind::ExtPtr) {
            return Err(GcError::InvalidWeakKey);
        }
        self.protect(key)?;
        self.protect(value)?;
        self.protect(finalizer)?;
        let w = self.alloc_weak_node(key, value, finalizer);
        self.unprotect(3)?;
        let w = w?;
        if on_exit {
            self.node_mut(w).header.gp_set(gp::FINALIZE_ON_EXIT);
        }
        self.weak_refs = w;
        Ok(w)
    }

    fn alloc_weak_node(&mut self, key: Value, value: Value, finalizer: Value) -> Result<Value> {
        self.maybe_gc(0)?;
        // the chain head is read after the allocation-triggered collection,
        // if any, so the fresh node links to the surviving chain
        let next = self.weak_refs;
        let v = self.acquire_node(0);
        self.init_node(v, Kind::WeakRef, NodeData::Weak {
            key,
            value,
            finalizer,
            next,
        });
        Ok(v)
    }

    /// Register a language-level finalizer for `obj`.
    pub fn register_finalizer(&mut self, obj: Value, function: Value, on_exit: bool) -> Result<Value> {
        self.new_weak_ref(obj, Value::NIL, function, on_exit)
    }

    /// Register a native callback finalizer for `obj`.
    ///
    /// The callback receives the heap and the key when the key dies.
    pub fn register_native_finalizer(
        &mut self,
        obj: Value,
        finalizer: NativeFinalizer,
        on_exit: bool,
    ) -> Result<Value> {
        let w = self.new_weak_ref(obj, Value::NIL, Value::NIL, on_exit)?;
        self.node_mut(w).header.gp_set(gp::NATIVE_FINALIZER);
        self.native_finalizers.insert(w, finalizer);
        Ok(w)
    }

    /// Install the embedder hook that evaluates language finalizers in a
    /// fresh top-level context.
    pub fn set_finalizer_hook(&mut self, hook: FinalizerHook) {
        self.finalizer_hook = Some(hook);
    }

    /// Key of a weak reference (Nil once cleared).
    pub fn weak_ref_key(&self, w: Value) -> Value {
        self.weak_fields(w).0
    }

    /// Value of a weak reference (Nil once cleared).
    pub fn weak_ref_value(&self, w: Value) -> Value {
        self.weak_fields(w).1
    }

    pub(crate) fn weak_fields(&self, w: Value) -> (Value, Value, Value, Value) {
        match &self.node(w).data {
            NodeData::Weak {
                key,
                value,
                finalizer,
                next,
            } => (*key, *value, *finalizer, *next),
            _ => panic!("weak accessor applied to a non-weakref cell"),
        }
    }

    pub(crate) fn set_weak_next(&mut self, w: Value, next: Value) {
        match &mut self.node_mut(w).data {
            NodeData::Weak { next: slot, .. } => *slot = next,
            _ => panic!("set_weak_next applied to a non-weakref cell"),
        }
    }

    fn clear_weak_key_value(&mut self, w: Value) {
        match &mut self.node_mut(w).data {
            NodeData::Weak { key, value, .. } => {
                *key = Value::NIL;
                *value = Value::NIL;
            }
            _ => panic!("clear_weak_key_value applied to a non-weakref cell"),
        }
    }

    /// Unlink `w` from the chain; true when it was present.
    fn unlink_weak_ref(&mut self, w: Value) -> bool {
        let mut prev = Value::NIL;
        let mut cur = self.weak_refs;
        while !cur.is_nil() {
            let next = self.weak_fields(cur).3;
            if cur == w {
                if prev.is_nil() {
                    self.weak_refs = next;
                } else {
                    self.set_weak_next(prev, next);
                }
                self.set_weak_next(w, Value::NIL);
                return true;
            }
            prev = cur;
            cur = next;
        }
        false
    }

    /// Run every finalizer whose key died.
    ///
    /// Safe to call from any safe point; re-entrant calls return
    /// immediately. Finalizer order is newest-registered first.
    pub fn run_pending_finalizers(&mut self) {
        if self.finalizing || self.gc.in_gc {
            return;
        }
        self.finalizing = true;
        loop {
            // the chain may be rewritten by a finalizer, so rescan from the
            // head after every run
            let mut target = Value::NIL;
            let mut w = self.weak_refs;
            while !w.is_nil() {
                if self.node(w).header.gp_is_set(gp::READY_TO_FINALIZE) {
                    target = w;
                    break;
                }
                w = self.weak_fields(w).3;
            }
            if target.is_nil() {
                break;
            }
            self.unlink_weak_ref(target);
            self.node_mut(target).header.gp_clear(gp::READY_TO_FINALIZE);
            self.run_one_finalizer(target);
        }
        self.finalizing = false;
    }

    /// Queue and run the finalize-on-exit refs; called at shutdown.
    pub fn run_exit_finalizers(&mut self) {
        let mut w = self.weak_refs;
        while !w.is_nil() {
            let next = self.weak_fields(w).3;
            if self.node(w).header.gp_is_set(gp::FINALIZE_ON_EXIT) {
                self.node_mut(w).header.gp_set(gp::READY_TO_FINALIZE);
            }
            w = next;
        }
        self.run_pending_finalizers();
    }

    fn run_one_finalizer(&mut self, w: Value) {
        let (key, _value, finalizer, _next) = self.weak_fields(w);
        if self.node(w).header.gp_is_set(gp::NATIVE_FINALIZER) {
            if let Some(mut callback) = self.native_finalizers.remove(&w) {
                let outcome = catch_unwind(AssertUnwindSafe(|| callback(self, key)));
                if outcome.is_err() {
                    log::error!("native finalizer panicked; continuing with later finalizers");
                }
            }
        } else if !finalizer.is_nil() {
            // the hook runs the language function in a fresh top-level
            // context; take it out so a nested collection cannot alias it
            if let Some(mut hook) = self.finalizer_hook.take() {
                let outcome = catch_unwind(AssertUnwindSafe(|| hook(self, finalizer, key)));
                if outcome.is_err() {
                    log::error!("finalizer signaled an error; continuing with later finalizers");
                }
                if self.finalizer_hook.is_none() {
                    self.finalizer_hook = Some(hook);
                }
            } else {
                log::warn!("language finalizer dropped: no finalizer hook installed");
            }
        }
        self.clear_weak_key_value(w);
    }

    /// True when any ref is queued for finalization.
    pub fn has_pending_finalizers(&self) -> bool {
        let mut w = self.weak_refs;
        while !w.is_nil() {
            if self.node(w).header.gp_is_set(gp::READY_TO_FINALIZE) {
                return true;
            }
            w = self.weak_fields(w).3;
        }
        false
    }

    /// Number of refs on the weak chain (diagnostics).
    pub fn weak_ref_count(&self) -> usize {
        let mut n = 0;
        let mut w = self.weak_refs;
        while !w.is_nil() {
            n += 1;
            w = self.weak_fields(w).3;
        }
        n
    }
}
