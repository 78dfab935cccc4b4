//! rye-gc - the managed heap of the rye runtime.
//!
//! A generational, non-moving, mark-sweep collector over a tagged-variant
//! heap. Cells share a compact header (kind tag, transient mark, old bit,
//! generation, size class, kind-specific flags, saturating refcount, two
//! intrusive list links) and live on pages carved into per-class node
//! slots; large vectors get a page of their own so the sweep can return
//! their memory immediately.
//!
//! ## Overview
//!
//! - **Generations**: a young space (the `New` lists) plus two old
//!   generations with per-(class, generation) circular lists. Survivors of
//!   a collection move to the old lists; cells in a collected old
//!   generation are promoted one generation and must prove reachability
//!   again.
//! - **Write barrier**: all slot stores go through private setters on
//!   [`Heap`]; a store of a younger value into an older cell moves the
//!   parent onto the `OldToNew` list for its generation, which younger
//!   collections treat as a root set.
//! - **Roots**: the protect stack ([`Heap::protect`]), precious multi-sets
//!   ([`Heap::new_precious_mset`]), the preserve list, the symbol table
//!   and the permanent globals.
//! - **Weak references and finalizers**: a chain of `{key, value,
//!   finalizer, next}` cells scanned after the main mark phase; dead keys
//!   queue finalizers that run outside the collector, at most once each.
//!
//! ## Quick start
//!
//! ```rust
//! use rye_gc::{GcConfig, Heap, Value};
//!
//! fn main() -> rye_gc::Result<()> {
//!     let mut heap = Heap::new(GcConfig::default())?;
//!
//!     let tail = heap.alloc_cons(Value::NIL, Value::NIL)?;
//!     heap.protect(tail)?;
//!     let list = heap.alloc_cons(Value::NIL, tail)?;
//!     heap.unprotect(1)?;
//!     heap.protect(list)?;
//!
//!     let summary = heap.gc();
//!     assert!(summary.node_count >= 2);
//!     assert_eq!(heap.cdr(list), tail);
//!
//!     heap.unprotect(1)?;
//!     Ok(())
//! }
//! ```
//!
//! ## Threading
//!
//! The heap is owned by the runtime's main thread and passed `&mut`;
//! nothing here is `Sync`. The only cross-thread facility is the pending
//! interrupt flag, which signal handlers may set and safe points poll.

pub mod config;
pub mod error;
pub mod gc;
pub mod heap;
pub mod intern;
pub mod object;
pub mod protect;
pub mod stats;

use std::sync::atomic::{AtomicBool, Ordering};

pub use config::GcConfig;
pub use error::{GcError, Result};
pub use gc::GcSummary;
pub use heap::{FinalizerHook, Globals, Heap, NativeFinalizer};
pub use intern::CharEncoding;
pub use object::{is_na_real, na_real, Complex, Kind, Value, KIND_COUNT, NA_INTEGER, NA_LOGICAL};
pub use protect::{PROTECT_REDZONE, PROTECT_STACK_SIZE};

/// Crate version from Cargo.toml.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Asynchronous interrupt request; set from signal handlers, polled at
/// safe points.
static PENDING_INTERRUPT: AtomicBool = AtomicBool::new(false);

/// Request an interrupt (async-signal-safe: only stores a flag).
pub fn set_pending_interrupt() {
    PENDING_INTERRUPT.store(true, Ordering::Release);
}

/// True when an interrupt is pending.
pub fn interrupt_pending() -> bool {
    PENDING_INTERRUPT.load(Ordering::Acquire)
}

/// Consume a pending interrupt, returning whether one was pending.
pub fn take_interrupt() -> bool {
    PENDING_INTERRUPT.swap(false, Ordering::AcqRel)
}

/// Create a heap configured from the process environment.
pub fn init() -> Result<Heap> {
    Heap::from_env()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_default() {
        let heap = Heap::new(GcConfig::default());
        assert!(heap.is_ok());
    }

    #[test]
    fn test_interrupt_flag_roundtrip() {
        assert!(!interrupt_pending());
        set_pending_interrupt();
        assert!(interrupt_pending());
        assert!(take_interrupt());
        assert!(!interrupt_pending());
    }

    #[test]
    fn test_version_not_empty() {
        assert!(!VERSION.is_empty());
    }
}
