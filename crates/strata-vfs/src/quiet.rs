//! Scoped suppression of "not found" warnings.
//!
//! Existence checks expect misses; they hold a [`QuietNotFound`] guard so the
//! resolver does not log them. The guard is per thread and nests.

use std::cell::Cell;
use std::marker::PhantomData;

thread_local! {
    static DEPTH: Cell<u32> = const { Cell::new(0) };
}

/// While alive, not-found lookups on this thread are not logged.
pub(crate) struct QuietNotFound {
    // Tied to the thread that created it.
    _not_send: PhantomData<*const ()>,
}

impl QuietNotFound {
    pub(crate) fn new() -> Self {
        DEPTH.with(|d| d.set(d.get() + 1));
        Self {
            _not_send: PhantomData,
        }
    }
}

impl Drop for QuietNotFound {
    fn drop(&mut self) {
        DEPTH.with(|d| d.set(d.get().saturating_sub(1)));
    }
}

/// Whether not-found warnings are currently suppressed on this thread.
pub(crate) fn is_quiet() -> bool {
    DEPTH.with(|d| d.get() > 0)
}
