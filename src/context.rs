//! # Run context
//!
//! Every run carries one shared context value of type `C`. Tools receive a
//! [`RunContext<C>`] handle and observe each other's writes through it; the
//! caller keeps its own handle and reads the final state once the run returns.
//!
//! The handle only hands out shared references. Contexts that tools mutate
//! keep their mutable parts behind a lock (see
//! [`ComparisonContext`](crate::comparison::ComparisonContext)), so
//! concurrent tool calls cannot interleave a read-check-write.

use std::fmt;
use std::sync::Arc;

/// Cheaply clonable handle to the per-run context.
pub struct RunContext<C> {
    inner: Arc<C>,
}

impl<C> RunContext<C> {
    pub fn new(context: C) -> Self {
        Self {
            inner: Arc::new(context),
        }
    }

    /// Borrow the wrapped context.
    pub fn context(&self) -> &C {
        &self.inner
    }

    /// Returns `true` when both handles point at the same run context.
    pub fn same_run(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<C> Clone for RunContext<C> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<C> std::ops::Deref for RunContext<C> {
    type Target = C;

    fn deref(&self) -> &C {
        &self.inner
    }
}

impl<C: fmt::Debug> fmt::Debug for RunContext<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("RunContext").field(&self.inner).finish()
    }
}

impl Default for RunContext<()> {
    fn default() -> Self {
        Self::new(())
    }
}
