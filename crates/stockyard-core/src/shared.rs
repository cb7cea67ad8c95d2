//! A router shared between the simulation thread and display readers.
//!
//! Every queue mutation runs under the write lock, so a reader never sees a
//! tier mid-rotation. Nothing inside the lock blocks or waits.

use crate::id::QueueSetId;
use crate::query::QueueSetSnapshot;
use crate::router::{RequestRouter, RouterError};
use std::sync::{Arc, PoisonError, RwLock};

#[derive(Debug, Clone, Default)]
pub struct SharedRouter {
    inner: Arc<RwLock<RequestRouter>>,
}

impl SharedRouter {
    pub fn new(router: RequestRouter) -> Self {
        Self {
            inner: Arc::new(RwLock::new(router)),
        }
    }

    /// Run `f` with shared access.
    pub fn read<R>(&self, f: impl FnOnce(&RequestRouter) -> R) -> R {
        // Invariant asserts fire before any write, so a poisoned router is
        // still structurally consistent.
        let guard = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        f(&guard)
    }

    /// Run `f` with exclusive access.
    pub fn write<R>(&self, f: impl FnOnce(&mut RequestRouter) -> R) -> R {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }

    /// Consistent copy of one queue set's order, for display.
    pub fn snapshot(&self, set: QueueSetId) -> Result<QueueSetSnapshot, RouterError> {
        self.read(|router| router.snapshot(set))
    }
}
