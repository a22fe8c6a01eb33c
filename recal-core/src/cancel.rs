//! Cooperative cancellation for in-flight reconciliation runs.
//!
//! The flag is checked at the top of every loop iteration and before every
//! external call. Mutations applied before the cancellation point stay
//! committed; there is no rollback.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::{SyncError, SyncResult};

/// Shared cancellation signal, cheap to clone and pass down the call chain.
#[derive(Clone, Debug, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request that the current run stop at its next checkpoint.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Returns `Err(SyncError::Cancelled)` once cancellation was requested.
    pub fn check(&self) -> SyncResult<()> {
        if self.is_cancelled() {
            Err(SyncError::Cancelled)
        } else {
            Ok(())
        }
    }
}
