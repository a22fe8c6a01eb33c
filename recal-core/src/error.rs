//! Error types for recal.

use thiserror::Error;

/// Errors that can occur while reconciling the ledger with the calendar.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Network-level failure or timeout; safe to retry with backoff.
    #[error("transient error: {0}")]
    Transient(String),

    /// The service asked us to slow down. Distinct from `Transient` so the
    /// caller can apply the fixed rate-limit backoff.
    #[error("rate limited by the remote service")]
    RateLimited,

    /// The requested entity does not exist (or is already gone).
    #[error("not found: {0}")]
    NotFound(String),

    /// A record is missing required fields. Skip it, never retry.
    #[error("invalid record: {0}")]
    Validation(String),

    /// Credential unavailable or rejected. Fatal for the whole run.
    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("ledger error: {0}")]
    Ledger(String),

    #[error("calendar error: {0}")]
    Calendar(String),

    #[error("configuration error: {0}")]
    Config(String),

    /// The run was cancelled cooperatively.
    #[error("run cancelled")]
    Cancelled,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Result type alias for recal operations.
pub type SyncResult<T> = Result<T, SyncError>;

impl SyncError {
    /// Whether retrying the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SyncError::Transient(_) | SyncError::RateLimited)
    }

    /// Whether this error aborts the whole run rather than a single record.
    pub fn is_run_fatal(&self) -> bool {
        matches!(
            self,
            SyncError::Auth(_) | SyncError::Cancelled | SyncError::Config(_)
        )
    }
}
