//! C10: `Set`/`Delete` sync operations with retry classification and
//! exponential backoff.

use crate::error::{Error, ErrorKind};
use std::time::Duration;

/// Base delay for the first retry; doubles per attempt thereafter.
const BASE_BACKOFF: Duration = Duration::from_secs(1);
/// Hard ceiling so backoff never balloons past a minute.
const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// A key's mutation intent: either a new value to push, or a deletion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationKind {
    Set(serde_json::Value),
    Delete,
}

/// A single queued sync operation for one key.
#[derive(Debug, Clone)]
pub struct SyncOperation {
    pub key: String,
    pub kind: OperationKind,
    pub retry_count: u32,
}

impl SyncOperation {
    pub fn set(key: impl Into<String>, value: serde_json::Value) -> Self {
        Self {
            key: key.into(),
            kind: OperationKind::Set(value),
            retry_count: 0,
        }
    }

    pub fn delete(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            kind: OperationKind::Delete,
            retry_count: 0,
        }
    }

    /// Returns a copy of this operation with an incremented retry count,
    /// for re-enqueuing after a retryable failure.
    pub fn with_incremented_retry(&self) -> Self {
        Self {
            key: self.key.clone(),
            kind: self.kind.clone(),
            retry_count: self.retry_count + 1,
        }
    }

    /// Exponential backoff delay before this operation's next attempt.
    pub fn backoff_delay(&self) -> Duration {
        let factor = 1u64.checked_shl(self.retry_count).unwrap_or(u64::MAX);
        BASE_BACKOFF.saturating_mul(factor as u32).min(MAX_BACKOFF)
    }
}

/// Outcome of running one [`SyncOperation`] to completion or failure.
#[derive(Debug, Clone)]
pub struct OperationResult {
    pub key: String,
    pub success: bool,
    pub error: Option<Error>,
    pub should_retry: bool,
}

/// These error kinds can never be fixed by simply trying the same write
/// again: the configuration is wrong, the value genuinely conflicts, the
/// payload itself is invalid, or a batch already told us which sub-errors
/// are terminal.
const NON_RETRYABLE: [ErrorKind; 4] = [
    ErrorKind::ConfigurationError,
    ErrorKind::Conflict,
    ErrorKind::ValidationError,
    ErrorKind::MultipleErrors,
];

/// Whether an operation that failed with `err` should be retried, given it
/// has already been attempted `retry_count` times against `max_retries`.
pub fn should_retry(err: &Error, retry_count: u32, max_retries: u32) -> bool {
    if retry_count >= max_retries {
        return false;
    }
    !NON_RETRYABLE.contains(&err.kind())
}
