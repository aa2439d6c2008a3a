//! Error taxonomy for the sync engine.

use thiserror::Error;

/// All possible errors raised by the sync engine.
#[derive(Debug, Error, Clone)]
pub enum Error {
    /// A remote value changed underneath a local operation in a way that
    /// cannot be resolved automatically without a chosen strategy.
    #[error("sync conflict for key '{0}'")]
    SyncConflict(String),

    /// A generic, potentially-retryable failure performing a sync operation.
    #[error("sync failed: {0}")]
    SyncFailed(String),

    /// A bounded operation (transaction, hydration) did not complete in time.
    #[error("sync timed out: {0}")]
    SyncTimeout(String),

    /// The remote adapter reported a transport-level failure.
    #[error("network error: {0}")]
    SyncNetworkError(String),

    /// A value or key failed shape/size validation.
    #[error("validation failed: {0}")]
    SyncValidationError(String),

    /// The engine was misconfigured (missing schema entry, no identity, etc).
    #[error("configuration error: {0}")]
    SyncConfigurationError(String),

    /// Several independent failures occurred in one batch operation.
    #[error("{} errors occurred during sync", .0.len())]
    SyncMultipleErrors(Vec<Error>),

    /// The locally recomputed digest disagreed with the remote digest after
    /// every configured retry attempt.
    #[error(
        "integrity check failed for '{key}' after {attempts} attempt(s): \
         local digest {computed_hash} != remote digest {remote_hash}"
    )]
    IntegrityFailure {
        key: String,
        computed_hash: String,
        remote_hash: String,
        attempts: u32,
    },
}

/// Result type for sync engine operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Coarse error category used for retry classification (§4.10) independent
/// of the message text carried by a given instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Conflict,
    Failed,
    Timeout,
    NetworkError,
    ValidationError,
    ConfigurationError,
    MultipleErrors,
    IntegrityFailure,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::SyncConflict(_) => ErrorKind::Conflict,
            Error::SyncFailed(_) => ErrorKind::Failed,
            Error::SyncTimeout(_) => ErrorKind::Timeout,
            Error::SyncNetworkError(_) => ErrorKind::NetworkError,
            Error::SyncValidationError(_) => ErrorKind::ValidationError,
            Error::SyncConfigurationError(_) => ErrorKind::ConfigurationError,
            Error::SyncMultipleErrors(_) => ErrorKind::MultipleErrors,
            Error::IntegrityFailure { .. } => ErrorKind::IntegrityFailure,
        }
    }

    /// Whether this error is terminal: retrying the same operation again
    /// without outside intervention cannot succeed.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::ConfigurationError
                | ErrorKind::Conflict
                | ErrorKind::ValidationError
                | ErrorKind::MultipleErrors
        )
    }
}

/// Folds a batch of errors into one, matching the teacher-style convention
/// of flat, uniform error variants: a single error is returned bare, an
/// empty vec is a contract violation handled by the caller, and anything
/// else is wrapped as [`Error::SyncMultipleErrors`].
pub fn create_multiple_errors(mut errors: Vec<Error>) -> Error {
    if errors.len() == 1 {
        errors.remove(0)
    } else {
        Error::SyncMultipleErrors(errors)
    }
}
