//! C2: the narrow remote adapter capability set.
//!
//! The concrete remote-store driver (Firestore, a self-hosted backend, ...)
//! is out of scope; this module only defines the document/collection/
//! transaction/batch surface the rest of the engine is written against, plus
//! the native-error-code-to-sync-taxonomy mapping every adapter implementor
//! returns through.

use crate::error::Error;
use async_trait::async_trait;
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;

/// A reference to a single remote document, e.g. `users/<uid>/backup/settings`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocRef(pub String);

/// A reference to a remote subcollection, e.g.
/// `users/<uid>/backup/settings/history`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CollectionRef(pub String);

impl DocRef {
    pub fn child_collection(&self, name: &str) -> CollectionRef {
        CollectionRef(format!("{}/{}", self.0, name))
    }
}

impl CollectionRef {
    pub fn doc(&self, id: &str) -> DocRef {
        DocRef(format!("{}/{}", self.0, id))
    }
}

/// Coarse native adapter error codes (aligned with the Firestore/GCP
/// status vocabulary most remote stores in this space report).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdapterErrorCode {
    PermissionDenied,
    Unavailable,
    DeadlineExceeded,
    ResourceExhausted,
    InvalidArgument,
    FailedPrecondition,
    NotFound,
    OutOfRange,
    AlreadyExists,
    Aborted,
    Internal,
    Unimplemented,
    Unknown,
}

/// An error surfaced by a concrete [`RemoteAdapter`] implementation, before
/// it is mapped onto the engine's [`Error`] taxonomy.
#[derive(Debug, Clone)]
pub struct AdapterError {
    pub code: AdapterErrorCode,
    pub message: String,
}

impl AdapterError {
    pub fn new(code: AdapterErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Maps a native adapter error onto the sync error taxonomy, per the
/// table in §4.6: `permission-denied` -> NetworkError; `unavailable` /
/// `deadline-exceeded` -> Timeout; `resource-exhausted` /
/// `invalid-argument` / `failed-precondition` / `not-found` /
/// `out-of-range` -> ValidationError; `already-exists` -> Conflict;
/// `aborted` / `internal` -> Failed; `unimplemented` -> ConfigurationError;
/// unknown -> NetworkError.
impl From<AdapterError> for Error {
    fn from(err: AdapterError) -> Self {
        match err.code {
            AdapterErrorCode::PermissionDenied => Error::SyncNetworkError(err.message),
            AdapterErrorCode::Unavailable | AdapterErrorCode::DeadlineExceeded => {
                Error::SyncTimeout(err.message)
            }
            AdapterErrorCode::ResourceExhausted
            | AdapterErrorCode::InvalidArgument
            | AdapterErrorCode::FailedPrecondition
            | AdapterErrorCode::NotFound
            | AdapterErrorCode::OutOfRange => Error::SyncValidationError(err.message),
            AdapterErrorCode::AlreadyExists => Error::SyncConflict(err.message),
            AdapterErrorCode::Aborted | AdapterErrorCode::Internal => {
                Error::SyncFailed(err.message)
            }
            AdapterErrorCode::Unimplemented => Error::SyncConfigurationError(err.message),
            AdapterErrorCode::Unknown => Error::SyncNetworkError(err.message),
        }
    }
}

/// Result type returned by adapter-facing calls, before taxonomy mapping.
pub type AdapterResult<T> = std::result::Result<T, AdapterError>;

/// A boxed future, used to let [`RemoteAdapter::run_transaction`] accept a
/// caller-supplied transaction body without a generic method (trait objects
/// can't have generic methods).
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A single read/write transaction against the remote store.
#[async_trait]
pub trait Transaction: Send + Sync {
    async fn get(&mut self, doc: &DocRef) -> AdapterResult<Option<Value>>;
    async fn set(&mut self, doc: &DocRef, data: Value, merge: bool) -> AdapterResult<()>;
    async fn update(&mut self, doc: &DocRef, data: Value) -> AdapterResult<()>;
    async fn delete(&mut self, doc: &DocRef) -> AdapterResult<()>;
}

/// An accumulating batch of writes committed atomically.
#[async_trait]
pub trait WriteBatch: Send + Sync {
    fn set(&mut self, doc: &DocRef, data: Value, merge: bool);
    fn update(&mut self, doc: &DocRef, data: Value);
    fn delete(&mut self, doc: &DocRef);
    async fn commit(self: Box<Self>) -> AdapterResult<()>;
}

/// The narrow capability set the rest of the engine is written against.
#[async_trait]
pub trait RemoteAdapter: Send + Sync {
    async fn get_document(&self, doc: &DocRef) -> AdapterResult<Option<Value>>;
    async fn set_document(&self, doc: &DocRef, data: Value, merge: bool) -> AdapterResult<()>;
    async fn update_document(&self, doc: &DocRef, data: Value) -> AdapterResult<()>;
    async fn delete_document(&self, doc: &DocRef) -> AdapterResult<()>;
    async fn get_collection(&self, coll: &CollectionRef) -> AdapterResult<Vec<(String, Value)>>;
    fn write_batch(&self) -> Box<dyn WriteBatch>;
    async fn run_transaction<'a>(
        &'a self,
        body: Box<dyn for<'t> FnOnce(&'t mut dyn Transaction) -> BoxFuture<'t, AdapterResult<Value>> + Send + 'a>,
    ) -> AdapterResult<Value>;
}

/// Wraps a [`RemoteAdapter`] so every write is a silent no-op, logging a
/// warning instead of mutating the remote. Reads pass straight through.
pub struct ReadOnlyAdapter<A: RemoteAdapter> {
    inner: A,
}

impl<A: RemoteAdapter> ReadOnlyAdapter<A> {
    pub fn new(inner: A) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<A: RemoteAdapter> RemoteAdapter for ReadOnlyAdapter<A> {
    async fn get_document(&self, doc: &DocRef) -> AdapterResult<Option<Value>> {
        self.inner.get_document(doc).await
    }

    async fn set_document(&self, doc: &DocRef, _data: Value, _merge: bool) -> AdapterResult<()> {
        tracing::warn!(doc = %doc.0, "ignored write: remote adapter is read-only");
        Ok(())
    }

    async fn update_document(&self, doc: &DocRef, _data: Value) -> AdapterResult<()> {
        tracing::warn!(doc = %doc.0, "ignored update: remote adapter is read-only");
        Ok(())
    }

    async fn delete_document(&self, doc: &DocRef) -> AdapterResult<()> {
        tracing::warn!(doc = %doc.0, "ignored delete: remote adapter is read-only");
        Ok(())
    }

    async fn get_collection(&self, coll: &CollectionRef) -> AdapterResult<Vec<(String, Value)>> {
        self.inner.get_collection(coll).await
    }

    fn write_batch(&self) -> Box<dyn WriteBatch> {
        Box::new(NoopBatch)
    }

    async fn run_transaction<'a>(
        &'a self,
        _body: Box<
            dyn for<'t> FnOnce(&'t mut dyn Transaction) -> BoxFuture<'t, AdapterResult<Value>>
                + Send
                + 'a,
        >,
    ) -> AdapterResult<Value> {
        Err(AdapterError::new(
            AdapterErrorCode::FailedPrecondition,
            "transactions are disabled: remote adapter is read-only",
        ))
    }
}

struct NoopBatch;

#[async_trait]
impl WriteBatch for NoopBatch {
    fn set(&mut self, _doc: &DocRef, _data: Value, _merge: bool) {}
    fn update(&mut self, _doc: &DocRef, _data: Value) {}
    fn delete(&mut self, _doc: &DocRef) {}
    async fn commit(self: Box<Self>) -> AdapterResult<()> {
        Ok(())
    }
}
