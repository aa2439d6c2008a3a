//! C6: `backup`/`fetch`/`delete`/`runTransaction` facade over the remote
//! adapter, resolver, processor and chunk manager.

use crate::adapter::{AdapterError, AdapterErrorCode, BoxFuture, RemoteAdapter, Transaction};
use crate::collaborators::IdentityProvider;
use crate::error::{Error, Result};
use crate::processor;
use crate::resolver::{self, RefTarget};
use crate::schema::{KeyKind, Schema};
use serde_json::{json, Value};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex as AsyncMutex;

/// How long a single `run_transaction` call is allowed to run, including
/// time spent waiting for its turn in the FIFO queue.
const TRANSACTION_TIMEOUT: Duration = Duration::from_secs(10);

/// Facade over the remote store for a single signed-in user's backup tree.
///
/// `txn_lock` serializes transactions FIFO: tokio's `Mutex` grants its
/// internal semaphore permits in acquisition order, so callers queued on
/// `.lock().await` are woken in the order they arrived.
pub struct RemoteStore<A: RemoteAdapter, I: IdentityProvider> {
    adapter: Arc<A>,
    identity: Arc<I>,
    schema: Schema,
    txn_lock: AsyncMutex<()>,
}

impl<A: RemoteAdapter, I: IdentityProvider> RemoteStore<A, I> {
    pub fn new(adapter: Arc<A>, identity: Arc<I>, schema: Schema) -> Self {
        Self {
            adapter,
            identity,
            schema,
            txn_lock: AsyncMutex::new(()),
        }
    }

    async fn require_uid(&self) -> Result<String> {
        self.identity.current_user().await.ok_or_else(|| {
            Error::SyncConfigurationError("cannot sync: no signed-in user".into())
        })
    }

    /// Writes `value` under `key`, or deletes it when `value` is `None`.
    pub async fn backup(&self, key: &str, value: Option<Value>) -> Result<()> {
        if key.is_empty() {
            return Err(Error::SyncValidationError("key must not be empty".into()));
        }
        let Some(value) = value else {
            return self.delete(key).await;
        };

        let report = processor::validate(&value);
        if !report.is_valid {
            tracing::warn!(key, errors = ?report.errors, "value failed validation, writing anyway");
        }

        let uid = self.require_uid().await?;
        let (target, kind) = resolver::ref_for(&self.schema, Some(&uid), key)?;
        let sanitized = processor::sanitize(&value);

        match (target, kind) {
            (RefTarget::Doc(doc), KeyKind::Doc) => {
                let field = processor::sanitize_field_name(key);
                self.adapter
                    .set_document(&doc, json!({ field: sanitized }), true)
                    .await
                    .map_err(Into::into)
            }
            (RefTarget::Collection(coll), KeyKind::Collection) => {
                crate::chunk::write_chunked(self.adapter.as_ref(), &coll, key, &sanitized).await
            }
            _ => unreachable!("resolver always pairs RefTarget with matching KeyKind"),
        }
    }

    /// Reads back the value currently stored under `key`.
    pub async fn fetch(&self, key: &str) -> Result<Option<Value>> {
        let uid = self.require_uid().await?;
        let (target, kind) = resolver::ref_for(&self.schema, Some(&uid), key)?;
        let raw = match (target, kind) {
            (RefTarget::Doc(doc), KeyKind::Doc) => {
                let field = processor::sanitize_field_name(key);
                self.adapter
                    .get_document(&doc)
                    .await
                    .map_err(Into::<Error>::into)?
                    .and_then(|body| body.get(&field).cloned())
            }
            (RefTarget::Collection(coll), KeyKind::Collection) => {
                crate::chunk::read_chunked(self.adapter.as_ref(), &coll, key).await?
            }
            _ => unreachable!(),
        };
        Ok(raw.map(|v| processor::restore(&v)))
    }

    /// Deletes whatever is stored under `key`.
    pub async fn delete(&self, key: &str) -> Result<()> {
        let uid = self.require_uid().await?;
        let (target, kind) = resolver::ref_for(&self.schema, Some(&uid), key)?;
        match (target, kind) {
            (RefTarget::Doc(doc), KeyKind::Doc) => {
                let field = processor::sanitize_field_name(key);
                self.adapter
                    .update_document(&doc, json!({ field: Value::Null }))
                    .await
                    .map_err(Into::into)
            }
            (RefTarget::Collection(coll), KeyKind::Collection) => {
                crate::chunk::delete_chunked(self.adapter.as_ref(), &coll, key).await
            }
            _ => unreachable!(),
        }
    }

    /// Runs `body` as a single remote transaction, serialized FIFO behind
    /// any other in-flight transaction and bounded by [`TRANSACTION_TIMEOUT`].
    pub async fn run_transaction<F>(&self, body: F) -> Result<Value>
    where
        F: for<'t> FnOnce(&'t mut dyn Transaction) -> BoxFuture<'t, crate::adapter::AdapterResult<Value>>
            + Send
            + 'static,
    {
        let _permit = self.txn_lock.lock().await;
        let adapter = self.adapter.clone();
        let run = async move { adapter.run_transaction(Box::new(body)).await };
        match tokio::time::timeout(TRANSACTION_TIMEOUT, run).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(adapter_err)) => Err(adapter_err.into()),
            Err(_) => Err(Error::SyncTimeout(format!(
                "transaction did not complete within {:?}",
                TRANSACTION_TIMEOUT
            ))),
        }
    }

    /// Irrecoverably deletes the current user's entire backup tree. Named
    /// loudly on purpose: callers must opt in explicitly, there is no undo.
    pub async fn dangerously_delete_all(&self) -> Result<()> {
        let uid = self.require_uid().await?;
        let mut batch = self.adapter.write_batch();
        for (doc_name, _) in self.schema.documents() {
            batch.delete(&crate::adapter::DocRef(format!(
                "users/{uid}/backup/{doc_name}"
            )));
        }
        batch.commit().await.map_err(Into::into)
    }
}

/// Convenience alias used when boxing a transaction body inline.
pub type TransactionBody =
    Box<dyn for<'t> FnOnce(&'t mut dyn Transaction) -> Pin<Box<dyn Future<Output = crate::adapter::AdapterResult<Value>> + Send + 't>> + Send>;
