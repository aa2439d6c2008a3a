//! C8: per-document remote metadata cache, debounced flush, and conflict
//! resolution against local sync metadata.

use crate::adapter::{DocRef, RemoteAdapter};
use crate::collaborators::LocalStore;
use crate::conflict::{self, ConflictStrategy};
use crate::error::Result;
use crate::metadata::local::{LocalMetadata, LocalSyncMetadata, SyncStatus};
use crate::metadata::{RemoteMetadataRecord, REMOTE_METADATA_FIELD};
use serde_json::{json, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

/// How long to hold a dirty key before flushing, unless the force-flush
/// threshold is hit first.
const FLUSH_DEBOUNCE: Duration = Duration::from_secs(1);
/// Past this many dirty keys, flush immediately rather than waiting out
/// the debounce window.
const FORCE_FLUSH_THRESHOLD: usize = 1000;

struct State {
    cache: BTreeMap<String, RemoteMetadataRecord>,
    cache_loaded: bool,
    pending_keys: BTreeSet<String>,
    flush_task: Option<JoinHandle<()>>,
}

impl Default for State {
    fn default() -> Self {
        Self {
            cache: BTreeMap::new(),
            cache_loaded: false,
            pending_keys: BTreeSet::new(),
            flush_task: None,
        }
    }
}

/// Owns the remote metadata cache for a single document, debouncing writes
/// of the reserved `__remote_metadata__` field and resolving conflicts
/// between a key's local metadata and what the cache knows about it.
pub struct Coordinator<A: RemoteAdapter, S: LocalStore> {
    document: DocRef,
    adapter: Arc<A>,
    local: Arc<LocalMetadata<S>>,
    strategy: ConflictStrategy,
    state: Mutex<State>,
}

impl<A: RemoteAdapter + 'static, S: LocalStore + 'static> Coordinator<A, S> {
    pub fn new(
        document: DocRef,
        adapter: Arc<A>,
        local: Arc<LocalMetadata<S>>,
        strategy: ConflictStrategy,
    ) -> Arc<Self> {
        Arc::new(Self {
            document,
            adapter,
            local,
            strategy,
            state: Mutex::new(State::default()),
        })
    }

    async fn ensure_cache_loaded(&self, state: &mut State) -> Result<()> {
        if state.cache_loaded {
            return Ok(());
        }
        let body = self
            .adapter
            .get_document(&self.document)
            .await
            .map_err(Into::<crate::error::Error>::into)?;
        if let Some(map) = body.and_then(|b| b.get(REMOTE_METADATA_FIELD).cloned()) {
            if let Ok(parsed) = serde_json::from_value::<BTreeMap<String, RemoteMetadataRecord>>(map)
            {
                state.cache = parsed;
            }
        }
        state.cache_loaded = true;
        Ok(())
    }

    /// Returns the cached remote metadata for `key`, loading the cache on
    /// first access (single-flight: subsequent calls see `cache_loaded`).
    pub async fn get_remote_metadata(&self, key: &str) -> Result<Option<RemoteMetadataRecord>> {
        let mut state = self.state.lock().await;
        self.ensure_cache_loaded(&mut state).await?;
        Ok(state.cache.get(key).cloned())
    }

    /// Whether `key`'s cached remote record is strictly newer than `local`,
    /// i.e. hydration has something to pull down for it.
    pub async fn needs_hydration(&self, key: &str, local: &LocalSyncMetadata) -> Result<bool> {
        let Some(remote) = self.get_remote_metadata(key).await? else {
            return Ok(false);
        };
        Ok(remote.version > local.version)
    }

    /// Reconciles `local` against the cached remote record for `key` and
    /// returns the metadata that should now be considered current,
    /// resolving any conflict per `strategy_override` if given, or the
    /// strategy this coordinator was constructed with otherwise.
    pub async fn ensure_consistency(
        &self,
        key: &str,
        local: &LocalSyncMetadata,
        strategy_override: Option<ConflictStrategy>,
    ) -> Result<LocalSyncMetadata> {
        let Some(remote) = self.get_remote_metadata(key).await? else {
            return Ok(local.clone());
        };
        if !conflict::is_conflict(local, &remote) {
            return Ok(local.clone());
        }
        let strategy = strategy_override.unwrap_or(self.strategy);
        match conflict::resolve(strategy, local, &remote) {
            conflict::Resolution::Local => Ok(local.clone()),
            conflict::Resolution::Remote => Ok(LocalSyncMetadata {
                digest: remote.digest,
                version: remote.version,
                sync_status: SyncStatus::Synced,
            }),
        }
    }

    /// Records a new digest/version for `key` in the cache and schedules a
    /// debounced flush to the remote document, unless `schedule_remote_sync`
    /// is false (used when the caller will flush explicitly itself).
    pub async fn update_local_metadata(
        self: &Arc<Self>,
        key: &str,
        record: RemoteMetadataRecord,
        schedule_remote_sync: bool,
    ) -> Result<()> {
        let mut state = self.state.lock().await;
        self.ensure_cache_loaded(&mut state).await?;
        state.cache.insert(key.to_string(), record);
        state.pending_keys.insert(key.to_string());

        if !schedule_remote_sync {
            return Ok(());
        }

        if state.pending_keys.len() >= FORCE_FLUSH_THRESHOLD {
            if let Some(task) = state.flush_task.take() {
                task.abort();
            }
            drop(state);
            return self.sync_to_remote().await;
        }

        if let Some(task) = state.flush_task.take() {
            task.abort();
        }
        let this = self.clone();
        state.flush_task = Some(tokio::spawn(async move {
            tokio::time::sleep(FLUSH_DEBOUNCE).await;
            let _ = this.sync_to_remote().await;
        }));
        Ok(())
    }

    /// Flushes the whole cache (not just pending keys, to keep the remote
    /// field internally consistent) to the document's reserved field.
    pub async fn sync_to_remote(self: &Arc<Self>) -> Result<()> {
        let mut state = self.state.lock().await;
        self.ensure_cache_loaded(&mut state).await?;
        let map = serde_json::to_value(&state.cache).unwrap_or(Value::Null);
        state.pending_keys.clear();
        drop(state);
        self.adapter
            .update_document(&self.document, json!({ REMOTE_METADATA_FIELD: map }))
            .await
            .map_err(Into::into)
    }

    /// Drops the in-memory cache so the next access reloads from the
    /// remote document.
    pub async fn invalidate_cache(&self) {
        let mut state = self.state.lock().await;
        state.cache.clear();
        state.cache_loaded = false;
    }

    /// Aborts any in-flight debounce timer and clears pending state without
    /// flushing - used when the controller is torn down or the user signs
    /// out mid-batch.
    pub async fn cancel_pending_operations(&self) {
        let mut state = self.state.lock().await;
        if let Some(task) = state.flush_task.take() {
            task.abort();
        }
        state.pending_keys.clear();
    }
}
