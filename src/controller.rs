//! C12: mutation intake, batching, autosync, and hydration.

use crate::adapter::RemoteAdapter;
use crate::collaborators::{IdentityProvider, LocalStore};
use crate::config::{GanonConfig, IntegrityFailureConfig, IntegrityRecoveryStrategy};
use crate::conflict::ConflictStrategy;
use crate::error::{Error, Result};
use crate::hash;
use crate::metadata::local::{LocalMetadata, SyncStatus};
use crate::metadata::manager::MetadataManager;
use crate::operation::{OperationResult, SyncOperation};
use crate::remote_store::RemoteStore;
use crate::repo::{OperationExecutor, OperationRepo};
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

const LAST_BACKUP_KEY: &str = "__ganon_last_backup__";

struct ControllerExecutor<A: RemoteAdapter + 'static, L: LocalStore + 'static, I: IdentityProvider + 'static> {
    remote: Arc<RemoteStore<A, I>>,
    metadata: Arc<MetadataManager<A, L>>,
}

impl<A: RemoteAdapter + 'static, L: LocalStore + 'static, I: IdentityProvider + 'static> OperationExecutor
    for ControllerExecutor<A, L, I>
{
    fn execute<'a>(
        &'a self,
        op: &'a SyncOperation,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            self.metadata.update_sync_status(&op.key, SyncStatus::InProgress).await?;
            tracing::debug!(key = %op.key, "operation InProgress");

            // Each arm runs in its own async block so a `?` inside only
            // short-circuits that block, not the whole executor future -
            // otherwise a failed backup would skip the Failed status update
            // below and leave the key stuck at InProgress.
            let result: Result<()> = match &op.kind {
                crate::operation::OperationKind::Set(value) => {
                    async {
                        let digest = hash::digest(Some(value), None);
                        self.remote.backup(&op.key, Some(value.clone())).await?;
                        self.metadata.set(&op.key, digest, current_version()).await
                    }
                    .await
                }
                crate::operation::OperationKind::Delete => {
                    async {
                        self.remote.backup(&op.key, None).await?;
                        self.metadata.set(&op.key, String::new(), current_version()).await
                    }
                    .await
                }
            };

            match &result {
                Ok(()) => {
                    self.metadata.update_sync_status(&op.key, SyncStatus::Synced).await?;
                    tracing::debug!(key = %op.key, "operation Synced");
                }
                Err(_) => {
                    self.metadata.update_sync_status(&op.key, SyncStatus::Failed).await?;
                    tracing::debug!(key = %op.key, "operation Failed");
                }
            }
            result
        })
    }
}

fn current_version() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Top-level sync controller: the surface the host application calls into.
pub struct SyncController<A: RemoteAdapter + 'static, L: LocalStore + 'static, I: IdentityProvider + 'static> {
    storage: Arc<L>,
    remote: Arc<RemoteStore<A, I>>,
    metadata: Arc<MetadataManager<A, L>>,
    repo: Arc<OperationRepo>,
    config: GanonConfig,
    sync_in_progress: AtomicBool,
    interval_handle: Mutex<Option<JoinHandle<()>>>,
}

impl<A: RemoteAdapter + 'static, L: LocalStore + 'static, I: IdentityProvider + 'static>
    SyncController<A, L, I>
{
    pub async fn new(
        storage: Arc<L>,
        adapter: Arc<A>,
        identity: Arc<I>,
        config: GanonConfig,
    ) -> Result<Arc<Self>> {
        config.cloud_config.validate()?;
        let uid = identity.current_user().await.ok_or_else(|| {
            Error::SyncConfigurationError("cannot start controller: no signed-in user".into())
        })?;

        let local_metadata = Arc::new(LocalMetadata::load(storage.clone()).await?);
        let metadata = Arc::new(MetadataManager::new(
            config.cloud_config.clone(),
            local_metadata,
            adapter.clone(),
            &uid,
            config.conflict_resolution_config.strategy,
        ));
        let remote = Arc::new(RemoteStore::new(adapter, identity, config.cloud_config.clone()));
        let repo = Arc::new(OperationRepo::new(config.conflict_resolution_config.max_retries));

        let controller = Arc::new(Self {
            storage,
            remote,
            metadata,
            repo,
            config,
            sync_in_progress: AtomicBool::new(false),
            interval_handle: Mutex::new(None),
        });

        if controller.config.auto_start_sync {
            if let Some(interval) = controller.config.sync_interval {
                controller.clone().start_sync_interval(interval).await;
            }
        }

        Ok(controller)
    }

    fn executor(&self) -> ControllerExecutor<A, L, I> {
        ControllerExecutor {
            remote: self.remote.clone(),
            metadata: self.metadata.clone(),
        }
    }

    /// Marks `key` as having a new value that needs to reach the remote.
    pub async fn mark_as_pending(&self, key: &str, value: serde_json::Value) -> Result<()> {
        self.repo.enqueue(SyncOperation::set(key, value)).await;
        Ok(())
    }

    /// Marks `key` as deleted.
    pub async fn mark_as_deleted(&self, key: &str) -> Result<()> {
        self.repo.enqueue(SyncOperation::delete(key)).await;
        Ok(())
    }

    /// Drains and runs every currently-queued operation. Single-flight: a
    /// call that arrives while one is already running returns immediately
    /// without starting a second pass.
    pub async fn sync_pending(&self) -> Result<Vec<OperationResult>> {
        if self
            .sync_in_progress
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Ok(Vec::new());
        }
        let _guard = SyncGuard(&self.sync_in_progress);

        let executor = self.executor();
        let results = self.repo.process_operations(&executor).await;
        let succeeded = results.iter().filter(|r| r.success).count();
        tracing::info!(succeeded, failed = results.len() - succeeded, "syncPending complete");
        if succeeded > 0 {
            self.stamp_last_backup().await?;
        }
        Ok(results)
    }

    /// Requests a full resync of every key the schema knows about,
    /// queuing a `Set` for each key currently present in local storage and
    /// a `Delete` for keys local storage no longer has.
    pub async fn sync_all(&self) -> Result<Vec<OperationResult>> {
        let local_keys = self.storage.keys().await?;
        for key in &local_keys {
            if let Some(value) = self.storage.get(key).await? {
                self.mark_as_pending(key, value).await?;
            }
        }
        self.sync_pending().await
    }

    /// Pulls the remote value for every key in the schema (or just `keys`,
    /// if given) back into local storage for keys that `needsHydration`,
    /// resolving conflicts with `conflict_strategy` if given, or
    /// [`GanonConfig::conflict_resolution_config`] otherwise.
    pub async fn hydrate(
        &self,
        keys: Option<&[String]>,
        conflict_strategy: Option<ConflictStrategy>,
        integrity_config: Option<IntegrityFailureConfig>,
    ) -> Result<()> {
        let target_keys: Vec<String> = match keys {
            Some(k) => k.to_vec(),
            None => self.all_schema_keys(),
        };

        for key in target_keys {
            self.hydrate_one(&key, conflict_strategy, integrity_config).await?;
        }
        Ok(())
    }

    /// Forces hydration of every key in `keys`, invalidating each one's
    /// coordinator cache first and ignoring `needsHydration`, with conflict
    /// resolution and integrity-check retries governed by
    /// `conflict_strategy`/`integrity_config` if given, or this
    /// controller's configured defaults otherwise.
    pub async fn force_hydrate(
        &self,
        keys: &[String],
        conflict_strategy: Option<ConflictStrategy>,
        integrity_config: Option<IntegrityFailureConfig>,
    ) -> Result<()> {
        for key in keys {
            self.metadata.invalidate_cache(key).await?;
            self.hydrate_with_integrity_check(key, conflict_strategy, integrity_config)
                .await?;
        }
        Ok(())
    }

    fn all_schema_keys(&self) -> Vec<String> {
        self.config
            .cloud_config
            .documents()
            .flat_map(|(_, doc)| {
                doc.doc_keys
                    .iter()
                    .chain(doc.subcollection_keys.iter())
                    .cloned()
            })
            .collect()
    }

    async fn hydrate_one(
        &self,
        key: &str,
        conflict_strategy: Option<ConflictStrategy>,
        integrity_config: Option<IntegrityFailureConfig>,
    ) -> Result<()> {
        if !self.metadata.needs_hydration(key).await? {
            return Ok(());
        }
        self.hydrate_with_integrity_check(key, conflict_strategy, integrity_config)
            .await
    }

    async fn hydrate_with_integrity_check(
        &self,
        key: &str,
        conflict_strategy: Option<ConflictStrategy>,
        integrity_config: Option<IntegrityFailureConfig>,
    ) -> Result<()> {
        let local_before = self.metadata.local_only(key).await;
        let reconciled = self.metadata.hydrate_metadata(key, conflict_strategy).await?;

        if reconciled.digest == local_before.digest {
            // No conflict, or the conflict resolved to Local: the value
            // already on local storage is authoritative, nothing to pull.
            self.metadata.update_sync_status(key, SyncStatus::Synced).await?;
            return Ok(());
        }

        let integrity = integrity_config.unwrap_or(self.config.integrity_failure_config);
        // Skip re-checks a value once more than the other strategies: a
        // single extra pass costs little and avoids permanently masking a
        // mismatch that would otherwise resolve itself after one retry.
        let max_attempts = if integrity.recovery_strategy == IntegrityRecoveryStrategy::Skip {
            integrity.max_attempts + 1
        } else {
            integrity.max_attempts
        };

        let mut attempts = 0;
        loop {
            attempts += 1;
            let remote_value = self.remote.fetch(key).await?;
            let computed = hash::digest(remote_value.as_ref(), None);

            if remote_value.is_none() || computed == reconciled.digest {
                if let Some(value) = remote_value {
                    self.storage.set(key, value).await?;
                }
                self.metadata.update_sync_status(key, SyncStatus::Synced).await?;
                return Ok(());
            }

            if attempts >= max_attempts {
                return match integrity.recovery_strategy {
                    IntegrityRecoveryStrategy::ForceRefresh | IntegrityRecoveryStrategy::UseRemote => {
                        if let Some(value) = remote_value {
                            self.storage.set(key, value).await?;
                        }
                        Ok(())
                    }
                    IntegrityRecoveryStrategy::UseLocal | IntegrityRecoveryStrategy::Skip => Ok(()),
                };
            }
        }
    }

    /// Restores local storage entirely from remote state for every
    /// schema-declared key, overwriting local values unconditionally.
    pub async fn restore(&self) -> Result<()> {
        for (_, doc) in self.config.cloud_config.documents() {
            for key in doc.doc_keys.iter().chain(doc.subcollection_keys.iter()) {
                if let Some(value) = self.remote.fetch(key).await? {
                    self.storage.set(key, value).await?;
                }
            }
        }
        Ok(())
    }

    async fn stamp_last_backup(&self) -> Result<()> {
        self.storage
            .set(LAST_BACKUP_KEY, serde_json::json!(current_version()))
            .await
    }

    /// Starts (or restarts) the autosync timer.
    pub async fn start_sync_interval(self: Arc<Self>, interval: std::time::Duration) {
        self.stop_sync_interval().await;
        let this = self.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                let _ = this.sync_pending().await;
            }
        });
        *self.interval_handle.lock().await = Some(handle);
    }

    /// Stops the autosync timer if one is running. Idempotent.
    pub async fn stop_sync_interval(&self) {
        if let Some(handle) = self.interval_handle.lock().await.take() {
            handle.abort();
        }
    }
}

/// RAII guard clearing the single-flight flag on drop, including on an
/// early return or panic inside `sync_pending`.
struct SyncGuard<'a>(&'a AtomicBool);

impl Drop for SyncGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}
