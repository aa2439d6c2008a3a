//! C9: routes per-key metadata operations to the coordinator owning that
//! key's document.

use crate::adapter::{DocRef, RemoteAdapter};
use crate::collaborators::LocalStore;
use crate::conflict::ConflictStrategy;
use crate::error::{Error, Result};
use crate::metadata::coordinator::Coordinator;
use crate::metadata::local::{LocalMetadata, LocalSyncMetadata, SyncStatus};
use crate::metadata::RemoteMetadataRecord;
use crate::schema::Schema;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Builds and owns one [`Coordinator`] per document declared in the
/// schema, and routes key-level operations to the right one.
pub struct MetadataManager<A: RemoteAdapter + 'static, S: LocalStore + 'static> {
    schema: Schema,
    local: Arc<LocalMetadata<S>>,
    coordinators: BTreeMap<String, Arc<Coordinator<A, S>>>,
}

impl<A: RemoteAdapter + 'static, S: LocalStore + 'static> MetadataManager<A, S> {
    pub fn new(
        schema: Schema,
        local: Arc<LocalMetadata<S>>,
        adapter: Arc<A>,
        uid: &str,
        strategy: ConflictStrategy,
    ) -> Self {
        let mut coordinators = BTreeMap::new();
        for (doc_name, _) in schema.documents() {
            let doc = DocRef(format!("users/{uid}/backup/{doc_name}"));
            coordinators.insert(
                doc_name.clone(),
                Coordinator::new(doc, adapter.clone(), local.clone(), strategy),
            );
        }
        Self {
            schema,
            local,
            coordinators,
        }
    }

    fn coordinator_for(&self, key: &str) -> Result<&Arc<Coordinator<A, S>>> {
        let (doc_name, _) = self.schema.document_for_key(key).ok_or_else(|| {
            Error::SyncValidationError(format!("key '{key}' is not declared in the cloud schema"))
        })?;
        self.coordinators.get(doc_name).ok_or_else(|| {
            Error::SyncConfigurationError(format!("no coordinator registered for document '{doc_name}'"))
        })
    }

    /// Reads `key`'s local metadata without reconciling it against the
    /// remote cache - the pre-conflict-resolution view.
    pub async fn local_only(&self, key: &str) -> LocalSyncMetadata {
        self.local.get(key).await
    }

    pub async fn hydrate_metadata(
        &self,
        key: &str,
        strategy_override: Option<ConflictStrategy>,
    ) -> Result<LocalSyncMetadata> {
        let local = self.local.get(key).await;
        let coordinator = self.coordinator_for(key)?;
        coordinator.ensure_consistency(key, &local, strategy_override).await
    }

    pub async fn needs_hydration(&self, key: &str) -> Result<bool> {
        let local = self.local.get(key).await;
        self.coordinator_for(key)?.needs_hydration(key, &local).await
    }

    pub async fn get_remote_metadata_only(&self, key: &str) -> Result<Option<RemoteMetadataRecord>> {
        self.coordinator_for(key)?.get_remote_metadata(key).await
    }

    /// Applies a locally-computed digest/version to both the local store
    /// and the owning coordinator's cache.
    pub async fn set(&self, key: &str, digest: String, version: u64) -> Result<()> {
        self.local
            .set(
                key,
                LocalSyncMetadata {
                    digest: digest.clone(),
                    version,
                    sync_status: SyncStatus::Pending,
                },
            )
            .await?;
        self.coordinator_for(key)?
            .update_local_metadata(key, RemoteMetadataRecord { digest, version }, true)
            .await
    }

    pub async fn update_sync_status(&self, key: &str, status: SyncStatus) -> Result<()> {
        self.local.update_sync_status(key, status).await
    }

    pub async fn ensure_consistency(&self, key: &str) -> Result<LocalSyncMetadata> {
        self.hydrate_metadata(key, None).await
    }

    pub async fn invalidate_cache(&self, key: &str) -> Result<()> {
        self.coordinator_for(key)?.invalidate_cache().await;
        Ok(())
    }

    pub async fn cancel_pending_operations(&self) {
        for coordinator in self.coordinators.values() {
            coordinator.cancel_pending_operations().await;
        }
    }
}
