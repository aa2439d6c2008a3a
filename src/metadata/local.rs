//! C7: per-key local sync metadata.
//!
//! The single reserved local-storage key holding the full `key -> {d,v,s}`
//! map. The map is the in-memory cache; [`LocalMetadata::persist`] is the
//! only place that writes it back through the [`LocalStore`] collaborator.

use crate::collaborators::LocalStore;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// The reserved local-storage key under which the metadata map is kept.
pub const LOCAL_METADATA_STORAGE_KEY: &str = "__ganon_local_metadata__";

/// Where a key's last known sync attempt landed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SyncStatus {
    Synced,
    Pending,
    InProgress,
    Failed,
}

/// Per-key sync metadata: content digest, monotonic version, and status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalSyncMetadata {
    pub digest: String,
    pub version: u64,
    pub sync_status: SyncStatus,
}

impl Default for LocalSyncMetadata {
    fn default() -> Self {
        Self {
            digest: String::new(),
            version: 0,
            sync_status: SyncStatus::Synced,
        }
    }
}

/// Local metadata store: loads the reserved key once, then serves reads
/// from memory and persists every mutation back through `storage`.
pub struct LocalMetadata<S: LocalStore> {
    storage: Arc<S>,
    records: RwLock<BTreeMap<String, LocalSyncMetadata>>,
}

impl<S: LocalStore> LocalMetadata<S> {
    pub async fn load(storage: Arc<S>) -> Result<Self> {
        let records = match storage.get(LOCAL_METADATA_STORAGE_KEY).await? {
            Some(value) => serde_json::from_value(value).unwrap_or_default(),
            None => BTreeMap::new(),
        };
        Ok(Self {
            storage,
            records: RwLock::new(records),
        })
    }

    pub async fn get(&self, key: &str) -> LocalSyncMetadata {
        self.records
            .read()
            .await
            .get(key)
            .cloned()
            .unwrap_or_default()
    }

    pub async fn has(&self, key: &str) -> bool {
        self.records.read().await.contains_key(key)
    }

    /// Replaces the metadata for `key` and persists the whole map.
    pub async fn set(&self, key: &str, record: LocalSyncMetadata) -> Result<()> {
        self.records
            .write()
            .await
            .insert(key.to_string(), record);
        self.persist().await
    }

    /// Updates only the sync status, preserving digest and version.
    pub async fn update_sync_status(&self, key: &str, status: SyncStatus) -> Result<()> {
        {
            let mut records = self.records.write().await;
            let entry = records.entry(key.to_string()).or_default();
            entry.sync_status = status;
        }
        self.persist().await
    }

    pub async fn remove(&self, key: &str) -> Result<()> {
        self.records.write().await.remove(key);
        self.persist().await
    }

    pub async fn clear(&self) -> Result<()> {
        self.records.write().await.clear();
        self.persist().await
    }

    pub async fn keys(&self) -> Vec<String> {
        self.records.read().await.keys().cloned().collect()
    }

    async fn persist(&self) -> Result<()> {
        let snapshot = self.records.read().await;
        let value = serde_json::to_value(&*snapshot).unwrap_or(serde_json::Value::Null);
        drop(snapshot);
        self.storage.set(LOCAL_METADATA_STORAGE_KEY, value).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::tests::InMemoryStore;

    #[tokio::test]
    async fn get_missing_key_returns_default() {
        let metadata = LocalMetadata::load(Arc::new(InMemoryStore::new()))
            .await
            .unwrap();
        let record = metadata.get("missing").await;
        assert_eq!(record, LocalSyncMetadata::default());
        assert!(!metadata.has("missing").await);
    }

    #[tokio::test]
    async fn set_then_get_roundtrips() {
        let metadata = LocalMetadata::load(Arc::new(InMemoryStore::new()))
            .await
            .unwrap();
        metadata
            .set(
                "k",
                LocalSyncMetadata {
                    digest: "abc".into(),
                    version: 1,
                    sync_status: SyncStatus::Pending,
                },
            )
            .await
            .unwrap();
        assert!(metadata.has("k").await);
        assert_eq!(metadata.get("k").await.digest, "abc");
    }

    #[tokio::test]
    async fn update_status_preserves_digest_and_version() {
        let metadata = LocalMetadata::load(Arc::new(InMemoryStore::new()))
            .await
            .unwrap();
        metadata
            .set(
                "k",
                LocalSyncMetadata {
                    digest: "abc".into(),
                    version: 7,
                    sync_status: SyncStatus::Pending,
                },
            )
            .await
            .unwrap();
        metadata
            .update_sync_status("k", SyncStatus::Synced)
            .await
            .unwrap();
        let record = metadata.get("k").await;
        assert_eq!(record.digest, "abc");
        assert_eq!(record.version, 7);
        assert_eq!(record.sync_status, SyncStatus::Synced);
    }

    #[tokio::test]
    async fn persists_across_reload() {
        let storage = Arc::new(InMemoryStore::new());
        let metadata = LocalMetadata::load(storage.clone()).await.unwrap();
        metadata
            .set(
                "k",
                LocalSyncMetadata {
                    digest: "abc".into(),
                    version: 1,
                    sync_status: SyncStatus::Synced,
                },
            )
            .await
            .unwrap();

        let reloaded = LocalMetadata::load(storage).await.unwrap();
        assert_eq!(reloaded.get("k").await.digest, "abc");
    }

    #[tokio::test]
    async fn remove_and_clear() {
        let metadata = LocalMetadata::load(Arc::new(InMemoryStore::new()))
            .await
            .unwrap();
        metadata
            .set("a", LocalSyncMetadata::default())
            .await
            .unwrap();
        metadata
            .set("b", LocalSyncMetadata::default())
            .await
            .unwrap();
        metadata.remove("a").await.unwrap();
        assert!(!metadata.has("a").await);
        assert!(metadata.has("b").await);
        metadata.clear().await.unwrap();
        assert!(!metadata.has("b").await);
    }
}
