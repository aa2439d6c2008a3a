//! External collaborator traits the host application supplies.
//!
//! Neither the concrete local key/value persistence primitive nor user
//! identity/login is in scope for this engine; it only depends on these
//! two narrow capability traits, in the same "depend on the interface, not
//! the implementation" spirit as the remote adapter split (C2).

use crate::error::Result;
use async_trait::async_trait;
use serde_json::Value;

/// Local key/value persistence. Implemented by the host application over
/// whatever on-device storage it already uses (SQLite, a file, a platform
/// preferences API, ...).
#[async_trait]
pub trait LocalStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Value>>;
    async fn set(&self, key: &str, value: Value) -> Result<()>;
    async fn delete(&self, key: &str) -> Result<()>;
    async fn keys(&self) -> Result<Vec<String>>;
}

/// Supplies the identifier of the currently logged-in user, or `None` when
/// signed out. The engine scopes every remote document under this id and
/// refuses to sync while it is absent.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn current_user(&self) -> Option<String>;
}

/// An [`IdentityProvider`] backed by a string value already held in the
/// engine's own [`LocalStore`], under the key named by
/// [`crate::config::GanonConfig::identifier_key`]. A convenience for hosts
/// that already write the signed-in user's id into local storage rather
/// than tracking it separately.
pub struct LocalStoreIdentityProvider<S: LocalStore> {
    store: std::sync::Arc<S>,
    identifier_key: String,
}

impl<S: LocalStore> LocalStoreIdentityProvider<S> {
    pub fn new(store: std::sync::Arc<S>, identifier_key: impl Into<String>) -> Self {
        Self {
            store,
            identifier_key: identifier_key.into(),
        }
    }
}

#[async_trait]
impl<S: LocalStore> IdentityProvider for LocalStoreIdentityProvider<S> {
    async fn current_user(&self) -> Option<String> {
        match self.store.get(&self.identifier_key).await {
            Ok(Some(Value::String(uid))) => Some(uid),
            _ => None,
        }
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use std::sync::Mutex;

    /// A trivial in-memory [`LocalStore`] used across the crate's own tests.
    pub struct InMemoryStore {
        data: Mutex<std::collections::BTreeMap<String, Value>>,
    }

    impl InMemoryStore {
        pub fn new() -> Self {
            Self {
                data: Mutex::new(std::collections::BTreeMap::new()),
            }
        }
    }

    impl Default for InMemoryStore {
        fn default() -> Self {
            Self::new()
        }
    }

    #[async_trait]
    impl LocalStore for InMemoryStore {
        async fn get(&self, key: &str) -> Result<Option<Value>> {
            Ok(self.data.lock().unwrap().get(key).cloned())
        }

        async fn set(&self, key: &str, value: Value) -> Result<()> {
            self.data.lock().unwrap().insert(key.to_string(), value);
            Ok(())
        }

        async fn delete(&self, key: &str) -> Result<()> {
            self.data.lock().unwrap().remove(key);
            Ok(())
        }

        async fn keys(&self) -> Result<Vec<String>> {
            Ok(self.data.lock().unwrap().keys().cloned().collect())
        }
    }

    /// A fixed-identity provider for tests.
    pub struct FixedIdentity(pub Option<String>);

    #[async_trait]
    impl IdentityProvider for FixedIdentity {
        async fn current_user(&self) -> Option<String> {
            self.0.clone()
        }
    }

    #[tokio::test]
    async fn local_store_identity_provider_reads_configured_key() {
        let store = std::sync::Arc::new(InMemoryStore::new());
        store.set("auth.uid", Value::String("u1".into())).await.unwrap();
        let identity = LocalStoreIdentityProvider::new(store, "auth.uid");
        assert_eq!(identity.current_user().await, Some("u1".to_string()));
    }

    #[tokio::test]
    async fn local_store_identity_provider_is_none_when_key_missing() {
        let store = std::sync::Arc::new(InMemoryStore::new());
        let identity = LocalStoreIdentityProvider::new(store, "auth.uid");
        assert_eq!(identity.current_user().await, None);
    }

    #[tokio::test]
    async fn in_memory_store_roundtrips() {
        let store = InMemoryStore::new();
        assert_eq!(store.get("k").await.unwrap(), None);
        store.set("k", serde_json::json!(1)).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some(serde_json::json!(1)));
        store.delete("k").await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), None);
    }
}
