//! Engine configuration (`GanonConfig`).
//!
//! Constructed by the host application and passed in, mirroring how the
//! rest of this engine takes its configuration as constructor arguments
//! rather than reading environment variables itself.

use crate::conflict::ConflictStrategy;
use crate::schema::Schema;
use std::time::Duration;

/// What to do when the locally recomputed digest disagrees with the
/// remote's cached digest after a hydration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntegrityRecoveryStrategy {
    /// Refetch the remote value and recompute once more.
    ForceRefresh,
    /// Keep the local value, mark it synced, move on.
    UseLocal,
    /// Overwrite the local value with the remote one.
    UseRemote,
    /// Leave the key's status untouched and stop retrying it this pass.
    Skip,
}

/// Bounds how many times an integrity mismatch is retried before the
/// configured recovery strategy is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntegrityFailureConfig {
    pub max_attempts: u32,
    pub recovery_strategy: IntegrityRecoveryStrategy,
}

impl Default for IntegrityFailureConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            recovery_strategy: IntegrityRecoveryStrategy::ForceRefresh,
        }
    }
}

/// How many times a sync operation is retried and which conflict strategy
/// governs hydration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConflictResolutionConfig {
    pub strategy: ConflictStrategy,
    pub max_retries: u32,
}

impl Default for ConflictResolutionConfig {
    fn default() -> Self {
        Self {
            strategy: ConflictStrategy::LastModifiedWins,
            max_retries: 3,
        }
    }
}

/// Top-level engine configuration.
#[derive(Debug, Clone)]
pub struct GanonConfig {
    /// The local key holding the current user's identifier. Consulted by
    /// [`crate::collaborators::LocalStoreIdentityProvider`] when the host
    /// wants the engine's own `LocalStore` to answer "who is signed in"
    /// rather than supplying a bespoke [`crate::collaborators::IdentityProvider`].
    /// Empty by default - hosts that pass their own identity provider to
    /// [`crate::controller::SyncController::new`] never consult this field.
    pub identifier_key: String,
    pub cloud_config: Schema,
    pub sync_interval: Option<Duration>,
    pub auto_start_sync: bool,
    pub remote_readonly: bool,
    pub conflict_resolution_config: ConflictResolutionConfig,
    pub integrity_failure_config: IntegrityFailureConfig,
}

impl GanonConfig {
    pub fn new(cloud_config: Schema) -> Self {
        Self {
            identifier_key: String::new(),
            cloud_config,
            sync_interval: None,
            auto_start_sync: false,
            remote_readonly: false,
            conflict_resolution_config: ConflictResolutionConfig::default(),
            integrity_failure_config: IntegrityFailureConfig::default(),
        }
    }

    pub fn with_identifier_key(mut self, identifier_key: impl Into<String>) -> Self {
        self.identifier_key = identifier_key.into();
        self
    }

    pub fn with_sync_interval(mut self, interval: Duration) -> Self {
        self.sync_interval = Some(interval);
        self
    }

    pub fn with_auto_start_sync(mut self, auto_start: bool) -> Self {
        self.auto_start_sync = auto_start;
        self
    }

    pub fn with_remote_readonly(mut self, readonly: bool) -> Self {
        self.remote_readonly = readonly;
        self
    }

    pub fn with_conflict_resolution(mut self, config: ConflictResolutionConfig) -> Self {
        self.conflict_resolution_config = config;
        self
    }

    pub fn with_integrity_failure_config(mut self, config: IntegrityFailureConfig) -> Self {
        self.integrity_failure_config = config;
        self
    }
}
