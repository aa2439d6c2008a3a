//! # Ganon Sync Engine
//!
//! An offline-first key/value synchronization engine. It mirrors a typed
//! local key/value store to a remote, document-oriented cloud store owned
//! by a logged-in user.
//!
//! ## Design Principles
//!
//! - **Local-authoritative**: the local store is the source of truth;
//!   remote metadata is a cache that gets reconciled, never blindly trusted.
//! - **Deterministic digesting**: two semantically equal values always
//!   produce the same content digest, independent of field order.
//! - **Typed capability seams**: the concrete remote store, local
//!   persistence, and identity provider are all narrow traits supplied by
//!   the host application (see [`collaborators`]).
//!
//! ## Core Concepts
//!
//! - [`hash::digest`] - canonical content digest of a typed value (C1).
//! - [`adapter::RemoteAdapter`] - narrow document/collection/transaction/
//!   batch capability set consumed by the facade (C2).
//! - [`processor`] - sanitize/restore/validate values for remote storage (C3).
//! - [`resolver::ref_for`] - maps a logical key onto the cloud schema (C4).
//! - [`chunk`] - transparent chunking/reassembly of oversize values (C5).
//! - [`remote_store::RemoteStore`] - the `backup`/`fetch`/`delete` facade (C6).
//! - [`metadata::local::LocalMetadata`] - per-key digest/version/status (C7).
//! - [`metadata::coordinator::Coordinator`] - per-document remote metadata
//!   cache, batched flush, conflict resolution (C8).
//! - [`metadata::manager::MetadataManager`] - routes key operations to the
//!   coordinator owning that key's document (C9).
//! - [`operation`] - `Set`/`Delete` sync operations with retry/backoff (C10).
//! - [`repo::OperationRepo`] - per-key latest-operation queue (C11).
//! - [`controller::SyncController`] - mutation intake, batching, autosync,
//!   hydration (C12).
//!
//! ## Quick Start
//!
//! ```ignore
//! let config = GanonConfig::new(schema);
//! let controller = SyncController::new(storage, remote, identity, config);
//! controller.mark_as_pending("settings.theme").await?;
//! controller.sync_pending().await?;
//! ```

pub mod adapter;
pub mod chunk;
pub mod clock;
pub mod collaborators;
pub mod conflict;
pub mod config;
pub mod controller;
pub mod error;
pub mod hash;
pub mod metadata;
pub mod operation;
pub mod processor;
pub mod remote_store;
pub mod repo;
pub mod resolver;
pub mod schema;

pub use adapter::{AdapterError, AdapterErrorCode, CollectionRef, DocRef, RemoteAdapter};
pub use clock::{Clock, SystemClock};
pub use collaborators::{IdentityProvider, LocalStore, LocalStoreIdentityProvider};
pub use conflict::ConflictStrategy;
pub use config::{ConflictResolutionConfig, GanonConfig, IntegrityFailureConfig};
pub use controller::SyncController;
pub use error::{Error, Result};
pub use metadata::local::{LocalSyncMetadata, SyncStatus};
pub use metadata::manager::MetadataManager;
pub use schema::{KeyKind, Schema};

/// Key identifiers live in a flat logical key space, not per-collection ids.
pub type Key = String;
/// User identifier as surfaced by the [`IdentityProvider`].
pub type Uid = String;
/// Monotonic version / timestamp associated with a key's metadata.
pub type Version = u64;
/// Milliseconds since epoch.
pub type Timestamp = u64;
