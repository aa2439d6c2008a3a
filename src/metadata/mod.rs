//! The metadata plane: per-key local sync metadata (C7), per-document
//! remote metadata caching (C8), and key-to-document routing (C9).

pub mod coordinator;
pub mod local;
pub mod manager;

use serde::{Deserialize, Serialize};

/// The reserved field name under which a document's per-key metadata map
/// is stored on the document itself.
pub const REMOTE_METADATA_FIELD: &str = "__remote_metadata__";

/// A single key's remote-side digest/version pair, as cached from the
/// document's `__remote_metadata__` field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteMetadataRecord {
    #[serde(rename = "d")]
    pub digest: String,
    #[serde(rename = "v")]
    pub version: u64,
}
