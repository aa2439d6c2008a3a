//! Cloud schema: maps logical keys onto remote documents (`CloudConfig`).
//!
//! Every key in the engine's flat logical key space belongs to exactly one
//! remote document, either as a plain field on that document (`Doc`) or as
//! an entry in one of that document's subcollections (`Collection`). The
//! schema is supplied by the host application; the engine never infers it.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// How a key is stored under its owning document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyKind {
    /// Stored as a field directly on the document.
    Doc,
    /// Stored as a (possibly chunked) entry in a subcollection of the document.
    Collection,
}

/// The set of keys a single remote document is responsible for.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentSchema {
    pub doc_keys: BTreeSet<String>,
    pub subcollection_keys: BTreeSet<String>,
}

impl DocumentSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_doc_keys(mut self, keys: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.doc_keys.extend(keys.into_iter().map(Into::into));
        self
    }

    pub fn with_subcollection_keys(
        mut self,
        keys: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.subcollection_keys
            .extend(keys.into_iter().map(Into::into));
        self
    }
}

/// Maps every logical key onto the document (and storage kind) that owns it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schema {
    documents: BTreeMap<String, DocumentSchema>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a document and the keys it owns.
    pub fn add_document(
        &mut self,
        name: impl Into<String>,
        document: DocumentSchema,
    ) -> &mut Self {
        self.documents.insert(name.into(), document);
        self
    }

    /// Builder-style variant of [`Schema::add_document`].
    pub fn with_document(mut self, name: impl Into<String>, document: DocumentSchema) -> Self {
        self.add_document(name, document);
        self
    }

    pub fn document(&self, name: &str) -> Option<&DocumentSchema> {
        self.documents.get(name)
    }

    pub fn documents(&self) -> impl Iterator<Item = (&String, &DocumentSchema)> {
        self.documents.iter()
    }

    /// Finds the document name and storage kind that owns `key`.
    pub fn document_for_key(&self, key: &str) -> Option<(&str, KeyKind)> {
        for (name, doc) in &self.documents {
            if doc.doc_keys.contains(key) {
                return Some((name.as_str(), KeyKind::Doc));
            }
            if doc.subcollection_keys.contains(key) {
                return Some((name.as_str(), KeyKind::Collection));
            }
        }
        None
    }

    /// Validates that no key is claimed by more than one document.
    pub fn validate(&self) -> Result<()> {
        let mut seen = BTreeSet::new();
        for (doc_name, doc) in &self.documents {
            for key in doc.doc_keys.iter().chain(doc.subcollection_keys.iter()) {
                if !seen.insert(key.clone()) {
                    return Err(Error::SyncConfigurationError(format!(
                        "key '{key}' is claimed by more than one document (duplicate in '{doc_name}')"
                    )));
                }
            }
        }
        Ok(())
    }
}
