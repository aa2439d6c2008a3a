//! C4: resolves a logical key onto a remote reference + storage kind.

use crate::adapter::{CollectionRef, DocRef};
use crate::error::{Error, Result};
use crate::schema::{KeyKind, Schema};

/// Either half of the remote target a key maps onto.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefTarget {
    Doc(DocRef),
    Collection(CollectionRef),
}

/// The remote document root for a given user: `users/<uid>/backup`.
fn backup_root(uid: &str) -> String {
    format!("users/{uid}/backup")
}

/// Resolves `key` to its remote reference and storage kind, scoped under
/// the given user id.
///
/// Returns [`Error::SyncConfigurationError`] when `uid` is absent (no
/// logged-in user) and [`Error::SyncValidationError`] when the schema has
/// no document claiming `key`.
pub fn ref_for(schema: &Schema, uid: Option<&str>, key: &str) -> Result<(RefTarget, KeyKind)> {
    let uid = uid.ok_or_else(|| {
        Error::SyncConfigurationError("cannot resolve remote reference: no signed-in user".into())
    })?;

    let (doc_name, kind) = schema.document_for_key(key).ok_or_else(|| {
        Error::SyncValidationError(format!("key '{key}' is not declared in the cloud schema"))
    })?;

    let doc = DocRef(format!("{}/{}", backup_root(uid), doc_name));
    let target = match kind {
        KeyKind::Doc => RefTarget::Doc(doc),
        KeyKind::Collection => RefTarget::Collection(doc.child_collection(key)),
    };
    Ok((target, kind))
}
