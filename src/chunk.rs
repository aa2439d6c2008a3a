//! C5: transparent chunking of oversize values across multiple documents.
//!
//! A value under a subcollection key is written either as a single
//! document (named after the key) when it fits comfortably inside one
//! document, or split across `chunk_0`, `chunk_1`, ... documents when it
//! does not. Reads transparently reassemble whichever shape is on disk.

use crate::adapter::{AdapterResult, CollectionRef, RemoteAdapter};
use crate::error::Result;
use serde_json::{Map, Value};

/// Above this serialized size, a value is split into chunks rather than
/// written as one document.
const CHUNK_SIZE_THRESHOLD_BYTES: usize = 500_000;
/// Elements (array) / fields (object) per chunk.
const CHUNK_ENTRY_COUNT: usize = 250;

fn chunk_doc_name(index: usize) -> String {
    format!("chunk_{index}")
}

fn is_chunk_doc(id: &str) -> Option<usize> {
    id.strip_prefix("chunk_").and_then(|n| n.parse().ok())
}

/// Splits `value` into an ordered list of chunk bodies. Arrays are split by
/// position into objects keyed by stringified original index (so a flat
/// overlay merge of all chunk bodies, regardless of chunk order, still
/// recovers the right index -> element mapping); objects are split by
/// (sorted) key, preserving the original keys, so the split is
/// deterministic across runs.
fn split_into_chunks(value: &Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items
            .iter()
            .enumerate()
            .collect::<Vec<_>>()
            .chunks(CHUNK_ENTRY_COUNT)
            .map(|slice| {
                let mut chunk = Map::new();
                for (i, v) in slice {
                    chunk.insert(i.to_string(), (*v).clone());
                }
                Value::Object(chunk)
            })
            .collect(),
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            keys.chunks(CHUNK_ENTRY_COUNT)
                .map(|slice| {
                    let mut chunk = Map::new();
                    for k in slice {
                        chunk.insert((*k).clone(), map[*k].clone());
                    }
                    Value::Object(chunk)
                })
                .collect()
        }
        other => vec![other.clone()],
    }
}

/// Merges ordered chunk bodies back into one value: chunk bodies overlay
/// into one map in ascending index order, then, if every resulting key
/// parses as a number, the map is reinterpreted as an ordered array
/// (§3's chunking representation); otherwise the merged map is returned
/// as-is. A lone non-object chunk is a value that was written whole under
/// `chunk_0` (too large to fit a single document but not itself splittable
/// into a collection), so it passes through unchanged.
fn merge_chunks(chunks: Vec<Value>) -> Value {
    if chunks.len() == 1 && !matches!(chunks[0], Value::Object(_)) {
        return chunks.into_iter().next().unwrap_or(Value::Null);
    }

    let mut merged = Map::new();
    for chunk in chunks {
        if let Value::Object(map) = chunk {
            merged.extend(map);
        }
    }

    if !merged.is_empty() && merged.keys().all(|k| k.parse::<usize>().is_ok()) {
        let mut entries: Vec<(usize, Value)> = merged
            .into_iter()
            .map(|(k, v)| (k.parse::<usize>().unwrap(), v))
            .collect();
        entries.sort_by_key(|(index, _)| *index);
        Value::Array(entries.into_iter().map(|(_, v)| v).collect())
    } else {
        Value::Object(merged)
    }
}

/// Writes `value` under `key` within `collection`, chunking it if needed.
/// When a write would produce more than one chunk document, all chunk
/// writes go through a single atomic batch.
pub async fn write_chunked(
    adapter: &dyn RemoteAdapter,
    collection: &CollectionRef,
    key: &str,
    value: &Value,
) -> Result<()> {
    let serialized_len = serde_json::to_string(value).map(|s| s.len()).unwrap_or(0);

    if serialized_len < CHUNK_SIZE_THRESHOLD_BYTES {
        delete_stale_chunks(adapter, collection, key).await?;
        adapter
            .set_document(&collection.doc(key), value.clone(), false)
            .await
            .map_err(Into::into)
    } else {
        let mut chunks = split_into_chunks(value);
        if chunks.len() <= 1 {
            let body = chunks.pop().unwrap_or_else(|| value.clone());
            adapter
                .set_document(&collection.doc(&chunk_doc_name(0)), body, false)
                .await
                .map_err(Into::into)
        } else {
            let mut batch = adapter.write_batch();
            for (i, chunk) in chunks.into_iter().enumerate() {
                batch.set(&collection.doc(&chunk_doc_name(i)), chunk, false);
            }
            run_commit(batch).await
        }
    }
}

async fn run_commit(batch: Box<dyn crate::adapter::WriteBatch>) -> Result<()> {
    batch.commit().await.map_err(Into::into)
}

/// If a key was previously chunked but is now small enough to fit in one
/// document, clears out any leftover `chunk_i` documents so a read doesn't
/// see stale fragments alongside the new single document.
async fn delete_stale_chunks(
    adapter: &dyn RemoteAdapter,
    collection: &CollectionRef,
    key: &str,
) -> Result<()> {
    let existing: AdapterResult<Vec<(String, Value)>> = adapter.get_collection(collection).await;
    let existing = existing.map_err(Into::<crate::error::Error>::into)?;
    let stale: Vec<&String> = existing
        .iter()
        .map(|(id, _)| id)
        .filter(|id| is_chunk_doc(id).is_some())
        .collect();
    if stale.is_empty() {
        return Ok(());
    }
    let mut batch = adapter.write_batch();
    for id in stale {
        batch.delete(&collection.doc(id));
    }
    let _ = key;
    run_commit(batch).await
}

/// Reads back whatever is stored under `key` within `collection`,
/// reassembling chunk documents in index order if present.
pub async fn read_chunked(
    adapter: &dyn RemoteAdapter,
    collection: &CollectionRef,
    key: &str,
) -> Result<Option<Value>> {
    let docs = adapter
        .get_collection(collection)
        .await
        .map_err(Into::<crate::error::Error>::into)?;

    let mut chunk_docs: Vec<(usize, Value)> = docs
        .iter()
        .filter_map(|(id, body)| is_chunk_doc(id).map(|idx| (idx, body.clone())))
        .collect();

    if !chunk_docs.is_empty() {
        chunk_docs.sort_by_key(|(idx, _)| *idx);
        let bodies: Vec<Value> = chunk_docs.into_iter().map(|(_, body)| body).collect();
        return Ok(Some(merge_chunks(bodies)));
    }

    Ok(docs
        .into_iter()
        .find(|(id, _)| id == key)
        .map(|(_, body)| body))
}

/// Deletes every document under `key`'s subcollection.
pub async fn delete_chunked(
    adapter: &dyn RemoteAdapter,
    collection: &CollectionRef,
    key: &str,
) -> Result<()> {
    let docs = adapter
        .get_collection(collection)
        .await
        .map_err(Into::<crate::error::Error>::into)?;
    let relevant: Vec<&String> = docs
        .iter()
        .map(|(id, _)| id)
        .filter(|id| is_chunk_doc(id).is_some() || *id == key)
        .collect();
    if relevant.is_empty() {
        return Ok(());
    }
    let mut batch = adapter.write_batch();
    for id in relevant {
        batch.delete(&collection.doc(id));
    }
    run_commit(batch).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_array_by_entry_count() {
        let items: Vec<Value> = (0..(CHUNK_ENTRY_COUNT * 2 + 3)).map(Value::from).collect();
        let chunks = split_into_chunks(&Value::Array(items));
        assert_eq!(chunks.len(), 3);
    }

    #[test]
    fn split_object_by_sorted_keys() {
        let mut map = Map::new();
        for i in 0..(CHUNK_ENTRY_COUNT + 1) {
            map.insert(format!("k{i:04}"), Value::from(i));
        }
        let chunks = split_into_chunks(&Value::Object(map));
        assert_eq!(chunks.len(), 2);
    }

    #[test]
    fn array_chunk_bodies_are_numeric_keyed_objects() {
        let items: Vec<Value> = (0..(CHUNK_ENTRY_COUNT + 1)).map(Value::from).collect();
        let chunks = split_into_chunks(&Value::Array(items));
        assert_eq!(chunks.len(), 2);
        let first = chunks[0].as_object().expect("array chunk body is an object");
        assert_eq!(first.get("0"), Some(&Value::from(0)));
        assert_eq!(first.get("249"), Some(&Value::from(249)));
        let second = chunks[1].as_object().expect("array chunk body is an object");
        assert_eq!(second.get("250"), Some(&Value::from(250)));
    }

    #[test]
    fn merge_array_chunks_preserves_order() {
        let mut first = Map::new();
        first.insert("0".into(), Value::from(1));
        first.insert("1".into(), Value::from(2));
        let mut second = Map::new();
        second.insert("2".into(), Value::from(3));
        let merged = merge_chunks(vec![Value::Object(first), Value::Object(second)]);
        assert_eq!(merged, Value::Array(vec![1.into(), 2.into(), 3.into()]));
    }

    #[test]
    fn merge_object_chunks_combines_keys() {
        let mut a = Map::new();
        a.insert("x".into(), Value::from(1));
        let mut b = Map::new();
        b.insert("y".into(), Value::from(2));
        let merged = merge_chunks(vec![Value::Object(a), Value::Object(b)]);
        assert_eq!(merged["x"], Value::from(1));
        assert_eq!(merged["y"], Value::from(2));
    }

    #[test]
    fn split_then_merge_roundtrips_large_array() {
        let items: Vec<Value> = (0..1000).map(Value::from).collect();
        let original = Value::Array(items);
        let chunks = split_into_chunks(&original);
        assert_eq!(merge_chunks(chunks), original);
    }

    #[test]
    fn chunk_doc_naming() {
        assert_eq!(chunk_doc_name(0), "chunk_0");
        assert_eq!(is_chunk_doc("chunk_12"), Some(12));
        assert_eq!(is_chunk_doc("not_a_chunk"), None);
    }
}
