//! Performance benchmarks for ganon-sync-engine: digest computation (C1)
//! and chunked remote writes/reads (C5) at increasing value sizes.

use async_trait::async_trait;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use ganon_sync_engine::adapter::{
    AdapterError, AdapterErrorCode, AdapterResult, BoxFuture, CollectionRef, DocRef, RemoteAdapter,
    Transaction, WriteBatch,
};
use ganon_sync_engine::schema::{DocumentSchema, Schema};
use ganon_sync_engine::{hash, processor, IdentityProvider};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

struct FakeAdapter {
    docs: Mutex<BTreeMap<String, Value>>,
}

impl FakeAdapter {
    fn new() -> Self {
        Self {
            docs: Mutex::new(BTreeMap::new()),
        }
    }
}

struct FakeBatch {
    docs: Arc<Mutex<BTreeMap<String, Value>>>,
}

#[async_trait]
impl WriteBatch for FakeBatch {
    fn set(&mut self, doc: &DocRef, data: Value, _merge: bool) {
        self.docs.lock().unwrap().insert(doc.0.clone(), data);
    }
    fn update(&mut self, doc: &DocRef, data: Value) {
        self.docs.lock().unwrap().insert(doc.0.clone(), data);
    }
    fn delete(&mut self, doc: &DocRef) {
        self.docs.lock().unwrap().remove(&doc.0);
    }
    async fn commit(self: Box<Self>) -> AdapterResult<()> {
        Ok(())
    }
}

#[async_trait]
impl RemoteAdapter for FakeAdapter {
    async fn get_document(&self, doc: &DocRef) -> AdapterResult<Option<Value>> {
        Ok(self.docs.lock().unwrap().get(&doc.0).cloned())
    }
    async fn set_document(&self, doc: &DocRef, data: Value, _merge: bool) -> AdapterResult<()> {
        self.docs.lock().unwrap().insert(doc.0.clone(), data);
        Ok(())
    }
    async fn update_document(&self, doc: &DocRef, data: Value) -> AdapterResult<()> {
        self.set_document(doc, data, true).await
    }
    async fn delete_document(&self, doc: &DocRef) -> AdapterResult<()> {
        self.docs.lock().unwrap().remove(&doc.0);
        Ok(())
    }
    async fn get_collection(&self, coll: &CollectionRef) -> AdapterResult<Vec<(String, Value)>> {
        let prefix = format!("{}/", coll.0);
        Ok(self
            .docs
            .lock()
            .unwrap()
            .iter()
            .filter_map(|(k, v)| k.strip_prefix(&prefix).map(|id| (id.to_string(), v.clone())))
            .collect())
    }
    fn write_batch(&self) -> Box<dyn WriteBatch> {
        Box::new(FakeBatch {
            docs: Arc::new(Mutex::new(BTreeMap::new())),
        })
    }
    async fn run_transaction<'a>(
        &'a self,
        _body: Box<
            dyn for<'t> FnOnce(&'t mut dyn Transaction) -> BoxFuture<'t, AdapterResult<Value>>
                + Send
                + 'a,
        >,
    ) -> AdapterResult<Value> {
        Err(AdapterError::new(AdapterErrorCode::Unimplemented, "not used in benchmarks"))
    }
}

struct FixedIdentity;

#[async_trait]
impl IdentityProvider for FixedIdentity {
    async fn current_user(&self) -> Option<String> {
        Some("bench-user".to_string())
    }
}

fn schema_with_collection() -> Schema {
    Schema::new().with_document(
        "settings",
        DocumentSchema::new()
            .with_doc_keys(["settings.theme"])
            .with_subcollection_keys(["settings.big"]),
    )
}

fn value_of_size(entries: usize) -> Value {
    Value::Array(
        (0..entries)
            .map(|i| json!({"id": i, "name": format!("item_{i}")}))
            .collect(),
    )
}

fn bench_digest(c: &mut Criterion) {
    let mut group = c.benchmark_group("digest");

    for size in [1, 100, 1000].iter() {
        let value = value_of_size(*size);
        group.bench_with_input(BenchmarkId::new("canonical_digest", size), size, |b, _| {
            b.iter(|| hash::digest(black_box(Some(&value)), black_box(None)))
        });
    }

    group.bench_function("digest_is_key_order_invariant", |b| {
        let value = json!({"z": 1, "a": 2, "m": 3});
        b.iter(|| hash::digest(black_box(Some(&value)), None))
    });

    group.finish();
}

fn bench_sanitize(c: &mut Criterion) {
    let mut group = c.benchmark_group("sanitize");

    for size in [10, 500].iter() {
        let value = value_of_size(*size);
        group.bench_with_input(BenchmarkId::new("sanitize", size), size, |b, _| {
            b.iter(|| processor::sanitize(black_box(&value)))
        });
        let sanitized = processor::sanitize(&value);
        group.bench_with_input(BenchmarkId::new("restore", size), size, |b, _| {
            b.iter(|| processor::restore(black_box(&sanitized)))
        });
    }

    group.finish();
}

fn bench_chunked_roundtrip(c: &mut Criterion) {
    let mut group = c.benchmark_group("chunk_roundtrip");
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();

    // 100 entries stays under the byte threshold (single document);
    // 5000 entries comfortably crosses it and exercises multi-chunk writes.
    for size in [100, 5000].iter() {
        group.bench_with_input(BenchmarkId::new("backup", size), size, |b, &size| {
            let store = ganon_sync_engine::remote_store::RemoteStore::new(
                Arc::new(FakeAdapter::new()),
                Arc::new(FixedIdentity),
                schema_with_collection(),
            );
            let value = value_of_size(size);
            b.iter(|| {
                runtime.block_on(store.backup("settings.big", Some(black_box(value.clone()))))
            })
        });

        group.bench_with_input(BenchmarkId::new("fetch", size), size, |b, &size| {
            let store = ganon_sync_engine::remote_store::RemoteStore::new(
                Arc::new(FakeAdapter::new()),
                Arc::new(FixedIdentity),
                schema_with_collection(),
            );
            let value = value_of_size(size);
            runtime
                .block_on(store.backup("settings.big", Some(value)))
                .unwrap();
            b.iter(|| runtime.block_on(store.fetch(black_box("settings.big"))))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_digest, bench_sanitize, bench_chunked_roundtrip);
criterion_main!(benches);
