//! C11: per-key latest-operation queue, executed serially with
//! re-enqueue-on-retry.

use crate::error::Error;
use crate::operation::{should_retry, OperationResult, SyncOperation};
use std::collections::BTreeMap;
use tokio::sync::Mutex;

/// A function that actually performs one operation against the remote
/// store, returning the digest it wrote (or an empty string for deletes)
/// on success.
pub trait OperationExecutor: Send + Sync {
    fn execute<'a>(
        &'a self,
        op: &'a SyncOperation,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<(), Error>> + Send + 'a>>;
}

/// Queue of the single latest pending operation per key. A new operation
/// for a key already queued overwrites the old one - the engine only ever
/// needs to ship the most recent intent, never a full history.
pub struct OperationRepo {
    queue: Mutex<BTreeMap<String, SyncOperation>>,
    max_retries: u32,
}

impl OperationRepo {
    pub fn new(max_retries: u32) -> Self {
        Self {
            queue: Mutex::new(BTreeMap::new()),
            max_retries,
        }
    }

    pub async fn enqueue(&self, op: SyncOperation) {
        self.queue.lock().await.insert(op.key.clone(), op);
    }

    pub async fn pending_count(&self) -> usize {
        self.queue.lock().await.len()
    }

    pub async fn pending_keys(&self) -> Vec<String> {
        self.queue.lock().await.keys().cloned().collect()
    }

    /// Drains every currently-queued operation and runs each to completion
    /// (including its own retry/backoff loop), serially. Operations
    /// enqueued by the host application while this is running land in the
    /// next call, not this one - matches the one-shot drain semantics of
    /// the rest of the batch-oriented API (`syncPending`/`syncAll`).
    pub async fn process_operations(&self, executor: &dyn OperationExecutor) -> Vec<OperationResult> {
        let drained: Vec<SyncOperation> = {
            let mut queue = self.queue.lock().await;
            std::mem::take(&mut *queue).into_values().collect()
        };

        let mut results = Vec::with_capacity(drained.len());
        for op in drained {
            results.push(self.run_with_retry(executor, op).await);
        }
        results
    }

    async fn run_with_retry(
        &self,
        executor: &dyn OperationExecutor,
        mut op: SyncOperation,
    ) -> OperationResult {
        loop {
            match executor.execute(&op).await {
                Ok(()) => {
                    return OperationResult {
                        key: op.key,
                        success: true,
                        error: None,
                        should_retry: false,
                    };
                }
                Err(err) => {
                    let retry = should_retry(&err, op.retry_count, self.max_retries);
                    if !retry {
                        return OperationResult {
                            key: op.key,
                            success: false,
                            error: Some(err),
                            should_retry: false,
                        };
                    }
                    tokio::time::sleep(op.backoff_delay()).await;
                    op = op.with_incremented_retry();
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct AlwaysSucceeds;
    impl OperationExecutor for AlwaysSucceeds {
        fn execute<'a>(
            &'a self,
            _op: &'a SyncOperation,
        ) -> Pin<Box<dyn Future<Output = Result<(), Error>> + Send + 'a>> {
            Box::pin(async { Ok(()) })
        }
    }

    struct FailsNTimesThenSucceeds {
        remaining_failures: AtomicU32,
    }
    impl OperationExecutor for FailsNTimesThenSucceeds {
        fn execute<'a>(
            &'a self,
            _op: &'a SyncOperation,
        ) -> Pin<Box<dyn Future<Output = Result<(), Error>> + Send + 'a>> {
            Box::pin(async {
                if self.remaining_failures.fetch_sub(1, Ordering::SeqCst) > 0 {
                    Err(Error::SyncNetworkError("flaky".into()))
                } else {
                    Ok(())
                }
            })
        }
    }

    struct AlwaysFailsTerminal;
    impl OperationExecutor for AlwaysFailsTerminal {
        fn execute<'a>(
            &'a self,
            _op: &'a SyncOperation,
        ) -> Pin<Box<dyn Future<Output = Result<(), Error>> + Send + 'a>> {
            Box::pin(async { Err(Error::SyncConfigurationError("bad config".into())) })
        }
    }

    #[tokio::test]
    async fn enqueue_overwrites_same_key() {
        let repo = OperationRepo::new(3);
        repo.enqueue(SyncOperation::set("k", json!(1))).await;
        repo.enqueue(SyncOperation::set("k", json!(2))).await;
        assert_eq!(repo.pending_count().await, 1);
    }

    #[tokio::test]
    async fn process_drains_the_queue() {
        let repo = OperationRepo::new(3);
        repo.enqueue(SyncOperation::set("a", json!(1))).await;
        repo.enqueue(SyncOperation::set("b", json!(2))).await;
        let results = repo.process_operations(&AlwaysSucceeds).await;
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.success));
        assert_eq!(repo.pending_count().await, 0);
    }

    #[tokio::test]
    async fn retries_transient_failures_until_success() {
        let repo = OperationRepo::new(5);
        repo.enqueue(SyncOperation::set("k", json!(1))).await;
        let executor = FailsNTimesThenSucceeds {
            remaining_failures: AtomicU32::new(2),
        };
        let results = repo.process_operations(&executor).await;
        assert!(results[0].success);
    }

    #[tokio::test]
    async fn terminal_errors_stop_immediately() {
        let repo = OperationRepo::new(5);
        repo.enqueue(SyncOperation::set("k", json!(1))).await;
        let results = repo.process_operations(&AlwaysFailsTerminal).await;
        assert!(!results[0].success);
        assert!(!results[0].should_retry);
    }
}
