// =============================================================================
// ConcurrencyGate — bounded worker-pool primitive for upstream I/O fan-out
// =============================================================================
//
// A single named primitive replaces ad-hoc bounded concurrency scattered
// across call sites (Design Note "Ad-hoc bounded concurrency"). `Gate::run_all`
// drives at most `limit` concurrent invocations of `worker`, submits items in
// input order, and never lets one worker's failure abort the batch — workers
// log their own errors and `run_all` simply moves on.
//
// Grounded in the semaphore-bounded `tokio::spawn` fan-out used for bulk
// per-symbol fetches elsewhere in this corpus (`data-loader`'s `Semaphore`
// over `DEFAULT_CONCURRENCY` parallel tasks).

use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Bounds the number of in-flight async operations of one "API class"
/// (stats calls, portfolio-history calls, ...).
#[derive(Clone)]
pub struct Gate {
    semaphore: Arc<Semaphore>,
    limit: usize,
}

impl Gate {
    pub fn new(limit: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(limit.max(1))),
            limit: limit.max(1),
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Run `worker(item)` for every item in `items`, at most `limit`
    /// concurrently. Submission follows input order; completion order is not
    /// guaranteed. Resolves only once every item has been attempted (or
    /// skipped because `cancel` fired before it could start).
    ///
    /// Individual worker errors are swallowed — callers are expected to log
    /// their own failures via the `Result` they return, which this function
    /// only inspects to decide whether to emit a `warn!`.
    pub async fn run_all<T, F, Fut, E>(&self, items: Vec<T>, worker: F) -> Vec<Option<T::Output>>
    where
        T: GateItem + Send + 'static,
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T::Output, E>> + Send,
        T::Output: Send + 'static,
        E: std::fmt::Display + Send + 'static,
    {
        self.run_all_cancellable(items, worker, CancellationToken::new())
            .await
    }

    /// As [`Gate::run_all`], but stops submitting unstarted items once
    /// `cancel` is triggered. Items already running are allowed to finish.
    pub async fn run_all_cancellable<T, F, Fut, E>(
        &self,
        items: Vec<T>,
        worker: F,
        cancel: CancellationToken,
    ) -> Vec<Option<T::Output>>
    where
        T: GateItem + Send + 'static,
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T::Output, E>> + Send,
        T::Output: Send + 'static,
        E: std::fmt::Display + Send + 'static,
    {
        let worker = Arc::new(worker);
        let mut handles = Vec::with_capacity(items.len());

        for item in items {
            if cancel.is_cancelled() {
                debug!("gate cancelled — skipping remaining unstarted items");
                handles.push(None);
                continue;
            }

            let semaphore = self.semaphore.clone();
            let worker = worker.clone();
            let label = item.label();

            let handle = tokio::spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(p) => p,
                    Err(_) => return None,
                };
                match worker(item).await {
                    Ok(out) => Some(out),
                    Err(e) => {
                        warn!(item = %label, error = %e, "gate worker failed");
                        None
                    }
                }
            });
            handles.push(Some(handle));
        }

        let mut results = Vec::with_capacity(handles.len());
        for handle in handles {
            match handle {
                Some(h) => results.push(h.await.unwrap_or(None)),
                None => results.push(None),
            }
        }
        results
    }
}

/// Items passed through a `Gate` must expose a label used only for logging
/// failed workers.
pub trait GateItem {
    type Output;
    fn label(&self) -> String;
}

impl GateItem for String {
    type Output = ();
    fn label(&self) -> String {
        self.clone()
    }
}
