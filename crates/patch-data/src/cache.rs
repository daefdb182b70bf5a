//! Cache client and the background writer that feeds it.
//!
//! Reads go to the [`CacheClient`] directly. Writes and evictions are
//! queued on a [`CacheWriter`] and applied by a single worker task, in the
//! order they were queued, without the caller waiting for them.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, warn, Span};

/// Errors reported by a cache client.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// The cache backend could not be reached or refused the operation.
    #[error("cache unavailable: {0}")]
    Unavailable(String),

    /// A cached value could not be encoded or decoded.
    #[error("invalid cache value: {0}")]
    Value(#[from] serde_json::Error),
}

/// A key/value cache of text values.
#[async_trait]
pub trait CacheClient: Send + Sync {
    /// Returns the value at `key`, if any.
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// Stores `value` at `key`.
    async fn set(&self, key: &str, value: &str) -> Result<(), CacheError>;

    /// Removes `key`. Removing a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<(), CacheError>;
}

/// In-process cache.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Whether the cache holds no keys.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl CacheClient for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), CacheError> {
        self.entries
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.entries.write().await.remove(key);
        Ok(())
    }
}

enum Job {
    Set { key: String, value: String },
    Delete { key: String },
    Barrier(oneshot::Sender<()>),
}

/// Applies cache writes in the background.
///
/// Must be created inside a tokio runtime.
pub struct CacheWriter {
    client: Arc<dyn CacheClient>,
    sender: Mutex<Option<mpsc::Sender<Job>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    pending: Arc<AtomicUsize>,
    dropped: AtomicU64,
    span: Span,
}

impl CacheWriter {
    /// Starts a worker for `client` with a queue of `capacity` jobs.
    pub fn new(client: Arc<dyn CacheClient>, capacity: usize, span: &Span) -> Self {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let pending = Arc::new(AtomicUsize::new(0));
        let worker = tokio::spawn(run(
            Arc::clone(&client),
            receiver,
            Arc::clone(&pending),
            span.clone(),
        ));
        Self {
            client,
            sender: Mutex::new(Some(sender)),
            worker: Mutex::new(Some(worker)),
            pending,
            dropped: AtomicU64::new(0),
            span: span.clone(),
        }
    }

    /// The client reads go to.
    #[must_use]
    pub fn client(&self) -> &Arc<dyn CacheClient> {
        &self.client
    }

    /// Queues a write of `value` at `key`.
    pub fn store(&self, key: impl Into<String>, value: impl Into<String>) {
        self.enqueue(Job::Set {
            key: key.into(),
            value: value.into(),
        });
    }

    /// Queues removal of `key`.
    pub fn evict(&self, key: impl Into<String>) {
        self.enqueue(Job::Delete { key: key.into() });
    }

    /// Jobs queued but not applied yet.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::Acquire)
    }

    /// Jobs discarded because the queue was full or closed.
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Waits until every job queued before this call has been applied.
    pub async fn flush(&self) {
        let Some(sender) = self.sender() else {
            return;
        };
        let (done, wait) = oneshot::channel();
        if sender.send(Job::Barrier(done)).await.is_ok() {
            // The worker only drops the barrier if it stops.
            let _ = wait.await;
        }
    }

    /// Closes the queue and waits for the worker to apply what is left.
    ///
    /// Later `store`/`evict` calls are dropped.
    pub async fn shutdown(&self) {
        drop(
            self.sender
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .take(),
        );
        let worker = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(worker) = worker {
            if let Err(e) = worker.await {
                warn!(parent: &self.span, error = %e, "cache worker stopped abnormally");
            }
        }
    }

    fn sender(&self) -> Option<mpsc::Sender<Job>> {
        self.sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn enqueue(&self, job: Job) {
        let Some(sender) = self.sender() else {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            warn!(parent: &self.span, "cache queue closed, dropping job");
            return;
        };
        self.pending.fetch_add(1, Ordering::AcqRel);
        if let Err(e) = sender.try_send(job) {
            self.pending.fetch_sub(1, Ordering::AcqRel);
            self.dropped.fetch_add(1, Ordering::Relaxed);
            let reason = match e {
                mpsc::error::TrySendError::Full(_) => "full",
                mpsc::error::TrySendError::Closed(_) => "closed",
            };
            warn!(parent: &self.span, reason, "cache queue unavailable, dropping job");
        }
    }
}

impl std::fmt::Debug for CacheWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheWriter")
            .field("pending", &self.pending())
            .field("dropped", &self.dropped())
            .finish_non_exhaustive()
    }
}

async fn run(
    client: Arc<dyn CacheClient>,
    mut receiver: mpsc::Receiver<Job>,
    pending: Arc<AtomicUsize>,
    span: Span,
) {
    while let Some(job) = receiver.recv().await {
        match job {
            Job::Set { key, value } => {
                if let Err(e) = client.set(&key, &value).await {
                    warn!(parent: &span, key = %key, error = %e, "failed to store cache entry");
                } else {
                    debug!(parent: &span, key = %key, "stored cache entry");
                }
                pending.fetch_sub(1, Ordering::AcqRel);
            }
            Job::Delete { key } => {
                if let Err(e) = client.delete(&key).await {
                    warn!(parent: &span, key = %key, error = %e, "failed to evict cache entry");
                } else {
                    debug!(parent: &span, key = %key, "evicted cache entry");
                }
                pending.fetch_sub(1, Ordering::AcqRel);
            }
            Job::Barrier(done) => {
                let _ = done.send(());
            }
        }
    }
    debug!(parent: &span, "cache worker stopped");
}
