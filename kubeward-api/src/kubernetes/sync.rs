//! Bounded background work pool
//!
//! Best-effort jobs (namespace mirroring) are queued here instead of being
//! spawned ad hoc. A fixed set of workers drains a bounded queue; when the
//! queue is full the job is dropped and logged. Job failures never reach
//! the request that submitted them.

use futures::future::BoxFuture;
use futures::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use super::error::K8sResult;

/// How a submitted job ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    Completed,
    Failed(String),
}

/// Handle for awaiting a submitted job
#[derive(Debug)]
pub struct SyncTicket {
    rx: oneshot::Receiver<SyncOutcome>,
}

impl SyncTicket {
    pub async fn wait(self) -> SyncOutcome {
        self.rx
            .await
            .unwrap_or_else(|_| SyncOutcome::Failed("sync worker stopped".to_string()))
    }
}

struct SyncJob {
    label: String,
    task: BoxFuture<'static, K8sResult<()>>,
    done: oneshot::Sender<SyncOutcome>,
}

/// Fixed-size worker pool over a bounded queue
pub struct SyncPool {
    /// `None` once shutdown has begun
    tx: std::sync::RwLock<Option<mpsc::Sender<SyncJob>>>,
    workers: std::sync::Mutex<Vec<JoinHandle<()>>>,
}

impl SyncPool {
    /// Start `workers` workers sharing a queue of `capacity` jobs.
    /// Must be called from within a Tokio runtime.
    pub fn new(workers: usize, capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel::<SyncJob>(capacity.max(1));
        let rx = Arc::new(Mutex::new(rx));

        let handles = (0..workers.max(1))
            .map(|id| tokio::spawn(worker_loop(id, rx.clone())))
            .collect();

        Self {
            tx: std::sync::RwLock::new(Some(tx)),
            workers: std::sync::Mutex::new(handles),
        }
    }

    /// Queue a job without waiting. Returns `None` when the queue is full
    /// or the pool is shutting down.
    pub fn submit<F>(&self, label: impl Into<String>, task: F) -> Option<SyncTicket>
    where
        F: Future<Output = K8sResult<()>> + Send + 'static,
    {
        let label = label.into();
        let (done, rx) = oneshot::channel();
        let job = SyncJob {
            label: label.clone(),
            task: task.boxed(),
            done,
        };

        let tx = self.tx.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        let Some(tx) = tx.as_ref() else {
            warn!("Sync pool closed, dropping job '{}'", label);
            return None;
        };

        match tx.try_send(job) {
            Ok(()) => Some(SyncTicket { rx }),
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("Sync queue full, dropping job '{}'", label);
                None
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                warn!("Sync pool closed, dropping job '{}'", label);
                None
            }
        }
    }

    /// Stop accepting jobs, let queued ones finish, and wait for the workers
    pub async fn shutdown(&self) {
        self.tx
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        let workers = std::mem::take(
            &mut *self
                .workers
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner()),
        );
        for handle in workers {
            if let Err(e) = handle.await {
                error!("Sync worker join error: {}", e);
            }
        }
    }
}

async fn worker_loop(id: usize, rx: Arc<Mutex<mpsc::Receiver<SyncJob>>>) {
    loop {
        let job = { rx.lock().await.recv().await };
        let Some(job) = job else {
            debug!("Sync worker {} exiting", id);
            break;
        };

        let outcome = match AssertUnwindSafe(job.task).catch_unwind().await {
            Ok(Ok(())) => {
                debug!("Sync job '{}' completed", job.label);
                SyncOutcome::Completed
            }
            Ok(Err(e)) => {
                warn!("Sync job '{}' failed: {}", job.label, e);
                SyncOutcome::Failed(e.to_string())
            }
            Err(_) => {
                error!("Sync job '{}' panicked", job.label);
                SyncOutcome::Failed("job panicked".to_string())
            }
        };

        // Nobody may be waiting on the ticket
        let _ = job.done.send(outcome);
    }
}
