//! Job Dispatcher (spec §4.7): a pool of `num_workers` concurrent loops,
//! each popping one envelope at a time and running it through
//! [`job::process`], with a per-job deadline and graceful shutdown.

mod error;
pub mod job;

pub use error::StepError;
pub use job::{process, ProcessOutcome, WorkerDeps};

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{error, info, warn};

/// Worker pool configuration (spec §6 `worker.*`).
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub num_workers: usize,
    pub worker_timeout: Duration,
    pub poll_timeout: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            num_workers: 5,
            worker_timeout: Duration::from_secs(300),
            poll_timeout: Duration::from_secs(2),
        }
    }
}

/// Handle to a running worker pool. Dropping it does not stop the
/// workers; call [`Dispatcher::shutdown`] for a graceful drain. Shared
/// via `Arc` so the API layer can read [`Dispatcher::active_workers`]
/// while `main` separately owns shutdown.
pub struct Dispatcher {
    worker_timeout: Duration,
    deps: Arc<WorkerDeps>,
    active_workers: Arc<AtomicUsize>,
    shutdown_tx: watch::Sender<bool>,
    handles: tokio::sync::Mutex<Option<Vec<tokio::task::JoinHandle<()>>>>,
}

impl Dispatcher {
    /// Spawns `config.num_workers` loops onto the current Tokio runtime.
    pub fn spawn(config: WorkerConfig, deps: WorkerDeps) -> Self {
        let deps = Arc::new(deps);
        let active_workers = Arc::new(AtomicUsize::new(0));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let handles = (0..config.num_workers)
            .map(|worker_index| {
                tokio::spawn(worker_loop(
                    worker_index,
                    config.clone(),
                    deps.clone(),
                    active_workers.clone(),
                    shutdown_rx.clone(),
                ))
            })
            .collect();

        Self {
            worker_timeout: config.worker_timeout,
            deps,
            active_workers,
            shutdown_tx,
            handles: tokio::sync::Mutex::new(Some(handles)),
        }
    }

    /// Number of workers currently inside a `process()` call (spec
    /// §4.8 `ActiveWorkers`).
    pub fn active_workers(&self) -> usize {
        self.active_workers.load(Ordering::Relaxed)
    }

    pub async fn queue_depth(&self) -> crate::queue::Result<usize> {
        self.deps.queue.depth().await
    }

    /// Signals every worker loop to stop popping new envelopes, then
    /// waits up to `worker_timeout` for in-flight `process()` calls to
    /// drain. Jobs still running past the deadline are left un-Acked;
    /// their visibility timeout will redeliver them to the next process.
    ///
    /// Idempotent: a second call finds `handles` already taken and
    /// returns immediately.
    pub async fn shutdown(&self) {
        info!("dispatcher shutdown requested, draining in-flight jobs");
        let _ = self.shutdown_tx.send(true);

        let Some(handles) = self.handles.lock().await.take() else {
            return;
        };

        let drain = async {
            for handle in handles {
                if let Err(e) = handle.await {
                    error!(error = %e, "worker task panicked during shutdown");
                }
            }
        };

        if tokio::time::timeout(self.worker_timeout, drain).await.is_err() {
            warn!(
                timeout_secs = self.worker_timeout.as_secs(),
                "shutdown deadline elapsed with workers still draining, leaving in-flight jobs for redelivery"
            );
        } else {
            info!("all workers drained");
        }
    }
}

async fn worker_loop(
    worker_index: usize,
    config: WorkerConfig,
    deps: Arc<WorkerDeps>,
    active_workers: Arc<AtomicUsize>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    info!(worker_index, "worker started");

    loop {
        if *shutdown_rx.borrow() {
            break;
        }

        let popped = tokio::select! {
            result = deps.queue.blocking_pop(config.poll_timeout) => result,
            _ = shutdown_rx.changed() => break,
        };

        let (delivery_id, envelope) = match popped {
            Ok(Some(pair)) => pair,
            Ok(None) => continue,
            Err(e) => {
                error!(worker_index, error = %e, "queue pop failed");
                tokio::time::sleep(Duration::from_millis(500)).await;
                continue;
            }
        };

        active_workers.fetch_add(1, Ordering::Relaxed);
        let job_id = envelope.job_id;

        // Spawned onto its own task so a panic inside `process()` unwinds
        // only that task, not this loop (spec §4.6/§7: a panic is fatal
        // for the job, never for the worker).
        let task_deps = deps.clone();
        let mut handle =
            tokio::spawn(async move { job::process(&task_deps, delivery_id, envelope).await });

        let joined = tokio::time::timeout(config.worker_timeout, &mut handle).await;
        active_workers.fetch_sub(1, Ordering::Relaxed);

        match joined {
            Ok(Ok(Ok(outcome))) => {
                if !matches!(outcome, ProcessOutcome::Completed | ProcessOutcome::Dropped) {
                    warn!(worker_index, %job_id, ?outcome, "job did not complete");
                }
            }
            Ok(Ok(Err(e))) => {
                error!(worker_index, %job_id, error = %e, "queue error while processing")
            }
            Ok(Err(join_err)) if join_err.is_panic() => {
                error!(worker_index, %job_id, error = %join_err, "job panicked, marking failed");
                let _ = deps.metadata.mark_failed(job_id, "panic".to_string(), 0.0).await;
                deps.stats.record_failed();
                if let Err(e) = deps.queue.ack(delivery_id).await {
                    error!(worker_index, %job_id, error = %e, "failed to ack panicked job");
                }
            }
            Ok(Err(join_err)) => {
                warn!(worker_index, %job_id, error = %join_err, "job task cancelled");
            }
            Err(_) => {
                // Deadline exceeded: abort the still-running task and
                // leave the delivery un-acked so it redelivers once its
                // visibility timeout lapses (spec §7).
                handle.abort();
                warn!(
                    worker_index,
                    %job_id,
                    timeout_secs = config.worker_timeout.as_secs(),
                    "job exceeded worker_timeout, leaving for visibility-timeout redelivery"
                );
            }
        }
    }

    info!(worker_index, "worker stopped");
}
