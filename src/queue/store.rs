use async_trait::async_trait;
use fjall::{Config, Keyspace, PartitionCreateOptions, PartitionHandle};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::envelope::Envelope;
use super::error::{QueueError, Result};

/// Port for the durable work queue (spec §4.1): `Push`/`BlockingPop`/
/// `Ack`/`Nack`/`Depth` with a visibility-timeout discipline.
#[async_trait]
pub trait QueueAdapter: Send + Sync {
    async fn push(&self, envelope: Envelope) -> Result<u64>;
    async fn blocking_pop(&self, timeout: Duration) -> Result<Option<(u64, Envelope)>>;
    async fn ack(&self, delivery_id: u64) -> Result<()>;
    async fn nack(&self, delivery_id: u64, reason: &str) -> Result<()>;

    /// Like `nack`, but the envelope only becomes visible again after
    /// `delay` rather than immediately — the Worker's backoff schedule
    /// (spec §4.6: visibility-timeout + jitter) rides on this instead of
    /// blocking a worker slot in a `sleep`.
    async fn nack_with_delay(&self, delivery_id: u64, reason: &str, delay: Duration)
        -> Result<()>;

    async fn depth(&self) -> Result<usize>;
}

/// Fjall-backed queue.
///
/// Partitions:
/// - `tasks`: u64 (big-endian) -> `Envelope` (JSON)
/// - `inflight`: u64 (big-endian) -> visibility deadline, unix ms
/// - `metadata`: `"next_seq"` -> u64, atomic counter for crash recovery
///
/// A task is eligible for `blocking_pop` when it exists in `tasks` and is
/// either absent from `inflight` or its deadline has passed — this is the
/// at-least-once / visibility-timeout discipline from spec §4.1, built on
/// the same sequential-u64-key partition layout used for the job ledger.
pub struct FjallQueue {
    #[allow(dead_code)]
    keyspace: Keyspace,
    tasks: PartitionHandle,
    inflight: PartitionHandle,
    metadata: PartitionHandle,
    seq_counter: Arc<AtomicU64>,
    max_queue_size: usize,
    visibility_timeout: Duration,
    poll_interval: Duration,
}

impl FjallQueue {
    pub fn open<P: AsRef<Path>>(
        path: P,
        max_queue_size: usize,
        visibility_timeout: Duration,
    ) -> Result<Self> {
        info!(path = %path.as_ref().display(), "opening queue");

        let keyspace = Config::new(path).open()?;

        let tasks = keyspace.open_partition("tasks", PartitionCreateOptions::default())?;
        let inflight = keyspace.open_partition("inflight", PartitionCreateOptions::default())?;
        let metadata = keyspace.open_partition("metadata", PartitionCreateOptions::default())?;

        let current_seq = metadata
            .get(b"next_seq")?
            .map(|bytes| u64::from_be_bytes(bytes.as_ref().try_into().unwrap_or([0u8; 8])))
            .unwrap_or(0);

        Ok(Self {
            keyspace,
            tasks,
            inflight,
            metadata,
            seq_counter: Arc::new(AtomicU64::new(current_seq)),
            max_queue_size,
            visibility_timeout,
            poll_interval: Duration::from_millis(100),
        })
    }

    fn depth_sync(&self) -> Result<usize> {
        Ok(self.tasks.len()?)
    }

    fn is_visible(&self, seq: u64, now_ms: u64) -> Result<bool> {
        match self.inflight.get(seq.to_be_bytes())? {
            None => Ok(true),
            Some(bytes) => {
                let deadline = u64::from_be_bytes(bytes.as_ref().try_into().unwrap_or([0u8; 8]));
                Ok(now_ms >= deadline)
            }
        }
    }

    fn try_pop_one(&self) -> Result<Option<(u64, Envelope)>> {
        let now_ms = now_ms();

        for item in self.tasks.iter() {
            let (key, value) = item?;
            let seq = u64::from_be_bytes(key.as_ref().try_into().unwrap_or([0u8; 8]));

            if !self.is_visible(seq, now_ms)? {
                continue;
            }

            let envelope: Envelope = serde_json::from_slice(&value)?;
            let deadline = now_ms + self.visibility_timeout.as_millis() as u64;
            self.inflight.insert(seq.to_be_bytes(), deadline.to_be_bytes())?;

            debug!(seq, job_id = %envelope.job_id, "popped envelope");
            return Ok(Some((seq, envelope)));
        }

        Ok(None)
    }
}

#[async_trait]
impl QueueAdapter for FjallQueue {
    async fn push(&self, envelope: Envelope) -> Result<u64> {
        if self.depth_sync()? >= self.max_queue_size {
            return Err(QueueError::Backpressure);
        }

        let seq = self.seq_counter.fetch_add(1, Ordering::SeqCst);
        let value = serde_json::to_vec(&envelope)?;

        self.tasks.insert(seq.to_be_bytes(), value)?;
        self.metadata
            .insert(b"next_seq", (seq + 1).to_be_bytes())?;

        debug!(seq, job_id = %envelope.job_id, "pushed envelope");
        Ok(seq)
    }

    async fn blocking_pop(&self, timeout: Duration) -> Result<Option<(u64, Envelope)>> {
        let deadline = tokio::time::Instant::now() + timeout;

        loop {
            if let Some(popped) = self.try_pop_one()? {
                return Ok(Some(popped));
            }

            if tokio::time::Instant::now() >= deadline {
                return Ok(None);
            }

            tokio::time::sleep(self.poll_interval.min(timeout)).await;
        }
    }

    async fn ack(&self, delivery_id: u64) -> Result<()> {
        let key = delivery_id.to_be_bytes();
        self.tasks.remove(key)?;
        self.inflight.remove(key)?;
        debug!(delivery_id, "acked");
        Ok(())
    }

    async fn nack(&self, delivery_id: u64, reason: &str) -> Result<()> {
        let key = delivery_id.to_be_bytes();
        // Immediate re-visibility: clearing the inflight deadline makes the
        // envelope eligible for the next `blocking_pop` right away.
        self.inflight.remove(key)?;
        warn!(delivery_id, reason, "nacked, envelope visible again");
        Ok(())
    }

    async fn nack_with_delay(
        &self,
        delivery_id: u64,
        reason: &str,
        delay: Duration,
    ) -> Result<()> {
        let key = delivery_id.to_be_bytes();
        let deadline = now_ms() + delay.as_millis() as u64;
        self.inflight.insert(key, deadline.to_be_bytes())?;
        warn!(delivery_id, reason, delay_ms = delay.as_millis() as u64, "nacked with backoff");
        Ok(())
    }

    async fn depth(&self) -> Result<usize> {
        self.depth_sync()
    }
}

fn now_ms() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_millis() as u64
}
