//! Per-job state machine (spec §4.6): `submitted -> processing ->
//! {completed, failed}`. One call to [`process`] is one pass through the
//! straight-line pipeline; callers (the dispatcher) own retry scheduling
//! and the per-step deadline.

use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::Rng;
use tracing::{debug, info, warn};

use super::error::StepError;
use crate::metadata::{JobStatus, MetadataStore};
use crate::models::ModelManager;
use crate::queue::{Envelope, PayloadRef, QueueAdapter};
use crate::stats::StatsAggregator;
use crate::storage::{keys as storage_keys, BlobStore};

/// Jitter ceiling added on top of the exponential backoff base (spec
/// §4.6: "jitter in `[0, base·2^attempts]`").
const BACKOFF_BASE: Duration = Duration::from_secs(1);
const BACKOFF_CAP: Duration = Duration::from_secs(60);

pub struct WorkerDeps {
    pub queue: Arc<dyn QueueAdapter>,
    pub metadata: Arc<dyn MetadataStore>,
    pub blob: Arc<dyn BlobStore>,
    pub models: Arc<ModelManager>,
    pub stats: Arc<StatsAggregator>,
    pub max_attempts: u32,
}

#[derive(Debug, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// Row reached `completed`.
    Completed,
    /// Orphan envelope, or the row was already terminal (idempotent
    /// re-delivery) — acked and dropped without touching the row.
    Dropped,
    /// Transient failure, re-queued with backoff.
    Retried,
    /// Fatal failure or `attempts >= max_attempts`; row marked `failed`.
    Failed,
}

/// `process(env)` from spec §4.6, steps 1-8.
pub async fn process(
    deps: &WorkerDeps,
    delivery_id: u64,
    envelope: Envelope,
) -> crate::queue::Result<ProcessOutcome> {
    let job_id = envelope.job_id;

    // Step 1: orphan envelope — the row that should exist does not.
    let row = match deps.metadata.get_by_job_id(job_id).await {
        Ok(row) => row,
        Err(e) => {
            warn!(%job_id, error = %e, "metadata lookup failed, nacking for retry");
            deps.queue
                .nack_with_delay(delivery_id, "metadata-unavailable", backoff_for(envelope.attempts))
                .await?;
            return Ok(ProcessOutcome::Retried);
        }
    };

    let Some(row) = row else {
        debug!(%job_id, "orphan envelope, no row found, dropping");
        deps.queue.ack(delivery_id).await?;
        return Ok(ProcessOutcome::Dropped);
    };

    // Step 2: idempotent re-delivery of an already-terminal job.
    if matches!(row.status, JobStatus::Completed | JobStatus::Failed) {
        debug!(%job_id, status = row.status.as_str(), "already terminal, dropping re-delivery");
        deps.queue.ack(delivery_id).await?;
        return Ok(ProcessOutcome::Dropped);
    }

    // Step 3: best-effort transition, not a hard precondition.
    let _ = deps.metadata.mark_processing(job_id).await;

    let start = Instant::now();

    match run_pipeline(deps, &envelope, start).await {
        Ok(elapsed) => {
            deps.stats.record_processed(elapsed);
            deps.queue.ack(delivery_id).await?;
            info!(%job_id, elapsed, "completed");
            Ok(ProcessOutcome::Completed)
        }
        Err(step_err) => {
            let elapsed = start.elapsed().as_secs_f64();
            handle_failure(deps, delivery_id, envelope, step_err, elapsed).await
        }
    }
}

/// Steps 4-7: fetch bytes, detect-and-blur, upload, update row. Returns
/// the wall-clock duration of the step for `processing_time_seconds`.
async fn run_pipeline(
    deps: &WorkerDeps,
    envelope: &Envelope,
    start: Instant,
) -> Result<f64, StepError> {
    let bytes = fetch_payload(deps, envelope).await?;

    let (processed_bytes, face_meta) = deps.models.detect_and_blur_faces(&bytes).await?;

    let unix_ts = envelope.admission_unix_ts;
    let processed_key =
        storage_keys::processed_key(envelope.job_id, unix_ts, &envelope.content_type);
    let processed_url = deps
        .blob
        .put(&processed_key, processed_bytes.clone(), &envelope.content_type)
        .await?;

    let elapsed = start.elapsed().as_secs_f64();

    deps.metadata
        .update_on_completion(
            envelope.job_id,
            processed_url,
            processed_bytes.len() as i64,
            face_meta,
            elapsed,
        )
        .await?;

    Ok(elapsed)
}

async fn fetch_payload(deps: &WorkerDeps, envelope: &Envelope) -> Result<Vec<u8>, StepError> {
    match &envelope.payload_ref {
        PayloadRef::Inline(bytes) => Ok(bytes.clone()),
        PayloadRef::Staged(key) => Ok(deps.blob.get(key).await?),
    }
}

async fn handle_failure(
    deps: &WorkerDeps,
    delivery_id: u64,
    envelope: Envelope,
    err: StepError,
    elapsed: f64,
) -> crate::queue::Result<ProcessOutcome> {
    let job_id = envelope.job_id;
    let is_fatal = matches!(err, StepError::Fatal { .. });
    let exhausted = envelope.attempts + 1 >= deps.max_attempts;

    if is_fatal || exhausted {
        warn!(%job_id, reason = err.reason_kind(), %err, "marking failed");
        let _ = deps
            .metadata
            .mark_failed(job_id, err.reason_kind().to_string(), elapsed)
            .await;
        deps.stats.record_failed();
        deps.queue.ack(delivery_id).await?;
        return Ok(ProcessOutcome::Failed);
    }

    // Transient, retries remain: re-push a new envelope carrying the
    // incremented attempt count (the queue has no in-place envelope
    // mutation), hide it for the backoff window, then retire the
    // original delivery.
    let next_envelope = envelope.with_incremented_attempts();
    let delay = backoff_for(envelope.attempts);

    match deps.queue.push(next_envelope).await {
        Ok(new_delivery_id) => {
            deps.queue
                .nack_with_delay(new_delivery_id, err.reason_kind(), delay)
                .await?;
            deps.queue.ack(delivery_id).await?;
        }
        Err(e) => {
            // Queue at capacity or unavailable: fall back to re-hiding the
            // original delivery rather than losing the job outright.
            warn!(%job_id, error = %e, "retry re-push failed, nacking original delivery");
            deps.queue
                .nack_with_delay(delivery_id, err.reason_kind(), delay)
                .await?;
        }
    }

    warn!(%job_id, reason = err.reason_kind(), attempts = envelope.attempts + 1, "retrying");
    Ok(ProcessOutcome::Retried)
}

/// `jitter in [0, base * 2^attempts]`, capped (spec §4.6).
fn backoff_for(attempts: u32) -> Duration {
    let exp = BACKOFF_BASE.saturating_mul(1u32.checked_shl(attempts.min(16)).unwrap_or(u32::MAX));
    let capped = exp.min(BACKOFF_CAP);
    let jitter_ms = rand::thread_rng().gen_range(0..=capped.as_millis().max(1) as u64);
    Duration::from_millis(jitter_ms)
}
