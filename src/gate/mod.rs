//! Admission Gate (spec §4.5): the synchronous pre-check that decides
//! whether a submission becomes a job. On acceptance exactly one durable
//! row and exactly one envelope exist, referencing the same `job_id`
//! (spec §4.5 observable side effect, §8 property 1).

mod error;

pub use error::GateError;

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rand::Rng;
use tracing::{info, warn};
use uuid::Uuid;

use crate::metadata::{MetadataStore, NewJobRecord};
use crate::models::ModelManager;
use crate::queue::{Envelope, PayloadRef, QueueAdapter, QueueError};
use crate::storage::keys as storage_keys;
use crate::storage::BlobStore;

use error::Result;

/// Exponential backoff applied in-band to transient `Queue.Push` failures
/// before surfacing `QueueUnavailable` to the caller (spec §4.1).
const PUSH_BACKOFF_BASE: Duration = Duration::from_millis(100);
const PUSH_BACKOFF_CAP: Duration = Duration::from_secs(5);
const PUSH_MAX_TRIES: u32 = 5;

#[derive(Debug, Clone)]
pub struct SubmitOutcome {
    pub job_id: Uuid,
    pub accepted: bool,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct BatchOutcome {
    pub accepted: Vec<Uuid>,
    pub skipped: usize,
    pub outcomes: Vec<SubmitOutcome>,
}

/// One file handed to `Submit`/`BatchSubmit` by the (out-of-scope)
/// ingestion layer: a validated byte blob plus filename and content type.
pub struct SubmitRequest {
    pub bytes: Vec<u8>,
    pub filename: String,
    pub content_type: String,
}

pub struct AdmissionGate {
    queue: Arc<dyn QueueAdapter>,
    metadata: Arc<dyn MetadataStore>,
    blob: Arc<dyn BlobStore>,
    models: Arc<ModelManager>,
    inline_payload_max_bytes: usize,
}

impl AdmissionGate {
    pub fn new(
        queue: Arc<dyn QueueAdapter>,
        metadata: Arc<dyn MetadataStore>,
        blob: Arc<dyn BlobStore>,
        models: Arc<ModelManager>,
        inline_payload_max_bytes: usize,
    ) -> Self {
        Self {
            queue,
            metadata,
            blob,
            models,
            inline_payload_max_bytes,
        }
    }

    /// Algorithm per spec §4.5.
    pub async fn submit(&self, request: SubmitRequest) -> Result<SubmitOutcome> {
        if request.bytes.is_empty() {
            return Err(GateError::Validation("empty payload".to_string()));
        }
        if request.content_type.trim().is_empty() {
            return Err(GateError::Validation("missing content_type".to_string()));
        }

        let job_id = Uuid::now_v7();
        let upload_ts = Utc::now().timestamp();

        // Step 2: vehicle pre-check. A negative result never creates a
        // row or an envelope (spec §8 property 2).
        let (accepted, detection) = self
            .models
            .detect_vehicles_full(&request.bytes)
            .await
            .map_err(|e| GateError::Validation(e.to_string()))?;

        if !accepted {
            info!(%job_id, "rejected: no vehicle detected");
            return Ok(SubmitOutcome {
                job_id,
                accepted: false,
                reason: Some("no-vehicle".to_string()),
            });
        }

        // Step 3: stage the original under its idempotent key.
        let original_key =
            storage_keys::original_key(job_id, upload_ts, &request.content_type);
        let original_url = match self
            .blob
            .put(&original_key, request.bytes.clone(), &request.content_type)
            .await
        {
            Ok(url) => url,
            Err(e) => {
                warn!(%job_id, error = %e, "rejected: storage unavailable");
                return Ok(SubmitOutcome {
                    job_id,
                    accepted: false,
                    reason: Some("storage-unavailable".to_string()),
                });
            }
        };

        // Step 4: durable row in `submitted` state.
        let record = NewJobRecord {
            job_id,
            original_filename: request.filename.clone(),
            content_type: request.content_type.clone(),
            blob_original_url: original_url,
            file_size_original: request.bytes.len() as i64,
            vehicle_detection_data: detection,
            created_at: Utc::now(),
        };

        self.metadata.insert(record).await.map_err(|e| {
            GateError::Internal(format!("duplicate or unavailable metadata store: {e}"))
        })?;

        // Step 5: enqueue, with in-band retry on transient Push failure.
        let payload_ref = if request.bytes.len() <= self.inline_payload_max_bytes {
            PayloadRef::Inline(request.bytes)
        } else {
            let staging_key = storage_keys::staging_key(job_id);
            self.blob
                .put(&staging_key, request.bytes, &request.content_type)
                .await
                .map_err(|e| GateError::StorageUnavailable(e.to_string()))?;
            PayloadRef::Staged(staging_key)
        };

        let envelope = Envelope::new(
            job_id,
            request.filename,
            request.content_type,
            payload_ref,
            upload_ts,
        );

        match self.push_with_retry(envelope).await {
            Ok(()) => {
                info!(%job_id, "accepted");
                Ok(SubmitOutcome {
                    job_id,
                    accepted: true,
                    reason: None,
                })
            }
            Err(e) => {
                warn!(%job_id, error = %e, "queue unavailable after retries, marking failed");
                let _ = self
                    .metadata
                    .mark_failed(job_id, "queue-unavailable".to_string(), 0.0)
                    .await;
                Ok(SubmitOutcome {
                    job_id,
                    accepted: false,
                    reason: Some("queue-unavailable".to_string()),
                })
            }
        }
    }

    /// Independent per-file admission (spec §4.5 Batch variant, §9 open
    /// question — failures are folded into `skipped` without a separate
    /// top-level status).
    pub async fn batch_submit(&self, requests: Vec<SubmitRequest>) -> BatchOutcome {
        let mut out = BatchOutcome::default();

        for request in requests {
            match self.submit(request).await {
                Ok(outcome) => {
                    if outcome.accepted {
                        out.accepted.push(outcome.job_id);
                    } else {
                        out.skipped += 1;
                    }
                    out.outcomes.push(outcome);
                }
                Err(e) => {
                    out.skipped += 1;
                    out.outcomes.push(SubmitOutcome {
                        job_id: Uuid::now_v7(),
                        accepted: false,
                        reason: Some(e.to_string()),
                    });
                }
            }
        }

        out
    }

    async fn push_with_retry(&self, envelope: Envelope) -> Result<()> {
        let mut attempt: u32 = 0;

        loop {
            match self.queue.push(envelope.clone()).await {
                Ok(_) => return Ok(()),
                Err(QueueError::Backpressure) => {
                    return Err(GateError::QueueUnavailable(
                        "queue depth at max_queue_size".to_string(),
                    ));
                }
                Err(e) => {
                    attempt += 1;
                    if attempt >= PUSH_MAX_TRIES {
                        return Err(GateError::QueueUnavailable(e.to_string()));
                    }

                    let backoff = (PUSH_BACKOFF_BASE * 2u32.pow(attempt - 1)).min(PUSH_BACKOFF_CAP);
                    let jitter_ms = rand::thread_rng().gen_range(0..=25u64);
                    tokio::time::sleep(backoff + Duration::from_millis(jitter_ms)).await;
                }
            }
        }
    }
}
