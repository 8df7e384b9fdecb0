use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Where the submitted bytes live: carried inline in the envelope below
/// `INLINE_PAYLOAD_MAX_BYTES`, or staged in the blob store above it
/// (spec §3, §9 — replaces a runtime-typed payload with a tagged union).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PayloadRef {
    Inline(Vec<u8>),
    Staged(String),
}

/// The unit placed in the queue (spec §3 Job Envelope).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub job_id: Uuid,
    pub original_filename: String,
    pub content_type: String,
    pub payload_ref: PayloadRef,
    /// The single timestamp sampled once at admission (spec §4.2) and
    /// reused for every blob key this job ever produces, so a retry's
    /// `processed_key` lands next to the `original_key` the Admission
    /// Gate already wrote rather than a second, independent clock read.
    pub admission_unix_ts: i64,
    pub enqueued_at: DateTime<Utc>,
    pub attempts: u32,
    pub trace_id: Uuid,
}

impl Envelope {
    pub fn new(
        job_id: Uuid,
        original_filename: String,
        content_type: String,
        payload_ref: PayloadRef,
        admission_unix_ts: i64,
    ) -> Self {
        Self {
            job_id,
            original_filename,
            content_type,
            payload_ref,
            admission_unix_ts,
            enqueued_at: Utc::now(),
            attempts: 0,
            trace_id: Uuid::new_v4(),
        }
    }

    /// A copy with `attempts` incremented, used when a transient failure
    /// is re-pushed onto the queue (spec §4.6, §9 — Fjall has no in-place
    /// envelope mutation, so retries re-push rather than mutate).
    pub fn with_incremented_attempts(&self) -> Self {
        let mut next = self.clone();
        next.attempts += 1;
        next
    }
}
