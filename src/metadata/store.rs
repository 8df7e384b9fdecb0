use async_trait::async_trait;
use uuid::Uuid;

use super::error::Result;
use super::types::{AggregateStats, FaceMeta, JobRecord, NewJobRecord, QueryFilters};

/// Port for the Metadata Store Adapter (spec §4.3). All operations are
/// transactional at the row level; no multi-row transaction is required
/// of implementers.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Insert a new row in `submitted` state. `Duplicate` is a distinct
    /// error kind, not folded into a generic failure.
    async fn insert(&self, record: NewJobRecord) -> Result<()>;

    /// Best-effort transition to `processing`. Not a hard precondition for
    /// later steps (spec §4.6 step 3).
    async fn mark_processing(&self, job_id: Uuid) -> Result<()>;

    /// Atomic row update on successful completion. Idempotent: calling
    /// this twice for an already-`completed` row is a no-op (spec
    /// invariant: a completed row is never regressed).
    async fn update_on_completion(
        &self,
        job_id: Uuid,
        processed_url: String,
        processed_size: i64,
        face_meta: FaceMeta,
        duration_seconds: f64,
    ) -> Result<()>;

    /// Terminal failure after exhausting retries or a fatal classification.
    async fn mark_failed(
        &self,
        job_id: Uuid,
        reason_kind: String,
        duration_seconds: f64,
    ) -> Result<()>;

    async fn get_by_job_id(&self, job_id: Uuid) -> Result<Option<JobRecord>>;

    async fn query(&self, filters: QueryFilters, limit: i64) -> Result<Vec<JobRecord>>;

    async fn aggregate(&self) -> Result<AggregateStats>;

    /// Used by the API's `/health` route and by startup readiness checks.
    async fn health_check(&self) -> Result<()>;
}
