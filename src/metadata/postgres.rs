//! Postgres-backed `MetadataStore`. All SQL here is runtime-checked
//! (`sqlx::query`/`query_as` against a `&str`, never the `query!` macro
//! family) since there is no live database to `cargo sqlx prepare`
//! against at build time.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::types::Json;
use sqlx::PgPool;
use std::time::Duration;
use uuid::Uuid;

use super::error::{MetadataError, Result};
use super::store::MetadataStore;
use super::types::{
    AggregateStats, FaceMeta, JobRecord, JobStatus, NewJobRecord, QueryFilters,
    VehicleDetectionData,
};

pub struct PgMetadataStore {
    pool: PgPool,
}

#[derive(Debug, sqlx::FromRow)]
struct PgJobRow {
    id: Uuid,
    job_id: Uuid,
    original_filename: String,
    content_type: String,
    blob_original_url: Option<String>,
    blob_processed_url: Option<String>,
    is_vehicle_detected: bool,
    is_face_detected: bool,
    is_face_blurred: bool,
    file_size_original: i64,
    file_size_processed: Option<i64>,
    processing_time_seconds: Option<f64>,
    vehicle_detection_data: Option<Json<VehicleDetectionData>>,
    face_detection_data: Option<Json<FaceMeta>>,
    created_at: DateTime<Utc>,
    processed_at: Option<DateTime<Utc>>,
    status: String,
    failure_reason: Option<String>,
}

impl TryFrom<PgJobRow> for JobRecord {
    type Error = MetadataError;

    fn try_from(row: PgJobRow) -> std::result::Result<Self, Self::Error> {
        let status = row
            .status
            .parse::<JobStatus>()
            .map_err(MetadataError::Serialization)?;

        Ok(JobRecord {
            id: row.id,
            job_id: row.job_id,
            original_filename: row.original_filename,
            content_type: row.content_type,
            blob_original_url: row.blob_original_url,
            blob_processed_url: row.blob_processed_url,
            is_vehicle_detected: row.is_vehicle_detected,
            is_face_detected: row.is_face_detected,
            is_face_blurred: row.is_face_blurred,
            file_size_original: row.file_size_original,
            file_size_processed: row.file_size_processed,
            processing_time_seconds: row.processing_time_seconds,
            vehicle_detection_data: row.vehicle_detection_data.map(|Json(v)| v),
            face_detection_data: row.face_detection_data.map(|Json(v)| v),
            created_at: row.created_at,
            processed_at: row.processed_at,
            status,
            failure_reason: row.failure_reason,
        })
    }
}

impl PgMetadataStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect with a bounded pool (recommended size ~20, recycle ~1h per
    /// spec §4.3) and run pending migrations.
    pub async fn connect(
        database_url: &str,
        max_connections: u32,
        max_lifetime_secs: u64,
    ) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .max_lifetime(Duration::from_secs(max_lifetime_secs))
            .connect(database_url)
            .await
            .map_err(|e| MetadataError::Unavailable(e.to_string()))?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| MetadataError::Unavailable(e.to_string()))?;

        Ok(Self::new(pool))
    }
}

#[async_trait]
impl MetadataStore for PgMetadataStore {
    async fn insert(&self, record: NewJobRecord) -> Result<()> {
        let id = Uuid::new_v4();

        let result = sqlx::query(
            r#"
            INSERT INTO processed_images (
                id, job_id, original_filename, content_type,
                blob_original_url, is_vehicle_detected,
                file_size_original, vehicle_detection_data,
                created_at, status
            ) VALUES ($1, $2, $3, $4, $5, TRUE, $6, $7, $8, 'submitted')
            "#,
        )
        .bind(id)
        .bind(record.job_id)
        .bind(&record.original_filename)
        .bind(&record.content_type)
        .bind(&record.blob_original_url)
        .bind(record.file_size_original)
        .bind(Json(&record.vehicle_detection_data))
        .bind(record.created_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                Err(MetadataError::Duplicate(record.job_id))
            }
            Err(e) => Err(MetadataError::Unavailable(e.to_string())),
        }
    }

    async fn mark_processing(&self, job_id: Uuid) -> Result<()> {
        sqlx::query(
            "UPDATE processed_images SET status = 'processing' \
             WHERE job_id = $1 AND status = 'submitted'",
        )
        .bind(job_id)
        .execute(&self.pool)
        .await
        .map_err(|e| MetadataError::Unavailable(e.to_string()))?;

        Ok(())
    }

    async fn update_on_completion(
        &self,
        job_id: Uuid,
        processed_url: String,
        processed_size: i64,
        face_meta: FaceMeta,
        duration_seconds: f64,
    ) -> Result<()> {
        // status != 'completed' guard keeps a terminal row from regressing
        // (spec invariant: completed rows are never re-written).
        sqlx::query(
            r#"
            UPDATE processed_images SET
                blob_processed_url = $2,
                file_size_processed = $3,
                processing_time_seconds = $4,
                face_detection_data = $5,
                is_face_detected = $6,
                is_face_blurred = $6,
                status = 'completed',
                processed_at = now()
            WHERE job_id = $1 AND status != 'completed'
            "#,
        )
        .bind(job_id)
        .bind(processed_url)
        .bind(processed_size)
        .bind(duration_seconds)
        .bind(Json(&face_meta))
        .bind(face_meta.face_count > 0)
        .execute(&self.pool)
        .await
        .map_err(|e| MetadataError::Unavailable(e.to_string()))?;

        Ok(())
    }

    async fn mark_failed(
        &self,
        job_id: Uuid,
        reason_kind: String,
        duration_seconds: f64,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE processed_images SET
                status = 'failed',
                failure_reason = $2,
                processing_time_seconds = $3
            WHERE job_id = $1 AND status != 'completed'
            "#,
        )
        .bind(job_id)
        .bind(reason_kind)
        .bind(duration_seconds)
        .execute(&self.pool)
        .await
        .map_err(|e| MetadataError::Unavailable(e.to_string()))?;

        Ok(())
    }

    async fn get_by_job_id(&self, job_id: Uuid) -> Result<Option<JobRecord>> {
        let row = sqlx::query_as::<_, PgJobRow>(
            "SELECT * FROM processed_images WHERE job_id = $1",
        )
        .bind(job_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| MetadataError::Unavailable(e.to_string()))?;

        row.map(JobRecord::try_from).transpose()
    }

    async fn query(&self, filters: QueryFilters, limit: i64) -> Result<Vec<JobRecord>> {
        let mut sql = String::from("SELECT * FROM processed_images WHERE 1=1");

        // Runtime query-building keeps the set of active filters flexible
        // without reaching for a query builder crate the teacher never uses.
        let mut bind_idx = 1;
        let mut conditions: Vec<(String, bool)> = Vec::new();
        if let Some(v) = filters.is_vehicle_detected {
            bind_idx += 1;
            conditions.push((format!(" AND is_vehicle_detected = ${bind_idx}"), v));
        }
        if let Some(v) = filters.is_face_detected {
            bind_idx += 1;
            conditions.push((format!(" AND is_face_detected = ${bind_idx}"), v));
        }
        if let Some(v) = filters.is_face_blurred {
            bind_idx += 1;
            conditions.push((format!(" AND is_face_blurred = ${bind_idx}"), v));
        }
        for (clause, _) in &conditions {
            sql.push_str(clause);
        }
        sql.push_str(" ORDER BY created_at DESC LIMIT $1");

        let mut query = sqlx::query_as::<_, PgJobRow>(&sql).bind(limit);
        for (_, value) in &conditions {
            query = query.bind(*value);
        }

        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(|e| MetadataError::Unavailable(e.to_string()))?;

        rows.into_iter().map(JobRecord::try_from).collect()
    }

    async fn aggregate(&self) -> Result<AggregateStats> {
        let row: (i64, i64, i64, i64, Option<f64>) = sqlx::query_as(
            r#"
            SELECT
                COUNT(*),
                COUNT(*) FILTER (WHERE is_vehicle_detected),
                COUNT(*) FILTER (WHERE is_face_detected),
                COUNT(*) FILTER (WHERE is_face_blurred),
                AVG(processing_time_seconds) FILTER (WHERE status = 'completed')
            FROM processed_images
            "#,
        )
        .fetch_one(&self.pool)
        .await
        .map_err(|e| MetadataError::Unavailable(e.to_string()))?;

        Ok(AggregateStats {
            total: row.0,
            vehicles_detected: row.1,
            faces_detected: row.2,
            faces_blurred: row.3,
            avg_processing_seconds: row.4.unwrap_or(0.0),
        })
    }

    async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| MetadataError::Unavailable(e.to_string()))?;
        Ok(())
    }
}
