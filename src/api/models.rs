//! Wire types for the HTTP surface (spec §6). The core operations
//! (`Submit`, `BatchSubmit`, `GetStatus`, `Query`, `Stats`,
//! `QueueStatus`, `Health`) are contracts, not a fixed wire format; these
//! are this service's JSON rendering of them.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::metadata::{AggregateStats, FaceMeta, JobRecord, VehicleDetectionData};
use crate::stats::LiveStats;

#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub job_id: Uuid,
    pub accepted: bool,
    pub reason: Option<String>,
}

/// One file in a `BatchSubmit` request. `data` is base64-encoded image
/// bytes — the out-of-scope ingestion layer is assumed to have already
/// produced a validated byte blob per file (spec §1).
#[derive(Debug, Deserialize)]
pub struct BatchSubmitItem {
    pub filename: String,
    pub content_type: String,
    pub data: String,
}

#[derive(Debug, Deserialize)]
pub struct BatchSubmitRequest {
    pub files: Vec<BatchSubmitItem>,
}

#[derive(Debug, Serialize)]
pub struct BatchSubmitResponse {
    pub accepted: Vec<Uuid>,
    pub skipped: usize,
    pub outcomes: Vec<SubmitResponse>,
}

/// Job status payload on completion (spec §6): detection/blur metadata
/// plus the two blob URLs and the measured duration.
#[derive(Debug, Serialize)]
pub struct JobStatusResponse {
    pub job_id: Uuid,
    pub status: String,
    pub original_filename: String,
    pub content_type: String,
    pub blob_original_url: Option<String>,
    pub blob_processed_url: Option<String>,
    pub detection_metadata: VehicleDetectionData,
    pub blur_metadata: Option<FaceMeta>,
    pub processing_time_seconds: Option<f64>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub processed_at: Option<chrono::DateTime<chrono::Utc>>,
    pub failure_reason: Option<String>,
}

impl From<JobRecord> for JobStatusResponse {
    fn from(row: JobRecord) -> Self {
        Self {
            job_id: row.job_id,
            status: row.status.as_str().to_string(),
            original_filename: row.original_filename,
            content_type: row.content_type,
            blob_original_url: row.blob_original_url,
            blob_processed_url: row.blob_processed_url,
            detection_metadata: row.vehicle_detection_data.unwrap_or_default(),
            blur_metadata: row.face_detection_data,
            processing_time_seconds: row.processing_time_seconds,
            created_at: row.created_at,
            processed_at: row.processed_at,
            failure_reason: row.failure_reason,
        }
    }
}

/// Query-string filters for `GET /jobs` (spec §4.3 `Query`).
#[derive(Debug, Deserialize, Default)]
pub struct QueryParams {
    pub is_vehicle_detected: Option<bool>,
    pub is_face_detected: Option<bool>,
    pub is_face_blurred: Option<bool>,
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct QueryResponse {
    pub jobs: Vec<JobStatusResponse>,
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    #[serde(flatten)]
    pub live: LiveStats,
    pub durable: AggregateStats,
}

#[derive(Debug, Serialize)]
pub struct QueueStatusResponse {
    pub depth: usize,
    pub active_workers: usize,
    pub num_workers: usize,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub components: std::collections::HashMap<&'static str, &'static str>,
    pub version: &'static str,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: &'static str,
    pub message: String,
}
