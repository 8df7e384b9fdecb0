use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Job lifecycle status (spec §3). `rejected` never appears as a row —
/// rejected submissions have no Job Record — but the variant exists so
/// the type can round-trip through `GetStatus` callers that ask about a
/// `job_id` the gate never accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Submitted,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Submitted => "submitted",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }
}

impl std::str::FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "submitted" => Ok(JobStatus::Submitted),
            "processing" => Ok(JobStatus::Processing),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            other => Err(format!("unknown job status: {other}")),
        }
    }
}

/// Structured vehicle-detection output (spec §4.4).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VehicleDetectionData {
    pub detection_count: u32,
    pub class_ids: Vec<String>,
    pub boxes: Vec<[f32; 4]>,
    pub confidences: Vec<f32>,
}

/// Structured face-detect-and-blur output (spec §4.4).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FaceMeta {
    pub face_count: u32,
    pub boxes: Vec<[f32; 4]>,
    pub confidences: Vec<f32>,
}

/// The durable Job Record (spec §3), one row per accepted `job_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: Uuid,
    pub job_id: Uuid,
    pub original_filename: String,
    pub content_type: String,
    pub blob_original_url: Option<String>,
    pub blob_processed_url: Option<String>,
    pub is_vehicle_detected: bool,
    pub is_face_detected: bool,
    pub is_face_blurred: bool,
    pub file_size_original: i64,
    pub file_size_processed: Option<i64>,
    pub processing_time_seconds: Option<f64>,
    pub vehicle_detection_data: Option<VehicleDetectionData>,
    pub face_detection_data: Option<FaceMeta>,
    pub created_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
    pub status: JobStatus,
    pub failure_reason: Option<String>,
}

/// Fields the Admission Gate supplies at `Insert` time (spec §4.5 step 4).
#[derive(Debug, Clone)]
pub struct NewJobRecord {
    pub job_id: Uuid,
    pub original_filename: String,
    pub content_type: String,
    pub blob_original_url: String,
    pub file_size_original: i64,
    pub vehicle_detection_data: VehicleDetectionData,
    pub created_at: DateTime<Utc>,
}

/// Indexed filter for `Query` (spec §4.3).
#[derive(Debug, Clone, Default)]
pub struct QueryFilters {
    pub is_vehicle_detected: Option<bool>,
    pub is_face_detected: Option<bool>,
    pub is_face_blurred: Option<bool>,
}

/// Server-side aggregate (spec §4.3, §4.8).
#[derive(Debug, Clone, Default, Serialize)]
pub struct AggregateStats {
    pub total: i64,
    pub vehicles_detected: i64,
    pub faces_detected: i64,
    pub faces_blurred: i64,
    pub avg_processing_seconds: f64,
}
