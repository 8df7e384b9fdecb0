use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

use super::error::{MetadataError, Result};
use super::store::MetadataStore;
use super::types::{
    AggregateStats, FaceMeta, JobRecord, JobStatus, NewJobRecord, QueryFilters,
};

/// In-memory `MetadataStore`, standing in for Postgres the way
/// `StorageClient::in_memory()` stands in for a live object store — tests
/// exercise the same trait the production adapter implements.
#[derive(Default)]
pub struct InMemoryMetadataStore {
    rows: Mutex<HashMap<Uuid, JobRecord>>,
}

impl InMemoryMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MetadataStore for InMemoryMetadataStore {
    async fn insert(&self, record: NewJobRecord) -> Result<()> {
        let mut rows = self.rows.lock().unwrap();
        if rows.contains_key(&record.job_id) {
            return Err(MetadataError::Duplicate(record.job_id));
        }

        rows.insert(
            record.job_id,
            JobRecord {
                id: Uuid::new_v4(),
                job_id: record.job_id,
                original_filename: record.original_filename,
                content_type: record.content_type,
                blob_original_url: Some(record.blob_original_url),
                blob_processed_url: None,
                is_vehicle_detected: true,
                is_face_detected: false,
                is_face_blurred: false,
                file_size_original: record.file_size_original,
                file_size_processed: None,
                processing_time_seconds: None,
                vehicle_detection_data: Some(record.vehicle_detection_data),
                face_detection_data: None,
                created_at: record.created_at,
                processed_at: None,
                status: JobStatus::Submitted,
                failure_reason: None,
            },
        );

        Ok(())
    }

    async fn mark_processing(&self, job_id: Uuid) -> Result<()> {
        let mut rows = self.rows.lock().unwrap();
        if let Some(row) = rows.get_mut(&job_id) {
            if row.status == JobStatus::Submitted {
                row.status = JobStatus::Processing;
            }
        }
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
        let mut rows = self.rows.lock().unwrap();
        if let Some(row) = rows.get_mut(&job_id) {
            if row.status == JobStatus::Completed {
                return Ok(());
            }
            row.blob_processed_url = Some(processed_url);
            row.file_size_processed = Some(processed_size);
            row.processing_time_seconds = Some(duration_seconds);
            row.is_face_detected = face_meta.face_count > 0;
            row.is_face_blurred = face_meta.face_count > 0;
            row.face_detection_data = Some(face_meta);
            row.status = JobStatus::Completed;
            row.processed_at = Some(chrono::Utc::now());
        }
        Ok(())
    }

    async fn mark_failed(
        &self,
        job_id: Uuid,
        reason_kind: String,
        duration_seconds: f64,
    ) -> Result<()> {
        let mut rows = self.rows.lock().unwrap();
        if let Some(row) = rows.get_mut(&job_id) {
            if row.status == JobStatus::Completed {
                return Ok(());
            }
            row.status = JobStatus::Failed;
            row.failure_reason = Some(reason_kind);
            row.processing_time_seconds = Some(duration_seconds);
        }
        Ok(())
    }

    async fn get_by_job_id(&self, job_id: Uuid) -> Result<Option<JobRecord>> {
        Ok(self.rows.lock().unwrap().get(&job_id).cloned())
    }

    async fn query(&self, filters: QueryFilters, limit: i64) -> Result<Vec<JobRecord>> {
        let rows = self.rows.lock().unwrap();
        let mut matched: Vec<JobRecord> = rows
            .values()
            .filter(|r| {
                filters
                    .is_vehicle_detected
                    .is_none_or(|v| r.is_vehicle_detected == v)
                    && filters.is_face_detected.is_none_or(|v| r.is_face_detected == v)
                    && filters.is_face_blurred.is_none_or(|v| r.is_face_blurred == v)
            })
            .cloned()
            .collect();

        matched.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        matched.truncate(limit.max(0) as usize);
        Ok(matched)
    }

    async fn aggregate(&self) -> Result<AggregateStats> {
        let rows = self.rows.lock().unwrap();
        let total = rows.len() as i64;
        let vehicles_detected = rows.values().filter(|r| r.is_vehicle_detected).count() as i64;
        let faces_detected = rows.values().filter(|r| r.is_face_detected).count() as i64;
        let faces_blurred = rows.values().filter(|r| r.is_face_blurred).count() as i64;

        let completed: Vec<f64> = rows
            .values()
            .filter(|r| r.status == JobStatus::Completed)
            .filter_map(|r| r.processing_time_seconds)
            .collect();
        let avg_processing_seconds = if completed.is_empty() {
            0.0
        } else {
            completed.iter().sum::<f64>() / completed.len() as f64
        };

        Ok(AggregateStats {
            total,
            vehicles_detected,
            faces_detected,
            faces_blurred,
            avg_processing_seconds,
        })
    }

    async fn health_check(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::types::VehicleDetectionData;

    fn new_record(job_id: Uuid) -> NewJobRecord {
        NewJobRecord {
            job_id,
            original_filename: "car.jpg".to_string(),
            content_type: "image/jpeg".to_string(),
            blob_original_url: "blob://bucket/original/x.jpg".to_string(),
            file_size_original: 1024,
            vehicle_detection_data: VehicleDetectionData {
                detection_count: 1,
                class_ids: vec!["car".to_string()],
                boxes: vec![[0.0, 0.0, 1.0, 1.0]],
                confidences: vec![0.95],
            },
            created_at: chrono::Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_insert_then_get() {
        let store = InMemoryMetadataStore::new();
        let job_id = Uuid::new_v4();
        store.insert(new_record(job_id)).await.unwrap();

        let row = store.get_by_job_id(job_id).await.unwrap().unwrap();
        assert_eq!(row.status, JobStatus::Submitted);
        assert!(row.is_vehicle_detected);
    }

    #[tokio::test]
    async fn test_duplicate_insert_rejected() {
        let store = InMemoryMetadataStore::new();
        let job_id = Uuid::new_v4();
        store.insert(new_record(job_id)).await.unwrap();

        let err = store.insert(new_record(job_id)).await.unwrap_err();
        assert!(matches!(err, MetadataError::Duplicate(_)));
    }

    #[tokio::test]
    async fn test_completion_never_regresses() {
        let store = InMemoryMetadataStore::new();
        let job_id = Uuid::new_v4();
        store.insert(new_record(job_id)).await.unwrap();

        let face_meta = FaceMeta {
            face_count: 1,
            boxes: vec![[0.1, 0.1, 0.2, 0.2]],
            confidences: vec![0.9],
        };
        store
            .update_on_completion(job_id, "blob://bucket/processed/x.jpg".into(), 900, face_meta, 1.2)
            .await
            .unwrap();

        // A second completion update (redelivery) must be a no-op.
        let face_meta_2 = FaceMeta {
            face_count: 0,
            boxes: vec![],
            confidences: vec![],
        };
        store
            .update_on_completion(job_id, "blob://bucket/processed/y.jpg".into(), 1, face_meta_2, 99.0)
            .await
            .unwrap();

        let row = store.get_by_job_id(job_id).await.unwrap().unwrap();
        assert_eq!(row.status, JobStatus::Completed);
        assert_eq!(row.blob_processed_url.unwrap(), "blob://bucket/processed/x.jpg");
        assert!(row.is_face_blurred);
    }

    #[tokio::test]
    async fn test_query_filters() {
        let store = InMemoryMetadataStore::new();
        let job_id = Uuid::new_v4();
        store.insert(new_record(job_id)).await.unwrap();

        let results = store
            .query(
                QueryFilters {
                    is_vehicle_detected: Some(true),
                    ..Default::default()
                },
                10,
            )
            .await
            .unwrap();
        assert_eq!(results.len(), 1);

        let results = store
            .query(
                QueryFilters {
                    is_face_detected: Some(true),
                    ..Default::default()
                },
                10,
            )
            .await
            .unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_aggregate() {
        let store = InMemoryMetadataStore::new();
        let job_id = Uuid::new_v4();
        store.insert(new_record(job_id)).await.unwrap();

        let stats = store.aggregate().await.unwrap();
        assert_eq!(stats.total, 1);
        assert_eq!(stats.vehicles_detected, 1);
        assert_eq!(stats.faces_detected, 0);
    }
}
