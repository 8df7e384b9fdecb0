//! End-to-end tests covering the full pipeline: admission through the
//! `AdmissionGate`, durable enqueue via `FjallQueue`, a real `Dispatcher`
//! worker pool running `detect_and_blur_faces`, and the resulting
//! `MetadataStore` row and `StatsAggregator` counters.
//!
//! Unlike the admission-only tests in `gate::tests` and the HTTP-surface
//! tests in `api_test.rs`, these drive jobs all the way to completion or
//! failure through a live worker pool.

use std::sync::Arc;
use std::time::Duration;

use imagegate::gate::{AdmissionGate, SubmitRequest};
use imagegate::metadata::{InMemoryMetadataStore, JobStatus, MetadataStore};
use imagegate::models::ModelManager;
use imagegate::queue::{FjallQueue, QueueAdapter};
use imagegate::stats::StatsAggregator;
use imagegate::storage::StorageClient;
use imagegate::worker::{Dispatcher, WorkerConfig, WorkerDeps};
use tempfile::TempDir;
use uuid::Uuid;

struct Harness {
    gate: AdmissionGate,
    metadata: Arc<dyn MetadataStore>,
    dispatcher: Dispatcher,
    _queue_dir: TempDir,
}

impl Harness {
    async fn spawn(num_workers: usize, max_attempts: u32) -> Self {
        let queue_dir = TempDir::new().unwrap();
        let queue = Arc::new(
            FjallQueue::open(queue_dir.path(), 1000, Duration::from_secs(60)).unwrap(),
        );
        let metadata: Arc<dyn MetadataStore> = Arc::new(InMemoryMetadataStore::new());
        let blob = Arc::new(StorageClient::in_memory());
        let models = Arc::new(ModelManager::stub(4));

        let gate = AdmissionGate::new(
            queue.clone(),
            metadata.clone(),
            blob.clone(),
            models.clone(),
            262_144,
        );
        let stats = Arc::new(StatsAggregator::new());
        let dispatcher = Dispatcher::spawn(
            WorkerConfig {
                num_workers,
                worker_timeout: Duration::from_secs(5),
                poll_timeout: Duration::from_millis(50),
            },
            WorkerDeps {
                queue,
                metadata: metadata.clone(),
                blob,
                models,
                stats,
                max_attempts,
            },
        );

        Self {
            gate,
            metadata,
            dispatcher,
            _queue_dir: queue_dir,
        }
    }

    async fn wait_for_status(&self, job_id: Uuid, status: JobStatus, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if let Some(row) = self.metadata.get_by_job_id(job_id).await.unwrap() {
                if row.status == status {
                    return true;
                }
            }
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}

fn request(bytes: &[u8], filename: &str) -> SubmitRequest {
    SubmitRequest {
        bytes: bytes.to_vec(),
        filename: filename.to_string(),
        content_type: "image/jpeg".to_string(),
    }
}

#[tokio::test]
async fn test_vehicle_job_runs_to_completion_with_no_faces() {
    let harness = Harness::spawn(2, 5).await;

    let outcome = harness.gate.submit(request(b"a car photo", "car.jpg")).await.unwrap();
    assert!(outcome.accepted);

    let completed = harness
        .wait_for_status(outcome.job_id, JobStatus::Completed, Duration::from_secs(2))
        .await;
    assert!(completed, "job never reached Completed");

    let row = harness
        .metadata
        .get_by_job_id(outcome.job_id)
        .await
        .unwrap()
        .unwrap();
    assert!(row.is_vehicle_detected);
    assert!(!row.is_face_detected);
    assert!(!row.is_face_blurred);
    assert!(row.blob_processed_url.is_some());
    assert!(row.processing_time_seconds.unwrap() >= 0.0);

    harness.dispatcher.shutdown().await;
}

#[tokio::test]
async fn test_vehicle_with_face_is_blurred_and_flagged() {
    let harness = Harness::spawn(2, 5).await;

    let outcome = harness
        .gate
        .submit(request(b"a car with a face in it", "car_face.jpg"))
        .await
        .unwrap();
    assert!(outcome.accepted);

    let completed = harness
        .wait_for_status(outcome.job_id, JobStatus::Completed, Duration::from_secs(2))
        .await;
    assert!(completed);

    let row = harness
        .metadata
        .get_by_job_id(outcome.job_id)
        .await
        .unwrap()
        .unwrap();
    assert!(row.is_face_detected);
    assert!(row.is_face_blurred);
    let face_meta = row.face_detection_data.unwrap();
    assert_eq!(face_meta.face_count, 1);

    harness.dispatcher.shutdown().await;
}

#[tokio::test]
async fn test_decode_failure_exhausts_immediately_as_fatal() {
    let harness = Harness::spawn(2, 5).await;

    // The Admission Gate's own vehicle pre-check runs the same model and
    // rejects `noise` before a row ever exists, so to exercise the
    // worker's fatal-decode path we push directly around the gate.
    let queue_dir = harness._queue_dir.path();
    let queue = Arc::new(
        FjallQueue::open(queue_dir, 1000, Duration::from_secs(60)).unwrap(),
    );
    let job_id = Uuid::now_v7();
    harness
        .metadata
        .insert(imagegate::metadata::NewJobRecord {
            job_id,
            original_filename: "noise.jpg".to_string(),
            content_type: "image/jpeg".to_string(),
            blob_original_url: "blob://bucket/original/noise.jpg".to_string(),
            file_size_original: 5,
            vehicle_detection_data: Default::default(),
            created_at: chrono::Utc::now(),
        })
        .await
        .unwrap();
    queue
        .push(imagegate::queue::Envelope::new(
            job_id,
            "noise.jpg".to_string(),
            "image/jpeg".to_string(),
            imagegate::queue::PayloadRef::Inline(b"noise".to_vec()),
            chrono::Utc::now().timestamp(),
        ))
        .await
        .unwrap();

    let failed = harness
        .wait_for_status(job_id, JobStatus::Failed, Duration::from_secs(2))
        .await;
    assert!(failed, "job never reached Failed");

    let row = harness.metadata.get_by_job_id(job_id).await.unwrap().unwrap();
    assert_eq!(row.failure_reason.as_deref(), Some("decode"));

    harness.dispatcher.shutdown().await;
}

#[tokio::test]
async fn test_shutdown_is_idempotent_and_drains_in_flight_work() {
    let harness = Harness::spawn(1, 5).await;

    let outcome = harness.gate.submit(request(b"a car photo", "car.jpg")).await.unwrap();
    assert!(outcome.accepted);

    harness.dispatcher.shutdown().await;
    harness.dispatcher.shutdown().await;

    let row = harness
        .metadata
        .get_by_job_id(outcome.job_id)
        .await
        .unwrap()
        .unwrap();
    assert_ne!(row.status, JobStatus::Submitted, "job was never picked up before shutdown");
}
