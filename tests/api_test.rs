use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use imagegate::api::state::AppState;
use imagegate::config::{
    BlobConfig, Config, GateConfig, MetadataConfig, QueueConfig, ServerConfig,
    WorkerConfig as WorkerSettings,
};
use imagegate::gate::AdmissionGate;
use imagegate::metadata::{InMemoryMetadataStore, MetadataStore};
use imagegate::models::ModelManager;
use imagegate::queue::FjallQueue;
use imagegate::stats::StatsAggregator;
use imagegate::storage::StorageClient;
use imagegate::worker::{Dispatcher, WorkerConfig, WorkerDeps};
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

async fn build_test_app() -> (Router, TempDir) {
    build_test_app_with_workers(2).await
}

/// `num_workers: 0` leaves submitted jobs sitting in `submitted` state so
/// status/query assertions aren't racing the worker pool.
async fn build_test_app_with_workers(num_workers: usize) -> (Router, TempDir) {
    let queue_dir = TempDir::new().unwrap();
    let queue = Arc::new(FjallQueue::open(queue_dir.path(), 1000, Duration::from_secs(60)).unwrap());
    let metadata: Arc<dyn MetadataStore> = Arc::new(InMemoryMetadataStore::new());
    let blob = Arc::new(StorageClient::in_memory());
    let models = Arc::new(ModelManager::stub(4));

    let gate = Arc::new(AdmissionGate::new(
        queue.clone(),
        metadata.clone(),
        blob.clone(),
        models.clone(),
        262_144,
    ));
    let stats = Arc::new(StatsAggregator::new());
    let dispatcher = Arc::new(Dispatcher::spawn(
        WorkerConfig {
            num_workers,
            worker_timeout: Duration::from_secs(5),
            poll_timeout: Duration::from_millis(100),
        },
        WorkerDeps {
            queue: queue.clone(),
            metadata: metadata.clone(),
            blob: blob.clone(),
            models,
            stats: stats.clone(),
            max_attempts: 5,
        },
    ));

    let config = Config {
        server: ServerConfig::default(),
        queue: QueueConfig::default(),
        metadata: MetadataConfig::default(),
        blob: BlobConfig::default(),
        worker: WorkerSettings::default(),
        gate: GateConfig::default(),
    };
    let state = AppState {
        config: Arc::new(config),
        gate,
        metadata,
        queue,
        blob,
        stats,
        dispatcher,
    };

    let router = imagegate::api::build_router(state);
    (router, queue_dir)
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_submit_accepts_vehicle_image() {
    let (app, _dir) = build_test_app().await;

    let request = Request::builder()
        .method("POST")
        .uri("/jobs")
        .header(header::CONTENT_TYPE, "image/jpeg")
        .header("x-filename", "car.jpg")
        .body(Body::from(b"a car photo".to_vec()))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let body = body_json(response).await;
    assert_eq!(body["accepted"], json!(true));
    assert!(body["job_id"].is_string());
}

#[tokio::test]
async fn test_submit_rejects_image_without_vehicle() {
    let (app, _dir) = build_test_app().await;

    let request = Request::builder()
        .method("POST")
        .uri("/jobs")
        .header(header::CONTENT_TYPE, "image/jpeg")
        .header("x-filename", "landscape.jpg")
        .body(Body::from(b"a landscape".to_vec()))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["accepted"], json!(false));
    assert_eq!(body["reason"], json!("no-vehicle"));
}

#[tokio::test]
async fn test_submit_missing_filename_header_is_rejected() {
    let (app, _dir) = build_test_app().await;

    let request = Request::builder()
        .method("POST")
        .uri("/jobs")
        .header(header::CONTENT_TYPE, "image/jpeg")
        .body(Body::from(b"a car photo".to_vec()))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_submit_rejects_non_image_content_type() {
    let (app, _dir) = build_test_app().await;

    let request = Request::builder()
        .method("POST")
        .uri("/jobs")
        .header(header::CONTENT_TYPE, "application/json")
        .header("x-filename", "car.jpg")
        .body(Body::from(b"{}".to_vec()))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_get_status_then_query_roundtrip() {
    let (app, _dir) = build_test_app_with_workers(0).await;

    let submit_request = Request::builder()
        .method("POST")
        .uri("/jobs")
        .header(header::CONTENT_TYPE, "image/jpeg")
        .header("x-filename", "car.jpg")
        .body(Body::from(b"a car photo".to_vec()))
        .unwrap();
    let submit_response = app.clone().oneshot(submit_request).await.unwrap();
    let submitted = body_json(submit_response).await;
    let job_id = submitted["job_id"].as_str().unwrap();

    let status_request = Request::builder()
        .method("GET")
        .uri(format!("/jobs/{job_id}"))
        .body(Body::empty())
        .unwrap();
    let status_response = app.clone().oneshot(status_request).await.unwrap();
    assert_eq!(status_response.status(), StatusCode::OK);
    let status = body_json(status_response).await;
    assert_eq!(status["status"], json!("submitted"));

    let query_request = Request::builder()
        .method("GET")
        .uri("/jobs?is_vehicle_detected=true")
        .body(Body::empty())
        .unwrap();
    let query_response = app.oneshot(query_request).await.unwrap();
    assert_eq!(query_response.status(), StatusCode::OK);
    let query_body = body_json(query_response).await;
    assert_eq!(query_body["jobs"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_get_status_unknown_job_is_not_found() {
    let (app, _dir) = build_test_app().await;

    let request = Request::builder()
        .method("GET")
        .uri(format!("/jobs/{}", uuid::Uuid::now_v7()))
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_batch_submit_is_independent_per_file() {
    use base64::Engine;
    let (app, _dir) = build_test_app().await;

    let encode = |bytes: &[u8]| base64::engine::general_purpose::STANDARD.encode(bytes);
    let request_body = json!({
        "files": [
            {"filename": "a.jpg", "content_type": "image/jpeg", "data": encode(b"a car photo")},
            {"filename": "b.jpg", "content_type": "image/jpeg", "data": encode(b"a landscape")},
        ]
    });

    let request = Request::builder()
        .method("POST")
        .uri("/jobs/batch")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(request_body.to_string()))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["accepted"].as_array().unwrap().len(), 1);
    assert_eq!(body["skipped"], json!(1));
}

#[tokio::test]
async fn test_health_reports_healthy() {
    let (app, _dir) = build_test_app().await;

    let request = Request::builder()
        .method("GET")
        .uri("/health")
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["components"]["blob"], json!("healthy"));
}

#[tokio::test]
async fn test_queue_status_reports_depth() {
    let (app, _dir) = build_test_app().await;

    let submit_request = Request::builder()
        .method("POST")
        .uri("/jobs")
        .header(header::CONTENT_TYPE, "image/jpeg")
        .header("x-filename", "car.jpg")
        .body(Body::from(b"a car photo".to_vec()))
        .unwrap();
    app.clone().oneshot(submit_request).await.unwrap();

    let request = Request::builder()
        .method("GET")
        .uri("/queue")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["num_workers"], json!(2));
}
