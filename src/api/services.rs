use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use base64::Engine;
use http_body_util::BodyExt;
use uuid::Uuid;

use super::error::ApiError;
use super::models::{
    BatchSubmitRequest, BatchSubmitResponse, HealthResponse, JobStatusResponse,
    QueryParams, QueryResponse, QueueStatusResponse, StatsResponse, SubmitResponse,
};
use super::state::AppState;
use crate::gate::SubmitRequest;
use crate::metadata::QueryFilters;

const DEFAULT_QUERY_LIMIT: i64 = 100;
const MAX_QUERY_LIMIT: i64 = 1000;

/// `POST /jobs` — `Submit` (spec §4.5, §6). The ingestion layer's job
/// (multipart parsing, base64, form validation) is out of scope; this
/// handler only extracts the byte blob and filename/content-type headers
/// the Admission Gate needs.
pub async fn submit(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: axum::body::Body,
) -> Result<impl IntoResponse, ApiError> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::Validation("missing Content-Type header".into()))?;
    super::utils::parse_image_content_type(content_type)?;

    let filename = headers
        .get("x-filename")
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::Validation("X-Filename header is required".into()))?;

    let max_bytes = state.config.server.inline_payload_max_bytes.as_u64() as usize * 16;
    let bytes = read_body(body, max_bytes).await?;

    let outcome = state
        .gate
        .submit(SubmitRequest {
            bytes,
            filename,
            content_type: content_type.to_string(),
        })
        .await?;

    let status = if outcome.accepted {
        StatusCode::ACCEPTED
    } else {
        StatusCode::OK
    };

    Ok((
        status,
        Json(SubmitResponse {
            job_id: outcome.job_id,
            accepted: outcome.accepted,
            reason: outcome.reason,
        }),
    ))
}

/// `POST /jobs/batch` — `BatchSubmit` (spec §4.5). Admission of each
/// file is independent; a bad entry does not affect its siblings.
pub async fn batch_submit(
    State(state): State<AppState>,
    Json(request): Json<BatchSubmitRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let mut requests = Vec::with_capacity(request.files.len());
    for item in request.files {
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(item.data)
            .map_err(|e| ApiError::Validation(format!("invalid base64 payload: {e}")))?;
        requests.push(SubmitRequest {
            bytes,
            filename: item.filename,
            content_type: item.content_type,
        });
    }

    let outcome = state.gate.batch_submit(requests).await;

    Ok((
        StatusCode::OK,
        Json(BatchSubmitResponse {
            accepted: outcome.accepted,
            skipped: outcome.skipped,
            outcomes: outcome
                .outcomes
                .into_iter()
                .map(|o| SubmitResponse {
                    job_id: o.job_id,
                    accepted: o.accepted,
                    reason: o.reason,
                })
                .collect(),
        }),
    ))
}

/// `GET /jobs/{job_id}` — `GetStatus` (spec §6).
pub async fn get_status(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let row = state
        .metadata
        .get_by_job_id(job_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("job {job_id}")))?;

    Ok(Json(JobStatusResponse::from(row)))
}

/// `GET /jobs` — `Query` (spec §4.3).
pub async fn query(
    State(state): State<AppState>,
    Query(params): Query<QueryParams>,
) -> Result<impl IntoResponse, ApiError> {
    let filters = QueryFilters {
        is_vehicle_detected: params.is_vehicle_detected,
        is_face_detected: params.is_face_detected,
        is_face_blurred: params.is_face_blurred,
    };
    let limit = params
        .limit
        .unwrap_or(DEFAULT_QUERY_LIMIT)
        .clamp(1, MAX_QUERY_LIMIT);

    let rows = state.metadata.query(filters, limit).await?;

    Ok(Json(QueryResponse {
        jobs: rows.into_iter().map(JobStatusResponse::from).collect(),
    }))
}

/// `GET /stats` — `Stats` (spec §4.8): live counters plus the durable
/// aggregate from the Metadata Store.
pub async fn stats(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let durable = state.metadata.aggregate().await?;
    Ok(Json(StatsResponse {
        live: state.stats.snapshot(),
        durable,
    }))
}

/// `GET /queue` — `QueueStatus` (spec §6, §4.7).
pub async fn queue_status(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let depth = state.queue.depth().await?;
    Ok(Json(QueueStatusResponse {
        depth,
        active_workers: state.dispatcher.active_workers(),
        num_workers: state.config.worker.num_workers,
    }))
}

/// `GET /health` — `Health` (spec §6).
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let mut components = std::collections::HashMap::new();

    let metadata_ok = state.metadata.health_check().await.is_ok();
    components.insert("metadata", if metadata_ok { "healthy" } else { "unhealthy" });

    let queue_ok = state.queue.depth().await.is_ok();
    components.insert("queue", if queue_ok { "healthy" } else { "unhealthy" });

    let blob_ok = state.blob.health_check().await.is_ok();
    components.insert("blob", if blob_ok { "healthy" } else { "unhealthy" });

    components.insert("api", "healthy");

    let all_healthy = components.values().all(|status| *status == "healthy");
    let status = if all_healthy { "healthy" } else { "unhealthy" };
    let status_code = if all_healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status_code,
        Json(HealthResponse {
            status,
            components,
            version: env!("CARGO_PKG_VERSION"),
        }),
    )
}

async fn read_body(body: axum::body::Body, max_size: usize) -> Result<Vec<u8>, ApiError> {
    let data = body
        .collect()
        .await
        .map_err(|err| ApiError::Internal(err.to_string()))?
        .to_bytes()
        .to_vec();

    super::utils::validate_body_size(&data, max_size)?;

    Ok(data)
}
