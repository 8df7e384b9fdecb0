use std::sync::Arc;

use tokio::sync::{OnceCell, Semaphore};

use super::error::Result;
use super::runtime::ModelRuntime;
use crate::metadata::{FaceMeta, VehicleDetectionData};

/// Process-scoped value constructed once and shared by reference — no
/// module-level mutable state (spec §9). The runtime itself loads lazily
/// behind `OnceCell`'s single-entry gate; call concurrency is bounded by
/// an internal semaphore sized to `NUM_WORKERS` so the Admission Gate and
/// every Worker can never collectively exceed the configured concurrency
/// (spec §4.4, §5).
pub struct ModelManager {
    runtime: OnceCell<Arc<dyn ModelRuntime>>,
    loader: Box<dyn Fn() -> Arc<dyn ModelRuntime> + Send + Sync>,
    gate: Semaphore,
    car_confidence_threshold: f32,
    face_confidence_threshold: f32,
}

/// Vehicle classes recognized by the underlying detector (spec GLOSSARY).
const VEHICLE_CLASSES: &[&str] = &["car", "bus", "truck", "motorcycle"];

impl ModelManager {
    pub fn new(
        loader: impl Fn() -> Arc<dyn ModelRuntime> + Send + Sync + 'static,
        max_concurrency: usize,
        car_confidence_threshold: f32,
        face_confidence_threshold: f32,
    ) -> Self {
        Self {
            runtime: OnceCell::new(),
            loader: Box::new(loader),
            gate: Semaphore::new(max_concurrency.max(1)),
            car_confidence_threshold,
            face_confidence_threshold,
        }
    }

    /// Stub-backed manager for tests and local development, matching
    /// `StorageClient::in_memory()`'s role as a drop-in test double.
    pub fn stub(max_concurrency: usize) -> Self {
        Self::new(
            || Arc::new(super::runtime::StubModelRuntime) as Arc<dyn ModelRuntime>,
            max_concurrency,
            0.8,
            0.8,
        )
    }

    async fn runtime(&self) -> Arc<dyn ModelRuntime> {
        self.runtime
            .get_or_init(|| async { (self.loader)() })
            .await
            .clone()
    }

    /// Runs the vehicle model and returns true iff any raw detection has
    /// a vehicle class above the confidence threshold (spec §4.4). The
    /// only entry point for vehicle detection — the Admission Gate and a
    /// re-verifying Worker both call through here so the accept/reject
    /// predicate can never drift between call sites (spec §4.4, §9).
    pub async fn detect_vehicles(&self, bytes: &[u8]) -> Result<bool> {
        let (accepted, _) = self.detect_vehicles_full(bytes).await?;
        Ok(accepted)
    }

    /// Raw detection data plus the same boolean `detect_vehicles` would
    /// return, computed from a single model invocation — for callers
    /// (the Admission Gate) that need to persist the structured data
    /// alongside the accept/reject outcome without a second inference
    /// pass or a duplicated threshold check.
    pub async fn detect_vehicles_full(&self, bytes: &[u8]) -> Result<(bool, VehicleDetectionData)> {
        let _permit = self.gate.acquire().await.expect("semaphore not closed");
        let runtime = self.runtime().await;
        let raw = runtime.detect_vehicles_raw(bytes).await?;

        let accepted = raw
            .class_ids
            .iter()
            .zip(raw.confidences.iter())
            .any(|(class_id, confidence)| {
                VEHICLE_CLASSES.contains(&class_id.as_str())
                    && *confidence >= self.car_confidence_threshold
            });

        Ok((accepted, raw))
    }

    /// Runs the face model, blurs every region above the configured
    /// threshold, and returns the re-encoded bytes plus face metadata
    /// (spec §4.4).
    pub async fn detect_and_blur_faces(&self, bytes: &[u8]) -> Result<(Vec<u8>, FaceMeta)> {
        let _permit = self.gate.acquire().await.expect("semaphore not closed");
        let runtime = self.runtime().await;
        runtime
            .detect_and_blur_faces_raw(bytes, self.face_confidence_threshold)
            .await
    }
}
