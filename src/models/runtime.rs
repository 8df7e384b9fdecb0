use async_trait::async_trait;

use super::error::Result;
use crate::metadata::{FaceMeta, VehicleDetectionData};

/// The two opaque model functions (spec §1, §4.4, §6): fixed signatures,
/// swappable implementation. `ModelManager` is the only caller — this
/// trait exists so production code can point at a real inference backend
/// while tests point at a stub, without either side duplicating detection
/// logic.
#[async_trait]
pub trait ModelRuntime: Send + Sync {
    /// Decode `bytes` and run the vehicle-detection model, returning every
    /// raw detection above zero confidence. Thresholding against
    /// `CAR_CONFIDENCE_THRESHOLD` happens once, in `ModelManager`.
    async fn detect_vehicles_raw(&self, bytes: &[u8]) -> Result<VehicleDetectionData>;

    /// Decode `bytes`, run the face model, blur every detected region
    /// above `face_confidence_threshold`, and re-encode to the original
    /// container format.
    async fn detect_and_blur_faces_raw(
        &self,
        bytes: &[u8],
        face_confidence_threshold: f32,
    ) -> Result<(Vec<u8>, FaceMeta)>;
}

/// Deterministic stand-in runtime for tests: decodes nothing, classifies
/// by a cheap heuristic on the byte content so test fixtures can steer the
/// outcome (S1-S6 in spec §8) without shipping a real model.
///
/// A `"car"` marker byte sequence anywhere in the image yields one
/// `car` detection at confidence 0.95; a `"face"` marker yields one face
/// detection at confidence 0.95. Bytes equal to `b"noise"` simulate a
/// fatal decode failure.
pub struct StubModelRuntime;

#[async_trait]
impl ModelRuntime for StubModelRuntime {
    async fn detect_vehicles_raw(&self, bytes: &[u8]) -> Result<VehicleDetectionData> {
        if bytes == b"noise" {
            return Err(super::error::ModelError::DecodeError(
                "not a valid image container".to_string(),
            ));
        }

        if contains(bytes, b"car") {
            Ok(VehicleDetectionData {
                detection_count: 1,
                class_ids: vec!["car".to_string()],
                boxes: vec![[10.0, 10.0, 100.0, 100.0]],
                confidences: vec![0.95],
            })
        } else {
            Ok(VehicleDetectionData::default())
        }
    }

    async fn detect_and_blur_faces_raw(
        &self,
        bytes: &[u8],
        face_confidence_threshold: f32,
    ) -> Result<(Vec<u8>, FaceMeta)> {
        if bytes == b"noise" {
            return Err(super::error::ModelError::DecodeError(
                "not a valid image container".to_string(),
            ));
        }

        if contains(bytes, b"face") {
            let confidence = 0.95;
            if confidence >= face_confidence_threshold {
                return Ok((
                    bytes.to_vec(),
                    FaceMeta {
                        face_count: 1,
                        boxes: vec![[5.0, 5.0, 40.0, 40.0]],
                        confidences: vec![confidence],
                    },
                ));
            }
        }

        Ok((bytes.to_vec(), FaceMeta::default()))
    }
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}
