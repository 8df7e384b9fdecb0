//! Blob-store key discipline (spec §4.2).
//!
//! Key shapes are fixed; only the separator choice belongs to the
//! implementation. `{unix_ts}` is chosen once per job at admission and
//! reused across retries so that `put` stays idempotent under redelivery.

use uuid::Uuid;

/// Optional pre-processing staging location for large inline-ineligible
/// payloads.
pub fn staging_key(job_id: Uuid) -> String {
    format!("staging/{job_id}")
}

/// Key for the accepted original, stable across retries.
pub fn original_key(job_id: Uuid, unix_ts: i64, content_type: &str) -> String {
    format!("original/{job_id}_{unix_ts}.{}", ext_for(content_type))
}

/// Key for the post-blur artifact, stable across retries.
pub fn processed_key(job_id: Uuid, unix_ts: i64, content_type: &str) -> String {
    format!("processed/{job_id}_{unix_ts}.{}", ext_for(content_type))
}

/// Derive a filesystem-ish extension from a MIME type; `.bin` when unknown.
pub fn ext_for(content_type: &str) -> &'static str {
    match content_type {
        "image/jpeg" | "image/jpg" => "jpg",
        "image/png" => "png",
        "image/webp" => "webp",
        "image/gif" => "gif",
        "image/bmp" => "bmp",
        "image/tiff" => "tiff",
        _ => "bin",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_original_key_shape() {
        let job_id = Uuid::nil();
        let key = original_key(job_id, 1_700_000_000, "image/jpeg");
        assert_eq!(
            key,
            format!("original/{job_id}_1700000000.jpg")
        );
    }

    #[test]
    fn test_processed_key_shape() {
        let job_id = Uuid::nil();
        let key = processed_key(job_id, 1_700_000_000, "image/png");
        assert_eq!(
            key,
            format!("processed/{job_id}_1700000000.png")
        );
    }

    #[test]
    fn test_unknown_content_type_falls_back_to_bin() {
        assert_eq!(ext_for("application/octet-stream"), "bin");
    }

    #[test]
    fn test_key_is_stable_across_repeated_calls() {
        let job_id = Uuid::nil();
        let a = original_key(job_id, 42, "image/jpeg");
        let b = original_key(job_id, 42, "image/jpeg");
        assert_eq!(a, b);
    }
}
