use super::models::Config;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("worker.num_workers must be positive, got {0}")]
    InvalidNumWorkers(usize),

    #[error("queue.max_queue_size must be positive")]
    InvalidMaxQueueSize,

    #[error("queue.max_attempts must be positive")]
    InvalidMaxAttempts,

    #[error("queue.visibility_timeout_secs must be positive")]
    InvalidVisibilityTimeout,

    #[error("gate.car_confidence_threshold must be in [0, 1], got {0}")]
    InvalidCarConfidenceThreshold(f32),

    #[error("gate.face_confidence_threshold must be in [0, 1], got {0}")]
    InvalidFaceConfidenceThreshold(f32),

    #[error("metadata.metadata_url must not be empty")]
    MissingMetadataUrl,

    #[error("metadata.pool_max_connections must be positive")]
    InvalidPoolMaxConnections,
}

/// Validate the entire configuration. Called once at startup, right after
/// the layered load (§4.7 — the dispatcher refuses to start on a bad config).
pub fn validate(config: &Config) -> Result<(), ValidationError> {
    validate_worker(config)?;
    validate_queue(config)?;
    validate_gate(config)?;
    validate_metadata(config)?;
    Ok(())
}

fn validate_worker(config: &Config) -> Result<(), ValidationError> {
    if config.worker.num_workers == 0 {
        return Err(ValidationError::InvalidNumWorkers(config.worker.num_workers));
    }
    Ok(())
}

fn validate_queue(config: &Config) -> Result<(), ValidationError> {
    if config.queue.max_queue_size == 0 {
        return Err(ValidationError::InvalidMaxQueueSize);
    }
    if config.queue.max_attempts == 0 {
        return Err(ValidationError::InvalidMaxAttempts);
    }
    if config.queue.visibility_timeout_secs == 0 {
        return Err(ValidationError::InvalidVisibilityTimeout);
    }
    Ok(())
}

fn validate_gate(config: &Config) -> Result<(), ValidationError> {
    let car = config.gate.car_confidence_threshold;
    if !(0.0..=1.0).contains(&car) {
        return Err(ValidationError::InvalidCarConfidenceThreshold(car));
    }
    let face = config.gate.face_confidence_threshold;
    if !(0.0..=1.0).contains(&face) {
        return Err(ValidationError::InvalidFaceConfidenceThreshold(face));
    }
    Ok(())
}

fn validate_metadata(config: &Config) -> Result<(), ValidationError> {
    if config.metadata.metadata_url.trim().is_empty() {
        return Err(ValidationError::MissingMetadataUrl);
    }
    if config.metadata.pool_max_connections == 0 {
        return Err(ValidationError::InvalidPoolMaxConnections);
    }
    Ok(())
}
