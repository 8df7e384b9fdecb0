use thiserror::Error;

#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("metadata store unavailable: {0}")]
    Unavailable(String),

    #[error("duplicate job_id: {0}")]
    Duplicate(uuid::Uuid),

    #[error("job not found: {0}")]
    NotFound(uuid::Uuid),

    #[error("serialization error: {0}")]
    Serialization(String),
}

pub type Result<T> = std::result::Result<T, MetadataError>;
