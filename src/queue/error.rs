use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("queue storage error: {0}")]
    Fjall(#[from] fjall::Error),

    #[error("envelope serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("queue unavailable: {0}")]
    Unavailable(String),

    #[error("queue is full (depth >= max_queue_size)")]
    Backpressure,

    #[error("no envelope found for delivery_id={0}")]
    NotFound(u64),
}

pub type Result<T> = std::result::Result<T, QueueError>;
