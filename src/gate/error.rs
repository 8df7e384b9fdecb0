use thiserror::Error;

/// Error kinds surfaced synchronously to the caller of `Submit`/`BatchSubmit`
/// (spec §7). `NoVehicle` is not really an error — it's folded into the
/// `accepted: false` result shape rather than returned as an `Err` — but
/// every other branch here maps onto a spec error kind one-to-one.
#[derive(Debug, Error)]
pub enum GateError {
    #[error("payload invalid: {0}")]
    Validation(String),

    #[error("queue unavailable: {0}")]
    QueueUnavailable(String),

    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("metadata store unavailable: {0}")]
    MetadataUnavailable(String),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, GateError>;
