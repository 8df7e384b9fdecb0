use thiserror::Error;

/// Classification of a failure inside `process()` (spec §4.6, §7):
/// transient failures are retried up to `max_attempts`; fatal failures
/// mark the row `failed` immediately.
#[derive(Debug, Error)]
pub enum StepError {
    #[error("transient: {0}")]
    Transient(String),

    #[error("fatal ({reason_kind}): {message}")]
    Fatal {
        reason_kind: &'static str,
        message: String,
    },
}

impl StepError {
    pub fn fatal(reason_kind: &'static str, message: impl Into<String>) -> Self {
        StepError::Fatal {
            reason_kind,
            message: message.into(),
        }
    }

    pub fn transient(message: impl Into<String>) -> Self {
        StepError::Transient(message.into())
    }

    pub fn reason_kind(&self) -> &'static str {
        match self {
            StepError::Transient(_) => "transient",
            StepError::Fatal { reason_kind, .. } => reason_kind,
        }
    }
}

impl From<crate::storage::StorageError> for StepError {
    fn from(e: crate::storage::StorageError) -> Self {
        StepError::transient(e.to_string())
    }
}

impl From<crate::metadata::MetadataError> for StepError {
    fn from(e: crate::metadata::MetadataError) -> Self {
        StepError::transient(e.to_string())
    }
}

impl From<crate::models::ModelError> for StepError {
    fn from(e: crate::models::ModelError) -> Self {
        match e {
            crate::models::ModelError::DecodeError(msg) => StepError::fatal("decode", msg),
            crate::models::ModelError::ModelFatal(msg) => StepError::fatal("model", msg),
        }
    }
}

pub type Result<T> = std::result::Result<T, StepError>;
