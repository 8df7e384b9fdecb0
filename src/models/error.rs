use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("image decode failed: {0}")]
    DecodeError(String),

    #[error("model returned structurally-invalid output: {0}")]
    ModelFatal(String),
}

pub type Result<T> = std::result::Result<T, ModelError>;
