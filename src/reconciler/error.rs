use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReconcilerError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("malformed upstream payload: {0}")]
    MalformedPayload(String),

    #[error("integrity violation: {0}")]
    Integrity(String),
}

pub type Result<T> = std::result::Result<T, ReconcilerError>;
