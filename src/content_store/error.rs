use thiserror::Error;

#[derive(Debug, Error)]
pub enum ContentStoreError {
    #[error("fjall error: {0}")]
    Fjall(#[from] fjall::Error),

    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("no payload record for hash {0}")]
    NotFound(String),

    #[error("illegal state transition for {hash}: {from:?} -> {to:?}")]
    IllegalTransition {
        hash: String,
        from: super::store::PayloadStatus,
        to: super::store::PayloadStatus,
    },

    #[error("job {job_id} is not associated with any payload")]
    UnknownJob { job_id: String },
}

pub type Result<T> = std::result::Result<T, ContentStoreError>;
