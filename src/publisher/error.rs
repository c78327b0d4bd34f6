use thiserror::Error;

#[derive(Debug, Error)]
pub enum PublisherError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("fjall error: {0}")]
    Fjall(#[from] fjall::Error),

    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("git error: {0}")]
    Git(#[from] git2::Error),

    #[error(
        "ratchet guard rejected publish: previous high-water {previous_high_water}, current {current}"
    )]
    RatchetViolation { previous_high_water: i64, current: i64 },

    #[error("publisher lock held by another process: {0}")]
    LockHeld(String),
}

pub type Result<T> = std::result::Result<T, PublisherError>;
