use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("fjall error: {0}")]
    Fjall(#[from] fjall::Error),

    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("job {0} is not in flight, cannot ack/nack")]
    NotInFlight(Uuid),

    #[error("job {0} has no record")]
    MissingRecord(Uuid),
}

pub type Result<T> = std::result::Result<T, QueueError>;
