use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The four pipeline stages, each backed by its own queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueName {
    ScrapeIntake,
    Llm,
    Validator,
    Reconciler,
}

impl QueueName {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueueName::ScrapeIntake => "scrape_intake",
            QueueName::Llm => "llm",
            QueueName::Validator => "validator",
            QueueName::Reconciler => "reconciler",
        }
    }

    pub const ALL: [QueueName; 4] = [
        QueueName::ScrapeIntake,
        QueueName::Llm,
        QueueName::Validator,
        QueueName::Reconciler,
    ];
}

impl std::fmt::Display for QueueName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Durable record for a single enqueued job, independent of its current
/// partition (pending / inflight / dlq).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    pub job_id: Uuid,
    pub payload: serde_json::Value,
    pub attempt: u32,
    pub enqueued_at: DateTime<Utc>,
    pub last_error: Option<String>,
}

/// A job handed to a worker by `dequeue`, carrying enough to both process
/// and later `ack`/`nack` it.
#[derive(Debug, Clone)]
pub struct JobHandle {
    pub job_id: Uuid,
    pub payload: serde_json::Value,
    pub attempt: u32,
}
