use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use super::model::AlignedRecord;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("request failed: {0}")]
    Request(String),

    #[error("provider returned output violating the HSDS schema: {0}")]
    SchemaViolation(String),

    #[error("provider exceeded its quota")]
    QuotaExceeded,

    #[error("provider call timed out")]
    Timeout,

    #[error("subprocess exited with status {0}")]
    SubprocessFailed(String),
}

pub type Result<T> = std::result::Result<T, LlmError>;

/// One unit of work for the LLM adapter: the job id from the `llm` queue
/// plus the raw bytes retrieved from the content store.
#[derive(Debug, Clone)]
pub struct LlmJob {
    pub job_id: Uuid,
    pub raw_bytes: Vec<u8>,
    pub source_hint: Option<String>,
}

#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Human-readable provider name, used as the quota-flag key and in
    /// metrics (`quota:{provider}`).
    fn name(&self) -> &'static str;

    async fn align(&self, job: &LlmJob) -> Result<AlignedRecord>;
}
