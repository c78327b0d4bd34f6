use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::llm::AlignedRecord;

/// Payload carried through `scrape_intake` and `llm`: just enough to look
/// the raw bytes back up in the content store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeIntakePayload {
    pub content_job_id: Uuid,
    pub hash_hex: String,
}

pub type LlmJobPayload = ScrapeIntakePayload;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidatorJobPayload {
    pub content_job_id: Uuid,
    pub hash_hex: String,
    pub aligned: AlignedRecord,
    pub scraper_id: String,
    pub source_org_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcilerJobPayload {
    pub content_job_id: Uuid,
    pub record: AlignedRecord,
    pub scraper_id: String,
    pub source_org_id: Option<String>,
}
