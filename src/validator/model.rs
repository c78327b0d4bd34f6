use serde::{Deserialize, Serialize};

use crate::llm::AlignedRecord;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RejectionEvent {
    pub score: i32,
    pub reasons: Vec<String>,
    pub is_test_data: bool,
}

/// Outcome of `Validator::validate`: either an accepted record destined
/// for `reconciler`, or a persisted rejection that is never forwarded.
#[derive(Debug, Clone)]
pub enum ValidatedRecord {
    Accepted { record: AlignedRecord, score: i32 },
    Rejected(RejectionEvent),
}
