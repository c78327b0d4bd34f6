//! API models for the scrape-intake HTTP contract.
//!
//! `POST /payloads` is the pipeline's only write surface exposed to
//! scrapers: submit raw bytes plus where they came from, get back a job id
//! and whether the content store had already seen this exact payload.

use std::collections::HashMap;

use serde::Serialize;

#[derive(Debug, Serialize, Clone)]
pub struct IngestAcceptedResponse {
    pub job_id: String,
    pub content_hash: String,
    pub deduplicated: bool,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub components: HashMap<String, String>,
    pub version: String,
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub content_store: ContentStoreStatsResponse,
    pub queues: HashMap<String, QueueStatsResponse>,
}

#[derive(Debug, Serialize)]
pub struct ContentStoreStatsResponse {
    pub total: usize,
    pub new: usize,
    pub pending: usize,
    pub completed: usize,
    pub failed: usize,
    pub byte_size: u64,
}

#[derive(Debug, Serialize)]
pub struct QueueStatsResponse {
    pub depth: usize,
    pub dlq_depth: usize,
}
