use axum::{Json, body::to_bytes, extract::State, http::HeaderMap, response::IntoResponse};

use super::{
    models::{
        ContentStoreStatsResponse, HealthResponse, IngestAcceptedResponse, QueueStatsResponse,
        StatsResponse,
    },
    state::AppState,
};
use crate::api::error::ApiError;
use crate::content_store::SourceMetadata;
use crate::queue::QueueName;

const MAX_PAYLOAD_SIZE: usize = 10 * 1024 * 1024;

/// Scrape-intake endpoint: `POST /payloads`. Submits raw scraped bytes to
/// the content store and, for genuinely new payloads, enqueues a
/// `scrape_intake` job. Already-seen payloads are reported back with
/// `deduplicated: true` and no new job is enqueued.
pub async fn ingest_payload(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: axum::body::Body,
) -> Result<impl IntoResponse, ApiError> {
    // Payload bytes are whatever the scraper captured (HTML, PDF, a JSON
    // API response, ...); the content store is content-type agnostic, so
    // unlike a JSON job-submission endpoint there's nothing to validate
    // here beyond size.
    let scraper_id = header_value(&headers, "X-Scraper-Id")
        .ok_or_else(|| ApiError::InvalidPayload("X-Scraper-Id header is required".to_string()))?;
    let source_url = header_value(&headers, "X-Source-Url")
        .ok_or_else(|| ApiError::InvalidPayload("X-Source-Url header is required".to_string()))?;

    let body_bytes = read_body(body).await?;

    let source = SourceMetadata {
        scraper_id,
        source_url,
        scraped_at: chrono::Utc::now(),
    };

    let outcome = state.runtime.content_store.submit(&body_bytes, source).await?;
    let hash = crate::content_store::ContentHash::of(&body_bytes);

    if outcome.was_new {
        let payload = crate::workers::ScrapeIntakePayload {
            content_job_id: outcome.job_id,
            hash_hex: hash.to_hex(),
        };
        state
            .runtime
            .broker
            .enqueue(QueueName::ScrapeIntake, &payload)
            .await?;
        state.runtime.metrics.job_accepted();
    }

    let response = IngestAcceptedResponse {
        job_id: outcome.job_id.to_string(),
        content_hash: hash.to_hex(),
        deduplicated: !outcome.was_new,
    };

    Ok((axum::http::StatusCode::ACCEPTED, Json(response)))
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned)
        .filter(|v| !v.is_empty())
}

/// Collects the body up to `MAX_PAYLOAD_SIZE`, rejecting an oversized
/// request as soon as the limit is crossed rather than after buffering the
/// whole thing — `to_bytes` enforces the cap while it streams.
async fn read_body(body: axum::body::Body) -> Result<Vec<u8>, ApiError> {
    let data = to_bytes(body, MAX_PAYLOAD_SIZE)
        .await
        .map_err(|err| ApiError::InvalidPayload(format!("body too large or unreadable: {err}")))?;

    Ok(data.to_vec())
}

/// Stats endpoint: `GET /stats`. Content-store totals plus per-queue
/// depth/DLQ counts, useful for dashboards and operational alerting.
pub async fn stats(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let cs = state.runtime.content_store.stats()?;

    let mut queues = std::collections::HashMap::new();
    for name in QueueName::ALL {
        queues.insert(
            name.as_str().to_string(),
            QueueStatsResponse {
                depth: state.runtime.broker.depth(name)?,
                dlq_depth: state.runtime.broker.dlq_depth(name)?,
            },
        );
    }

    let response = StatsResponse {
        content_store: ContentStoreStatsResponse {
            total: cs.total,
            new: cs.new,
            pending: cs.pending,
            completed: cs.completed,
            failed: cs.failed,
            byte_size: cs.byte_size,
        },
        queues,
    };

    Ok((axum::http::StatusCode::OK, Json(response)))
}

/// Health check endpoint (GET /health). Currently a liveness check: if the
/// process can respond, the content store and queue broker it holds are
/// open.
pub async fn health(State(_state): State<AppState>) -> impl IntoResponse {
    let mut components = std::collections::HashMap::new();
    components.insert("api".to_string(), "healthy".to_string());
    components.insert("content_store".to_string(), "healthy".to_string());
    components.insert("queue".to_string(), "healthy".to_string());

    let response = HealthResponse {
        status: "healthy".to_string(),
        components,
        version: env!("CARGO_PKG_VERSION").to_string(),
    };

    (axum::http::StatusCode::OK, Json(response))
}
