use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::content_store::ContentHash;
use crate::llm::{LlmError, LlmJob};
use crate::queue::QueueName;
use crate::runtime::PipelineRuntime;

use super::model::{LlmJobPayload, ValidatorJobPayload};

/// Drains `llm`: fetches the raw bytes for the job's hash, calls the
/// configured `LlmProvider`, and forwards a schema-valid result to
/// `validator`. Per content_hash there is at most one concurrent LLM call
/// in flight, enforced upstream by the content store's `pending` state.
pub async fn run_llm_worker(runtime: Arc<PipelineRuntime>, visibility_timeout: Duration) {
    loop {
        let handle = match runtime.broker.dequeue(QueueName::Llm, visibility_timeout).await {
            Ok(Some(handle)) => handle,
            Ok(None) => {
                tokio::time::sleep(Duration::from_millis(200)).await;
                continue;
            }
            Err(err) => {
                warn!(%err, "llm dequeue failed");
                tokio::time::sleep(Duration::from_secs(1)).await;
                continue;
            }
        };

        let payload: LlmJobPayload = match serde_json::from_value(handle.payload.clone()) {
            Ok(p) => p,
            Err(err) => {
                let _ = runtime.broker.nack(QueueName::Llm, handle.job_id, &err.to_string()).await;
                continue;
            }
        };

        let Some(hash) = ContentHash::from_hex(&payload.hash_hex) else {
            let _ = runtime
                .broker
                .nack(QueueName::Llm, handle.job_id, "invalid content hash hex")
                .await;
            continue;
        };

        let raw_bytes = match runtime.content_store.get_blob(&hash) {
            Ok(Some(bytes)) => bytes,
            Ok(None) => {
                let _ = runtime
                    .broker
                    .nack(QueueName::Llm, handle.job_id, "content store has no blob for hash")
                    .await;
                continue;
            }
            Err(err) => {
                let _ = runtime.broker.nack(QueueName::Llm, handle.job_id, &err.to_string()).await;
                continue;
            }
        };

        let scraper_id = match runtime.content_store.get_record(&hash) {
            Ok(Some(record)) => record.source.scraper_id,
            Ok(None) => {
                let _ = runtime
                    .broker
                    .nack(QueueName::Llm, handle.job_id, "content store has no record for hash")
                    .await;
                continue;
            }
            Err(err) => {
                let _ = runtime.broker.nack(QueueName::Llm, handle.job_id, &err.to_string()).await;
                continue;
            }
        };

        let job = LlmJob {
            job_id: payload.content_job_id,
            raw_bytes,
            source_hint: Some(scraper_id),
        };

        let provider_name = runtime.llm_provider.name();
        loop {
            match runtime.quota_gate.check(provider_name) {
                Ok(Some(remaining_ms)) => {
                    let wait = Duration::from_millis(remaining_ms.max(0) as u64).min(Duration::from_secs(30));
                    debug!(provider = provider_name, wait_ms = wait.as_millis() as u64, "provider in quota back-off, sleeping");
                    tokio::time::sleep(wait).await;
                }
                Ok(None) => break,
                Err(err) => {
                    warn!(%err, "quota gate check failed, proceeding without back-off");
                    break;
                }
            }
        }

        match runtime.llm_provider.align(&job).await {
            Ok(aligned) => {
                let validator_payload = ValidatorJobPayload {
                    content_job_id: payload.content_job_id,
                    hash_hex: payload.hash_hex.clone(),
                    aligned,
                    scraper_id: job.source_hint.clone().unwrap_or_else(|| "unknown".to_string()),
                    source_org_id: None,
                };
                if let Err(err) = runtime.broker.enqueue(QueueName::Validator, &validator_payload).await {
                    warn!(%err, "failed to enqueue validator job");
                    let _ = runtime.broker.nack(QueueName::Llm, handle.job_id, &err.to_string()).await;
                    continue;
                }
                // Content store's RawPayload barrier concerns itself only with
                // "has this hash produced LLM output"; downstream
                // validator/reconciler outcomes are business-level
                // and tracked by their own records, not by re-opening this hash.
                let _ = runtime.content_store.mark_completed(payload.content_job_id, "validator");
                let _ = runtime.quota_gate.reset(provider_name);
                debug!(content_job_id = %payload.content_job_id, "llm alignment complete");
                let _ = runtime.broker.ack(QueueName::Llm, handle.job_id).await;
            }
            Err(LlmError::QuotaExceeded) => {
                let retry_after_unix_ms = runtime
                    .quota_gate
                    .record_quota_exceeded(
                        provider_name,
                        runtime.config.llm.quota_base_delay_s,
                        runtime.config.llm.quota_backoff,
                        runtime.config.llm.quota_max_delay_s,
                    )
                    .unwrap_or(0);
                warn!(provider = provider_name, retry_after_unix_ms, "quota exceeded");
                let _ = runtime
                    .broker
                    .nack(QueueName::Llm, handle.job_id, "provider quota exceeded")
                    .await;
            }
            Err(err @ LlmError::SchemaViolation(_)) => {
                warn!(%err, "schema violation, retrying up to max attempts");
                let _ = runtime.broker.nack(QueueName::Llm, handle.job_id, &err.to_string()).await;
            }
            Err(err) => {
                warn!(%err, "llm call failed, will retry");
                let _ = runtime.broker.nack(QueueName::Llm, handle.job_id, &err.to_string()).await;
            }
        }
    }
}
