use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::queue::QueueName;
use crate::runtime::PipelineRuntime;
use crate::validator::{Validator, ValidatedRecord};

use super::model::{ReconcilerJobPayload, ValidatorJobPayload};

/// Drains `validator`: scores and (if needed) geocode-enriches the aligned
/// record, then either forwards it to `reconciler` or persists a
/// rejection event.
pub async fn run_validator_worker(runtime: Arc<PipelineRuntime>, validator: Arc<Validator>, visibility_timeout: Duration) {
    loop {
        let handle = match runtime.broker.dequeue(QueueName::Validator, visibility_timeout).await {
            Ok(Some(handle)) => handle,
            Ok(None) => {
                tokio::time::sleep(Duration::from_millis(200)).await;
                continue;
            }
            Err(err) => {
                warn!(%err, "validator dequeue failed");
                tokio::time::sleep(Duration::from_secs(1)).await;
                continue;
            }
        };

        let payload: ValidatorJobPayload = match serde_json::from_value(handle.payload.clone()) {
            Ok(p) => p,
            Err(err) => {
                let _ = runtime.broker.nack(QueueName::Validator, handle.job_id, &err.to_string()).await;
                continue;
            }
        };

        match validator.validate(payload.aligned).await {
            ValidatedRecord::Accepted { record, score } => {
                debug!(score, content_job_id = %payload.content_job_id, "record accepted");
                let reconciler_payload = ReconcilerJobPayload {
                    content_job_id: payload.content_job_id,
                    record,
                    scraper_id: payload.scraper_id,
                    source_org_id: payload.source_org_id,
                };
                if let Err(err) = runtime.broker.enqueue(QueueName::Reconciler, &reconciler_payload).await {
                    warn!(%err, "failed to enqueue reconciler job");
                    let _ = runtime.broker.nack(QueueName::Validator, handle.job_id, &err.to_string()).await;
                    continue;
                }
                let _ = runtime.broker.ack(QueueName::Validator, handle.job_id).await;
            }
            ValidatedRecord::Rejected(rejection) => {
                info!(
                    score = rejection.score,
                    is_test_data = rejection.is_test_data,
                    content_job_id = %payload.content_job_id,
                    "record rejected"
                );
                let _ = runtime.broker.ack(QueueName::Validator, handle.job_id).await;
            }
        }
    }
}
