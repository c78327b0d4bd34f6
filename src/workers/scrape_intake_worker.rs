use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::queue::QueueName;
use crate::runtime::PipelineRuntime;

use super::model::ScrapeIntakePayload;

/// Drains `scrape_intake`, marks the content-store job `pending`, and hands
/// it to `llm`. This is the seam between "a scraper submitted bytes" and
/// "an LLM call is in flight for this hash".
pub async fn run_scrape_intake_worker(runtime: Arc<PipelineRuntime>, visibility_timeout: Duration) {
    loop {
        let handle = match runtime.broker.dequeue(QueueName::ScrapeIntake, visibility_timeout).await {
            Ok(Some(handle)) => handle,
            Ok(None) => {
                tokio::time::sleep(Duration::from_millis(200)).await;
                continue;
            }
            Err(err) => {
                warn!(%err, "scrape_intake dequeue failed");
                tokio::time::sleep(Duration::from_secs(1)).await;
                continue;
            }
        };

        let payload: ScrapeIntakePayload = match serde_json::from_value(handle.payload.clone()) {
            Ok(p) => p,
            Err(err) => {
                warn!(%err, job_id = %handle.job_id, "malformed scrape_intake payload, dead-lettering");
                let _ = runtime.broker.nack(QueueName::ScrapeIntake, handle.job_id, &err.to_string()).await;
                continue;
            }
        };

        if let Err(err) = runtime
            .broker
            .enqueue_with_id(QueueName::Llm, &payload, payload.content_job_id)
            .await
        {
            warn!(%err, "failed to enqueue llm job");
            let _ = runtime.broker.nack(QueueName::ScrapeIntake, handle.job_id, &err.to_string()).await;
            continue;
        }

        if let Err(err) = runtime.content_store.mark_pending(payload.content_job_id) {
            warn!(%err, content_job_id = %payload.content_job_id, "failed to mark payload pending");
            let _ = runtime.broker.nack(QueueName::ScrapeIntake, handle.job_id, &err.to_string()).await;
            continue;
        }

        debug!(content_job_id = %payload.content_job_id, "forwarded to llm queue");
        let _ = runtime.broker.ack(QueueName::ScrapeIntake, handle.job_id).await;
    }
}
