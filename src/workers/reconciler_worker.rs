use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::queue::QueueName;
use crate::reconciler::{Reconciler, ReconcilerError};
use crate::runtime::PipelineRuntime;

use super::model::ReconcilerJobPayload;

/// Drains `reconciler`: integrates the accepted record into the canonical
/// store. Malformed payloads and post-retry integrity violations dead-letter;
/// transient database errors are retried by
/// `Reconciler::reconcile` itself before this loop ever sees them.
pub async fn run_reconciler_worker(runtime: Arc<PipelineRuntime>, reconciler: Arc<Reconciler>, visibility_timeout: Duration) {
    loop {
        let handle = match runtime.broker.dequeue(QueueName::Reconciler, visibility_timeout).await {
            Ok(Some(handle)) => handle,
            Ok(None) => {
                tokio::time::sleep(Duration::from_millis(200)).await;
                continue;
            }
            Err(err) => {
                warn!(%err, "reconciler dequeue failed");
                tokio::time::sleep(Duration::from_secs(1)).await;
                continue;
            }
        };

        let payload: ReconcilerJobPayload = match serde_json::from_value(handle.payload.clone()) {
            Ok(p) => p,
            Err(err) => {
                warn!(%err, job_id = %handle.job_id, "malformed reconciler payload, dead-lettering");
                let _ = runtime.broker.move_to_dlq(QueueName::Reconciler, handle.job_id, &err.to_string()).await;
                continue;
            }
        };

        match reconciler
            .reconcile(payload.record, &payload.scraper_id, payload.source_org_id.as_deref())
            .await
        {
            Ok(ids) => {
                debug!(organization_id = %ids.organization_id, content_job_id = %payload.content_job_id, "reconciled");
                let _ = runtime.broker.ack(QueueName::Reconciler, handle.job_id).await;
            }
            Err(err @ (ReconcilerError::MalformedPayload(_) | ReconcilerError::Integrity(_))) => {
                warn!(%err, content_job_id = %payload.content_job_id, "reconciliation failed permanently, dead-lettering");
                let _ = runtime.broker.move_to_dlq(QueueName::Reconciler, handle.job_id, &err.to_string()).await;
            }
            Err(err) => {
                warn!(%err, "reconciliation failed, will retry");
                let _ = runtime.broker.nack(QueueName::Reconciler, handle.job_id, &err.to_string()).await;
            }
        }
    }
}
