use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use serde::Serialize;
use tokio::time::interval;
use tracing::{info, warn};
use uuid::Uuid;

use super::error::Result;
use super::model::{JobHandle, QueueName};
use super::store::{open_keyspace, Queue};

/// Holds all four stage queues under one fjall keyspace and offers a
/// uniform enqueue/dequeue surface by `QueueName`.
pub struct QueueBroker {
    queues: HashMap<QueueName, Queue>,
}

impl QueueBroker {
    pub fn open<P: AsRef<Path>>(path: P, max_attempts: u32) -> Result<Self> {
        let keyspace = open_keyspace(path)?;
        let mut queues = HashMap::new();
        for name in QueueName::ALL {
            queues.insert(name, Queue::open(&keyspace, name, max_attempts)?);
        }
        info!(queues = QueueName::ALL.len(), "queue broker opened");
        Ok(Self { queues })
    }

    fn queue(&self, name: QueueName) -> &Queue {
        self.queues
            .get(&name)
            .expect("all QueueName variants are opened in QueueBroker::open")
    }

    pub async fn enqueue<T: Serialize>(&self, name: QueueName, payload: &T) -> Result<Uuid> {
        let value = serde_json::to_value(payload)?;
        self.queue(name).enqueue(value).await
    }

    /// Idempotent enqueue: a retry that supplies the same `job_id` as a
    /// prior call is delivered at most once within the record's lifetime.
    pub async fn enqueue_with_id<T: Serialize>(&self, name: QueueName, payload: &T, job_id: Uuid) -> Result<Uuid> {
        let value = serde_json::to_value(payload)?;
        self.queue(name).enqueue_with_id(value, Some(job_id)).await
    }

    pub async fn dequeue(
        &self,
        name: QueueName,
        visibility_timeout: Duration,
    ) -> Result<Option<JobHandle>> {
        self.queue(name).dequeue(visibility_timeout).await
    }

    pub async fn ack(&self, name: QueueName, job_id: Uuid) -> Result<()> {
        self.queue(name).ack(job_id).await
    }

    pub async fn nack(&self, name: QueueName, job_id: Uuid, reason: &str) -> Result<()> {
        self.queue(name).nack(job_id, reason).await
    }

    /// Dead-letters a job immediately, without consuming a retry attempt.
    /// For errors spec.md §7 classifies as not retryable at all
    /// (input-malformed, integrity) rather than transient.
    pub async fn move_to_dlq(&self, name: QueueName, job_id: Uuid, reason: &str) -> Result<()> {
        self.queue(name).move_to_dlq(job_id, reason).await
    }

    pub fn depth(&self, name: QueueName) -> Result<usize> {
        self.queue(name).depth()
    }

    pub fn dlq_depth(&self, name: QueueName) -> Result<usize> {
        self.queue(name).dlq_depth()
    }

    /// Periodically requeues jobs whose visibility timeout expired without
    /// an ack or nack, e.g. because the worker holding them crashed.
    pub async fn run_sweeper(&self, period: Duration) {
        let mut ticker = interval(period);
        loop {
            ticker.tick().await;
            for name in QueueName::ALL {
                match self.queue(name).sweep_expired().await {
                    Ok(n) if n > 0 => info!(queue = %name, requeued = n, "swept expired jobs"),
                    Ok(_) => {}
                    Err(err) => warn!(queue = %name, %err, "sweep failed"),
                }
            }
        }
    }
}
