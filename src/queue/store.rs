use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use fjall::{Config, Keyspace, PartitionCreateOptions, PartitionHandle};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::error::{QueueError, Result};
use super::model::{JobHandle, JobRecord, QueueName};

/// Single named queue: pending (seq-ordered), inflight (visibility
/// deadline), dlq, and a records partition keyed by job id, supporting
/// redelivery and dead-lettering on top of a sequence-counter-plus-
/// partitions layout.
pub struct Queue {
    name: QueueName,
    records: PartitionHandle,
    pending: PartitionHandle,
    inflight: PartitionHandle,
    dlq: PartitionHandle,
    metadata: PartitionHandle,
    seq_counter: Arc<AtomicU64>,
    /// Serializes the pop-then-reinsert critical section of `dequeue` and
    /// the sweep, since fjall partitions don't share cross-partition
    /// transactions.
    lock: Arc<Mutex<()>>,
    max_attempts: u32,
}

impl Queue {
    pub fn open(keyspace: &Keyspace, name: QueueName, max_attempts: u32) -> Result<Self> {
        let prefix = name.as_str();
        let records = keyspace.open_partition(
            &format!("{prefix}_records"),
            PartitionCreateOptions::default(),
        )?;
        let pending = keyspace.open_partition(
            &format!("{prefix}_pending"),
            PartitionCreateOptions::default(),
        )?;
        let inflight = keyspace.open_partition(
            &format!("{prefix}_inflight"),
            PartitionCreateOptions::default(),
        )?;
        let dlq = keyspace
            .open_partition(&format!("{prefix}_dlq"), PartitionCreateOptions::default())?;
        let metadata = keyspace.open_partition(
            &format!("{prefix}_metadata"),
            PartitionCreateOptions::default(),
        )?;

        let current_seq = metadata
            .get(b"next_seq")?
            .map(|bytes| u64::from_be_bytes(bytes.as_ref().try_into().unwrap_or([0u8; 8])))
            .unwrap_or(0);

        info!(queue = prefix, current_seq, "queue partition opened");

        Ok(Self {
            name,
            records,
            pending,
            inflight,
            dlq,
            metadata,
            seq_counter: Arc::new(AtomicU64::new(current_seq)),
            lock: Arc::new(Mutex::new(())),
            max_attempts,
        })
    }

    pub fn name(&self) -> QueueName {
        self.name
    }

    pub async fn enqueue(&self, payload: serde_json::Value) -> Result<Uuid> {
        self.enqueue_with_id(payload, None).await
    }

    /// Enqueues `payload`, optionally under a caller-supplied `job_id`. A
    /// job id that already has a live record (pending, inflight, or
    /// previously acked-but-not-yet-reaped) is not re-enqueued: the
    /// existing id is returned instead, making enqueue idempotent within
    /// the record's lifetime.
    pub async fn enqueue_with_id(&self, payload: serde_json::Value, job_id: Option<Uuid>) -> Result<Uuid> {
        let _guard = self.lock.lock().await;

        if let Some(job_id) = job_id {
            if self.records.get(job_id.as_bytes())?.is_some() {
                debug!(queue = %self.name, %job_id, "idempotent enqueue, record already exists");
                return Ok(job_id);
            }
        }

        let job_id = job_id.unwrap_or_else(Uuid::now_v7);
        let record = JobRecord {
            job_id,
            payload,
            attempt: 0,
            enqueued_at: Utc::now(),
            last_error: None,
        };
        self.put_record(&record)?;
        self.push_pending(job_id)?;
        debug!(queue = %self.name, %job_id, "job enqueued");
        Ok(job_id)
    }

    /// Pop the oldest pending job and move it to inflight with a visibility
    /// deadline. Redelivered if not acked/nacked before the deadline.
    pub async fn dequeue(&self, visibility_timeout: Duration) -> Result<Option<JobHandle>> {
        let _guard = self.lock.lock().await;

        let next = self.pending.iter().next();
        let Some(item) = next else {
            return Ok(None);
        };
        let (seq_key, job_id_bytes) = item?;
        self.pending.remove(&seq_key)?;

        let job_id = Uuid::from_slice(&job_id_bytes).expect("stored job id is always 16 bytes");
        let mut record = self
            .get_record(job_id)?
            .ok_or(QueueError::MissingRecord(job_id))?;
        record.attempt += 1;
        self.put_record(&record)?;

        let deadline = Utc::now() + chrono::Duration::from_std(visibility_timeout).unwrap();
        self.inflight
            .insert(job_id.as_bytes(), deadline.timestamp_millis().to_be_bytes())?;

        debug!(queue = %self.name, %job_id, attempt = record.attempt, "job dequeued");
        Ok(Some(JobHandle {
            job_id,
            payload: record.payload,
            attempt: record.attempt,
        }))
    }

    pub async fn ack(&self, job_id: Uuid) -> Result<()> {
        let _guard = self.lock.lock().await;
        self.inflight.remove(job_id.as_bytes())?;
        self.records.remove(job_id.as_bytes())?;
        debug!(queue = %self.name, %job_id, "job acked");
        Ok(())
    }

    /// Negative-ack: requeue for retry if attempts remain, otherwise
    /// dead-letter with `reason`.
    pub async fn nack(&self, job_id: Uuid, reason: &str) -> Result<()> {
        let _guard = self.lock.lock().await;
        self.inflight.remove(job_id.as_bytes())?;

        let mut record = self
            .get_record(job_id)?
            .ok_or(QueueError::MissingRecord(job_id))?;
        record.last_error = Some(reason.to_string());

        if record.attempt >= self.max_attempts {
            self.put_record(&record)?;
            self.dlq.insert(job_id.as_bytes(), serde_json::to_vec(&record)?)?;
            self.records.remove(job_id.as_bytes())?;
            warn!(queue = %self.name, %job_id, attempts = record.attempt, "job moved to dlq");
        } else {
            self.put_record(&record)?;
            self.push_pending(job_id)?;
            debug!(queue = %self.name, %job_id, attempt = record.attempt, "job requeued");
        }
        Ok(())
    }

    /// Dead-letters a job directly, bypassing the attempt-count retry
    /// path `nack` uses. For errors that are never retryable (malformed
    /// payloads, integrity violations) rather than merely transient.
    pub async fn move_to_dlq(&self, job_id: Uuid, reason: &str) -> Result<()> {
        let _guard = self.lock.lock().await;
        self.inflight.remove(job_id.as_bytes())?;

        let mut record = self
            .get_record(job_id)?
            .ok_or(QueueError::MissingRecord(job_id))?;
        record.last_error = Some(reason.to_string());

        self.put_record(&record)?;
        self.dlq.insert(job_id.as_bytes(), serde_json::to_vec(&record)?)?;
        self.records.remove(job_id.as_bytes())?;
        warn!(queue = %self.name, %job_id, reason, "job moved directly to dlq");
        Ok(())
    }

    /// Returns inflight jobs past their visibility deadline to `pending`.
    /// Run periodically by a sweeper task so crashed workers don't strand
    /// jobs forever.
    pub async fn sweep_expired(&self) -> Result<usize> {
        let _guard = self.lock.lock().await;
        let now = Utc::now().timestamp_millis();
        let mut expired = Vec::new();

        for item in self.inflight.iter() {
            let (key, value) = item?;
            let deadline = i64::from_be_bytes(value.as_ref().try_into().unwrap_or([0u8; 8]));
            if deadline <= now {
                let job_id = Uuid::from_slice(&key).expect("stored job id is always 16 bytes");
                expired.push(job_id);
            }
        }

        for job_id in &expired {
            self.inflight.remove(job_id.as_bytes())?;
            self.push_pending(*job_id)?;
            warn!(queue = %self.name, %job_id, "visibility timeout expired, requeued");
        }

        Ok(expired.len())
    }

    pub fn depth(&self) -> Result<usize> {
        Ok(self.pending.iter().count())
    }

    pub fn inflight_count(&self) -> Result<usize> {
        Ok(self.inflight.iter().count())
    }

    pub fn dlq_depth(&self) -> Result<usize> {
        Ok(self.dlq.iter().count())
    }

    pub fn list_dlq(&self, limit: usize) -> Result<Vec<JobRecord>> {
        let mut out = Vec::new();
        for item in self.dlq.iter().take(limit) {
            let (_, value) = item?;
            out.push(serde_json::from_slice(&value)?);
        }
        Ok(out)
    }

    fn get_record(&self, job_id: Uuid) -> Result<Option<JobRecord>> {
        match self.records.get(job_id.as_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn put_record(&self, record: &JobRecord) -> Result<()> {
        self.records
            .insert(record.job_id.as_bytes(), serde_json::to_vec(record)?)?;
        Ok(())
    }

    fn push_pending(&self, job_id: Uuid) -> Result<()> {
        let seq = self.seq_counter.fetch_add(1, Ordering::SeqCst);
        self.pending.insert(seq.to_be_bytes(), job_id.as_bytes())?;
        self.metadata
            .insert(b"next_seq", (seq + 1).to_be_bytes())?;
        Ok(())
    }
}

/// Opens all four stage queues under one fjall keyspace.
pub fn open_keyspace<P: AsRef<Path>>(path: P) -> Result<Keyspace> {
    Ok(Config::new(path).open()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn open_test_queue(dir: &TempDir) -> Queue {
        let keyspace = open_keyspace(dir.path()).unwrap();
        Queue::open(&keyspace, QueueName::Llm, 3).unwrap()
    }

    #[tokio::test]
    async fn enqueue_dequeue_ack_round_trip() {
        let dir = TempDir::new().unwrap();
        let queue = open_test_queue(&dir);

        let job_id = queue.enqueue(json!({"hash": "abc"})).await.unwrap();
        let handle = queue.dequeue(Duration::from_secs(30)).await.unwrap().unwrap();
        assert_eq!(handle.job_id, job_id);
        assert_eq!(handle.attempt, 1);

        queue.ack(job_id).await.unwrap();
        assert_eq!(queue.depth().unwrap(), 0);
        assert_eq!(queue.inflight_count().unwrap(), 0);
    }

    #[tokio::test]
    async fn nack_requeues_until_max_attempts_then_dlq() {
        let dir = TempDir::new().unwrap();
        let queue = open_test_queue(&dir);

        let job_id = queue.enqueue(json!({"hash": "abc"})).await.unwrap();

        for _ in 0..3 {
            let handle = queue.dequeue(Duration::from_secs(30)).await.unwrap().unwrap();
            assert_eq!(handle.job_id, job_id);
            queue.nack(job_id, "transient failure").await.unwrap();
        }

        assert_eq!(queue.dlq_depth().unwrap(), 1);
        assert_eq!(queue.depth().unwrap(), 0);

        let dead = queue.list_dlq(10).unwrap();
        assert_eq!(dead.len(), 1);
        assert_eq!(dead[0].last_error.as_deref(), Some("transient failure"));
    }

    #[tokio::test]
    async fn sweep_requeues_expired_inflight_jobs() {
        let dir = TempDir::new().unwrap();
        let queue = open_test_queue(&dir);

        let job_id = queue.enqueue(json!({"hash": "abc"})).await.unwrap();
        queue.dequeue(Duration::from_millis(1)).await.unwrap().unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        let swept = queue.sweep_expired().await.unwrap();
        assert_eq!(swept, 1);
        assert_eq!(queue.depth().unwrap(), 1);

        let handle = queue.dequeue(Duration::from_secs(30)).await.unwrap().unwrap();
        assert_eq!(handle.job_id, job_id);
        assert_eq!(handle.attempt, 2);
    }

    #[tokio::test]
    async fn empty_queue_returns_none() {
        let dir = TempDir::new().unwrap();
        let queue = open_test_queue(&dir);
        assert!(queue.dequeue(Duration::from_secs(1)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn enqueue_with_id_is_idempotent_within_the_record_lifetime() {
        let dir = TempDir::new().unwrap();
        let queue = open_test_queue(&dir);
        let job_id = Uuid::now_v7();

        let first = queue
            .enqueue_with_id(json!({"hash": "abc"}), Some(job_id))
            .await
            .unwrap();
        let second = queue
            .enqueue_with_id(json!({"hash": "abc"}), Some(job_id))
            .await
            .unwrap();

        assert_eq!(first, job_id);
        assert_eq!(second, job_id);
        assert_eq!(queue.depth().unwrap(), 1);
    }
}
