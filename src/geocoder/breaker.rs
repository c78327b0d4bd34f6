use chrono::Utc;
use fjall::PartitionHandle;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
struct BreakerRecord {
    failure_count: u32,
    opened_at_unix_ms: Option<i64>,
    trips: u64,
}

/// Per-provider circuit breaker, persisted in a shared fjall `metadata`
/// partition the same way `llm::quota::QuotaGate` persists its back-off
/// flag — every worker process consults and mutates the same record, so
/// a circuit one process trips stays open for its siblings rather than
/// resetting per process.
pub struct CircuitBreaker {
    metadata: PartitionHandle,
    provider: String,
    failure_threshold: u32,
    cooldown: chrono::Duration,
}

impl CircuitBreaker {
    pub fn new(metadata: PartitionHandle, provider: &str, failure_threshold: u32, cooldown: std::time::Duration) -> Self {
        Self {
            metadata,
            provider: provider.to_string(),
            failure_threshold,
            cooldown: chrono::Duration::from_std(cooldown).unwrap_or(chrono::Duration::seconds(60)),
        }
    }

    fn key(&self) -> Vec<u8> {
        format!("breaker:{}", self.provider).into_bytes()
    }

    fn load(&self) -> BreakerRecord {
        self.metadata
            .get(self.key())
            .ok()
            .flatten()
            .and_then(|bytes| serde_json::from_slice(&bytes).ok())
            .unwrap_or_default()
    }

    fn save(&self, record: &BreakerRecord) {
        if let Ok(bytes) = serde_json::to_vec(record) {
            let _ = self.metadata.insert(self.key(), bytes);
        }
    }

    pub fn state(&self) -> CircuitState {
        let record = self.load();
        match record.opened_at_unix_ms {
            None => CircuitState::Closed,
            Some(opened_at) => {
                let elapsed = chrono::Duration::milliseconds(Utc::now().timestamp_millis() - opened_at);
                if elapsed >= self.cooldown {
                    CircuitState::HalfOpen
                } else {
                    CircuitState::Open
                }
            }
        }
    }

    /// Whether a call should be attempted right now.
    pub fn allow(&self) -> bool {
        !matches!(self.state(), CircuitState::Open)
    }

    pub fn record_success(&self) {
        let mut record = self.load();
        record.failure_count = 0;
        record.opened_at_unix_ms = None;
        self.save(&record);
    }

    pub fn record_failure(&self) {
        let mut record = self.load();
        let now = Utc::now().timestamp_millis();

        // Already tripped: if we're still inside the cooldown window this is
        // a no-op (the circuit is already rejecting calls), but if we're past
        // it the caller just made a half-open probe that failed, so the
        // circuit must re-open on a fresh clock rather than stay latched to
        // the original trip time forever.
        if let Some(opened_at) = record.opened_at_unix_ms {
            let elapsed = chrono::Duration::milliseconds(now - opened_at);
            if elapsed >= self.cooldown {
                record.opened_at_unix_ms = Some(now);
                record.trips += 1;
            }
            self.save(&record);
            return;
        }

        record.failure_count += 1;
        if record.failure_count >= self.failure_threshold {
            record.opened_at_unix_ms = Some(now);
            record.trips += 1;
        }
        self.save(&record);
    }

    pub fn trip_count(&self) -> u64 {
        self.load().trips
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fjall::{Config, PartitionCreateOptions};
    use tempfile::TempDir;
    use std::time::Duration;

    fn partition() -> (TempDir, PartitionHandle) {
        let dir = TempDir::new().unwrap();
        let keyspace = Config::new(dir.path()).open().unwrap();
        let partition = keyspace.open_partition("breaker", PartitionCreateOptions::default()).unwrap();
        (dir, partition)
    }

    #[test]
    fn opens_after_threshold_failures() {
        let (_dir, partition) = partition();
        let breaker = CircuitBreaker::new(partition, "arcgis", 3, Duration::from_secs(60));
        assert!(breaker.allow());
        breaker.record_failure();
        breaker.record_failure();
        assert!(breaker.allow());
        breaker.record_failure();
        assert!(!breaker.allow());
        assert_eq!(breaker.trip_count(), 1);
    }

    #[test]
    fn success_resets_failure_count() {
        let (_dir, partition) = partition();
        let breaker = CircuitBreaker::new(partition, "arcgis", 3, Duration::from_secs(60));
        breaker.record_failure();
        breaker.record_failure();
        breaker.record_success();
        breaker.record_failure();
        assert!(breaker.allow());
    }

    #[test]
    fn half_open_after_cooldown() {
        let (_dir, partition) = partition();
        let breaker = CircuitBreaker::new(partition, "arcgis", 1, Duration::from_millis(10));
        breaker.record_failure();
        assert!(!breaker.allow());
        std::thread::sleep(Duration::from_millis(15));
        assert_eq!(breaker.state(), CircuitState::HalfOpen);
        assert!(breaker.allow());
    }

    #[test]
    fn half_open_probe_failure_reopens_with_fresh_cooldown() {
        let (_dir, partition) = partition();
        let breaker = CircuitBreaker::new(partition, "arcgis", 1, Duration::from_millis(20));
        breaker.record_failure();
        std::thread::sleep(Duration::from_millis(25));
        assert_eq!(breaker.state(), CircuitState::HalfOpen);

        breaker.record_failure();
        assert_eq!(breaker.state(), CircuitState::Open);
        assert_eq!(breaker.trip_count(), 2);

        std::thread::sleep(Duration::from_millis(25));
        assert_eq!(breaker.state(), CircuitState::HalfOpen);
    }

    #[test]
    fn state_is_shared_across_breaker_instances_on_same_partition() {
        let (_dir, partition) = partition();
        let a = CircuitBreaker::new(partition.clone(), "arcgis", 1, Duration::from_secs(60));
        let b = CircuitBreaker::new(partition, "arcgis", 1, Duration::from_secs(60));

        a.record_failure();
        assert!(!b.allow());
    }
}
