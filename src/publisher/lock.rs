use chrono::{DateTime, Utc};
use fjall::PartitionHandle;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::error::{PublisherError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LockRecord {
    holder: String,
    expires_at: DateTime<Utc>,
}

/// Single-writer lease lock for the publish cycle, stored in the same
/// fjall partition as `PublisherState` — the same broker-backed-flag
/// idiom `llm::quota::QuotaGate` uses for its back-off flag, so that two
/// `pipeline publish` processes pointed at the same state directory never
/// run a cycle concurrently against the same git working tree.
pub struct PublisherLock {
    state: PartitionHandle,
    holder: String,
}

impl PublisherLock {
    const KEY: &'static [u8] = b"publisher:lock";

    pub fn new(state: PartitionHandle, holder: String) -> Self {
        Self { state, holder }
    }

    /// Acquires the lock if it is unheld or its lease has expired. Returns
    /// `PublisherError::LockHeld` if another holder's lease is still live.
    pub fn acquire(&self, lease: std::time::Duration) -> Result<()> {
        let now = Utc::now();
        if let Some(bytes) = self.state.get(Self::KEY)? {
            let existing: LockRecord = serde_json::from_slice(&bytes)?;
            if existing.holder != self.holder && existing.expires_at > now {
                return Err(PublisherError::LockHeld(existing.holder));
            }
        }

        let record = LockRecord {
            holder: self.holder.clone(),
            expires_at: now + chrono::Duration::from_std(lease).unwrap_or(chrono::Duration::hours(1)),
        };
        self.state.insert(Self::KEY, serde_json::to_vec(&record)?)?;
        debug!(holder = %self.holder, "publisher lock acquired");
        Ok(())
    }

    /// Releases the lock, but only if it is still held by this instance —
    /// a stale release after our own lease expired and someone else
    /// acquired it must not clobber their lock.
    pub fn release(&self) -> Result<()> {
        if let Some(bytes) = self.state.get(Self::KEY)? {
            let existing: LockRecord = serde_json::from_slice(&bytes)?;
            if existing.holder == self.holder {
                self.state.remove(Self::KEY)?;
                debug!(holder = %self.holder, "publisher lock released");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fjall::{Config, PartitionCreateOptions};
    use tempfile::TempDir;

    fn partition() -> (TempDir, PartitionHandle) {
        let dir = TempDir::new().unwrap();
        let keyspace = Config::new(dir.path()).open().unwrap();
        let partition = keyspace.open_partition("publisher", PartitionCreateOptions::default()).unwrap();
        (dir, partition)
    }

    #[test]
    fn second_holder_is_rejected_while_lease_live() {
        let (_dir, partition) = partition();
        let a = PublisherLock::new(partition.clone(), "a".to_string());
        let b = PublisherLock::new(partition, "b".to_string());

        a.acquire(std::time::Duration::from_secs(60)).unwrap();
        let err = b.acquire(std::time::Duration::from_secs(60)).unwrap_err();
        assert!(matches!(err, PublisherError::LockHeld(holder) if holder == "a"));
    }

    #[test]
    fn release_then_reacquire_by_other_holder_succeeds() {
        let (_dir, partition) = partition();
        let a = PublisherLock::new(partition.clone(), "a".to_string());
        let b = PublisherLock::new(partition, "b".to_string());

        a.acquire(std::time::Duration::from_secs(60)).unwrap();
        a.release().unwrap();
        b.acquire(std::time::Duration::from_secs(60)).unwrap();
    }

    #[test]
    fn expired_lease_is_reacquirable() {
        let (_dir, partition) = partition();
        let a = PublisherLock::new(partition.clone(), "a".to_string());
        let b = PublisherLock::new(partition, "b".to_string());

        a.acquire(std::time::Duration::from_millis(0)).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(5));
        b.acquire(std::time::Duration::from_secs(60)).unwrap();
    }
}
