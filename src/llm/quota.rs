use chrono::Utc;
use fjall::PartitionHandle;
use tracing::warn;

/// Broker-wide quota back-off flag, one per provider, stored in a fjall
/// `metadata` partition keyed `quota:{provider}`. Any worker that
/// observes `QuotaExceeded` sets it; every worker checks it before calling
/// a provider, so a single rate-limited provider doesn't get hammered by
/// every concurrent worker.
pub struct QuotaGate {
    metadata: PartitionHandle,
}

impl QuotaGate {
    pub fn new(metadata: PartitionHandle) -> Self {
        Self { metadata }
    }

    fn key(provider: &str) -> Vec<u8> {
        format!("quota:{provider}").into_bytes()
    }

    fn attempts_key(provider: &str) -> Vec<u8> {
        format!("quota_attempts:{provider}").into_bytes()
    }

    fn set_backoff(&self, provider: &str, retry_after_unix_ms: i64) -> Result<(), fjall::Error> {
        warn!(provider, retry_after_unix_ms, "provider quota exceeded, setting back-off flag");
        self.metadata
            .insert(Self::key(provider), retry_after_unix_ms.to_be_bytes())
    }

    fn attempts(&self, provider: &str) -> Result<u32, fjall::Error> {
        match self.metadata.get(Self::attempts_key(provider))? {
            Some(bytes) => Ok(u32::from_be_bytes(bytes.as_ref().try_into().unwrap_or([0u8; 4]))),
            None => Ok(0),
        }
    }

    /// Records a `QuotaExceeded` observation, compounding the back-off
    /// delay on each repeated hit up to `max_delay_s`. Returns
    /// the unix-millis timestamp the gate now backs off until.
    pub fn record_quota_exceeded(
        &self,
        provider: &str,
        base_delay_s: u64,
        backoff: f64,
        max_delay_s: u64,
    ) -> Result<i64, fjall::Error> {
        let attempt = self.attempts(provider)?.saturating_add(1);
        let delay_s = (base_delay_s as f64 * backoff.powi(attempt as i32 - 1)).min(max_delay_s as f64);
        let retry_after_unix_ms = Utc::now().timestamp_millis() + (delay_s * 1000.0) as i64;

        self.metadata.insert(Self::attempts_key(provider), attempt.to_be_bytes())?;
        self.set_backoff(provider, retry_after_unix_ms)?;
        Ok(retry_after_unix_ms)
    }

    /// Clears the compounding attempt counter after a successful call, so
    /// the next quota error starts back off from `base_delay_s` again.
    pub fn reset(&self, provider: &str) -> Result<(), fjall::Error> {
        self.metadata.remove(Self::attempts_key(provider))
    }

    /// Returns `Some(millis_remaining)` if the provider is still backing off.
    pub fn check(&self, provider: &str) -> Result<Option<i64>, fjall::Error> {
        let Some(bytes) = self.metadata.get(Self::key(provider))? else {
            return Ok(None);
        };
        let retry_after = i64::from_be_bytes(bytes.as_ref().try_into().unwrap_or([0u8; 8]));
        let now = Utc::now().timestamp_millis();
        if retry_after > now {
            Ok(Some(retry_after - now))
        } else {
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fjall::{Config, PartitionCreateOptions};
    use tempfile::TempDir;

    #[test]
    fn backoff_blocks_until_expiry() {
        let dir = TempDir::new().unwrap();
        let keyspace = Config::new(dir.path()).open().unwrap();
        let partition = keyspace
            .open_partition("metadata", PartitionCreateOptions::default())
            .unwrap();
        let gate = QuotaGate::new(partition);

        assert!(gate.check("openai").unwrap().is_none());

        gate.record_quota_exceeded("openai", 60, 1.5, 3600).unwrap();
        assert!(gate.check("openai").unwrap().is_some());
    }

    #[test]
    fn backoff_compounds_and_caps_at_max_delay() {
        let dir = TempDir::new().unwrap();
        let keyspace = Config::new(dir.path()).open().unwrap();
        let partition = keyspace
            .open_partition("metadata", PartitionCreateOptions::default())
            .unwrap();
        let gate = QuotaGate::new(partition);

        let now = Utc::now().timestamp_millis();
        let first = gate.record_quota_exceeded("openai", 10, 2.0, 100).unwrap();
        assert!((first - now) >= 9_000 && (first - now) <= 11_000);

        let second = gate.record_quota_exceeded("openai", 10, 2.0, 100).unwrap();
        assert!((second - now) >= 19_000 && (second - now) <= 21_000);

        for _ in 0..5 {
            gate.record_quota_exceeded("openai", 10, 2.0, 100).unwrap();
        }
        let capped = gate.record_quota_exceeded("openai", 10, 2.0, 100).unwrap();
        assert!((capped - now) <= 101_000);

        gate.reset("openai").unwrap();
        let after_reset = gate.record_quota_exceeded("openai", 10, 2.0, 100).unwrap();
        assert!((after_reset - now) >= 9_000 && (after_reset - now) <= 11_000);
    }
}
