use std::time::Duration;

use chrono::Utc;
use fjall::PartitionHandle;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::error::Result;
use super::provider::GeocodeResult;

#[derive(Serialize, Deserialize)]
struct CacheEntry {
    result: GeocodeResult,
    cached_at_unix_ms: i64,
}

/// Single shared fjall-backed cache, namespaced `geocode:` ("one
/// shared cache namespace... one TTL across the system"), keyed by the
/// full SHA-256 of the normalised address.
pub struct GeocodeCache {
    partition: PartitionHandle,
    ttl: Duration,
}

impl GeocodeCache {
    pub fn new(partition: PartitionHandle, ttl: Duration) -> Self {
        Self { partition, ttl }
    }

    fn key(address: &str) -> Vec<u8> {
        let normalised = address.trim().to_lowercase();
        let mut hasher = Sha256::new();
        hasher.update(normalised.as_bytes());
        let digest = hasher.finalize();
        let mut key = b"geocode:".to_vec();
        key.extend_from_slice(&digest);
        key
    }

    pub fn get(&self, address: &str) -> Result<Option<GeocodeResult>> {
        let Some(bytes) = self.partition.get(Self::key(address))? else {
            return Ok(None);
        };
        let entry: CacheEntry = serde_json::from_slice(&bytes)?;
        let age_ms = Utc::now().timestamp_millis() - entry.cached_at_unix_ms;
        if age_ms > self.ttl.as_millis() as i64 {
            Ok(None)
        } else {
            Ok(Some(entry.result))
        }
    }

    pub fn put(&self, address: &str, result: &GeocodeResult) -> Result<()> {
        let entry = CacheEntry {
            result: result.clone(),
            cached_at_unix_ms: Utc::now().timestamp_millis(),
        };
        self.partition
            .insert(Self::key(address), serde_json::to_vec(&entry)?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geocoder::Precision;
    use fjall::{Config, PartitionCreateOptions};
    use tempfile::TempDir;

    fn open_partition(dir: &TempDir) -> PartitionHandle {
        let keyspace = Config::new(dir.path()).open().unwrap();
        keyspace
            .open_partition("geocode_cache", PartitionCreateOptions::default())
            .unwrap()
    }

    #[test]
    fn miss_then_hit_after_put() {
        let dir = TempDir::new().unwrap();
        let cache = GeocodeCache::new(open_partition(&dir), Duration::from_secs(3600));

        assert!(cache.get("123 Main St").unwrap().is_none());

        let result = GeocodeResult {
            latitude: 39.0,
            longitude: -98.0,
            provider: "arcgis".into(),
            precision: Precision::Rooftop,
        };
        cache.put("123 Main St", &result).unwrap();

        let hit = cache.get("123 Main St").unwrap().unwrap();
        assert_eq!(hit.latitude, 39.0);
    }

    #[test]
    fn expired_entry_is_a_miss() {
        let dir = TempDir::new().unwrap();
        let cache = GeocodeCache::new(open_partition(&dir), Duration::from_millis(1));
        let result = GeocodeResult {
            latitude: 39.0,
            longitude: -98.0,
            provider: "arcgis".into(),
            precision: Precision::Rooftop,
        };
        cache.put("123 Main St", &result).unwrap();
        std::thread::sleep(Duration::from_millis(20));
        assert!(cache.get("123 Main St").unwrap().is_none());
    }
}
