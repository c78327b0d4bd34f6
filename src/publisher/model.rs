use chrono::{DateTime, Utc};
use fjall::PartitionHandle;
use serde::{Deserialize, Serialize};

use super::error::Result;
use super::snapshot::RowCounts;

/// Persistent publisher state: last successful cycle, last commit id, and
/// the ratchet high-water mark.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PublisherState {
    pub last_cycle_at: Option<DateTime<Utc>>,
    pub last_commit_id: Option<String>,
    pub high_water: i64,
    #[serde(default)]
    pub last_row_counts: Option<RowCounts>,
}

impl PublisherState {
    const KEY: &'static [u8] = b"publisher:state";

    pub fn load(partition: &PartitionHandle) -> Result<Self> {
        match partition.get(Self::KEY)? {
            Some(bytes) => Ok(serde_json::from_slice(&bytes)?),
            None => Ok(Self::default()),
        }
    }

    pub fn save(&self, partition: &PartitionHandle) -> Result<()> {
        partition.insert(Self::KEY, serde_json::to_vec(self)?)?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct PublishCycleReport {
    pub commit_id: Option<String>,
    pub row_counts: RowCounts,
}
