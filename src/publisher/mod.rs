//! Periodic materialization of the canonical store into a distributable
//! bundle, committed to an external git repository.

mod artifacts;
mod error;
mod git_sync;
mod lock;
mod model;
mod ratchet;
mod snapshot;

pub use error::{PublisherError, Result};
pub use lock::PublisherLock;
pub use model::{PublishCycleReport, PublisherState};
pub use ratchet::RatchetGuard;

use std::path::PathBuf;
use std::time::Duration;

use fjall::PartitionHandle;
use sqlx::PgPool;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::PublisherConfig;

pub struct Publisher {
    pool: PgPool,
    config: PublisherConfig,
    state: PartitionHandle,
    lock: PublisherLock,
}

impl Publisher {
    pub fn new(pool: PgPool, config: PublisherConfig, state: PartitionHandle) -> Self {
        let holder = Uuid::new_v4().to_string();
        let lock = PublisherLock::new(state.clone(), holder);
        Self { pool, config, state, lock }
    }

    /// Runs one publish cycle end to end. Returns
    /// without touching the remote if any step after staging fails.
    pub async fn run_cycle(&self) -> Result<PublishCycleReport> {
        info!("starting publish cycle");

        // Single-writer lease held for the whole cycle so two `pipeline
        // publish` invocations never stage/commit against the same git
        // working tree concurrently. Leased generously above the
        // configured cadence since a cycle is expected to finish well
        // inside one interval.
        let lease = Duration::from_secs(self.config.interval_s.max(60) * 2);
        self.lock.acquire(lease)?;
        let result = self.run_cycle_locked().await;
        let _ = self.lock.release();
        result
    }

    async fn run_cycle_locked(&self) -> Result<PublishCycleReport> {
        let previous_state = model::PublisherState::load(&self.state)?;

        let snapshot = snapshot::read_snapshot(&self.pool).await?;
        let row_counts = snapshot.row_counts();
        let total_rows = row_counts.total();

        let guard = RatchetGuard::new(self.config.ratchet_fraction, self.config.ratchet_override);
        if !guard.allows(previous_state.high_water, total_rows) {
            error!(
                previous_high_water = previous_state.high_water,
                current = total_rows,
                "ratchet guard rejected publish cycle, leaving remote untouched"
            );
            return Err(PublisherError::RatchetViolation {
                previous_high_water: previous_state.high_water,
                current: total_rows,
            });
        }

        let staging_dir = self.stage_artifacts(&snapshot).await?;

        let commit_result = git_sync::commit_and_push(
            &staging_dir,
            &self.config,
            &row_counts,
            previous_state.last_row_counts.as_ref(),
        );

        match commit_result {
            Ok(commit_id) => {
                let new_high_water = previous_state.high_water.max(total_rows);
                let new_state = PublisherState {
                    last_cycle_at: Some(chrono::Utc::now()),
                    last_commit_id: Some(commit_id.clone()),
                    high_water: new_high_water,
                    last_row_counts: Some(row_counts),
                };
                new_state.save(&self.state)?;
                info!(commit_id, total_rows, organizations = row_counts.organizations, "publish cycle complete");
                Ok(PublishCycleReport {
                    commit_id: Some(commit_id),
                    row_counts,
                })
            }
            Err(err) => {
                warn!(%err, "publish cycle failed after staging, remote left untouched");
                Err(err)
            }
        }
    }

    async fn stage_artifacts(&self, snapshot: &snapshot::Snapshot) -> Result<PathBuf> {
        let staging_dir = self.config.staging_dir.clone();
        tokio::fs::create_dir_all(&staging_dir).await?;

        artifacts::write_jsonl(&staging_dir, snapshot)?;
        artifacts::write_geojson(&staging_dir, snapshot)?;
        artifacts::write_sqlite(&staging_dir, snapshot)?;

        Ok(staging_dir)
    }
}
