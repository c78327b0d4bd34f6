use std::path::Path;

use git2::{IndexAddOption, Repository, Signature};
use tracing::{info, warn};

use super::error::{PublisherError, Result};
use super::snapshot::RowCounts;
use crate::config::PublisherConfig;

const BRANCH: &str = "main";

/// Fetches and fast-forwards from the remote, stages artifacts into the
/// target repository, commits with a structured message carrying both row
/// counts and their diff against the previous snapshot, and pushes. Any
/// failure here leaves the remote untouched — the caller has already
/// verified the ratchet before staging, but a non-fast-forward, auth, or
/// network failure must not leave a half-applied commit on the remote.
pub fn commit_and_push(
    staging_dir: &Path,
    config: &PublisherConfig,
    row_counts: &RowCounts,
    previous_row_counts: Option<&RowCounts>,
) -> Result<String> {
    let repo_path = config
        .repository_path
        .clone()
        .unwrap_or_else(|| staging_dir.to_path_buf());

    let repo = if repo_path.join(".git").exists() {
        Repository::open(&repo_path)?
    } else {
        Repository::init(&repo_path)?
    };

    if let Some(remote_url) = &config.repository_url {
        fetch_and_fast_forward(&repo, remote_url)?;
    }

    if repo_path != staging_dir {
        copy_artifacts(staging_dir, &repo_path)?;
    }

    let mut index = repo.index()?;
    index.add_all(["*"].iter(), IndexAddOption::DEFAULT, None)?;
    index.write()?;
    let tree_id = index.write_tree()?;
    let tree = repo.find_tree(tree_id)?;

    let signature = Signature::now("hsds-pipeline", "pipeline@localhost")?;
    let message = format!(
        "publish snapshot: {} organizations, {} locations, {} services, {} service_at_locations\n\n{}",
        row_counts.organizations,
        row_counts.locations,
        row_counts.services,
        row_counts.service_at_locations,
        diff_stats_line(row_counts, previous_row_counts),
    );

    let parent_commit = repo.head().ok().and_then(|h| h.peel_to_commit().ok());
    let parents: Vec<&git2::Commit> = parent_commit.iter().collect();
    let commit_id = repo.commit(
        Some(&format!("refs/heads/{BRANCH}")),
        &signature,
        &signature,
        &message,
        &tree,
        &parents,
    )?;
    repo.set_head(&format!("refs/heads/{BRANCH}"))?;

    if let Some(remote_url) = &config.repository_url {
        push(&repo, remote_url)?;
    }

    info!(commit_id = %commit_id, "artifacts committed");
    Ok(commit_id.to_string())
}

/// Renders per-entity added/removed counts against the previous snapshot.
/// There is no previous snapshot on the very first publish.
fn diff_stats_line(current: &RowCounts, previous: Option<&RowCounts>) -> String {
    let previous = match previous {
        Some(p) => *p,
        None => return "diff: initial snapshot".to_string(),
    };

    let field = |name: &str, cur: i64, prev: i64| -> String {
        let delta = cur - prev;
        format!("{name} {delta:+}")
    };

    format!(
        "diff: {}, {}, {}, {}",
        field("organizations", current.organizations, previous.organizations),
        field("locations", current.locations, previous.locations),
        field("services", current.services, previous.services),
        field("service_at_locations", current.service_at_locations, previous.service_at_locations),
    )
}

/// Fetches `main` from `origin` and fast-forwards the local branch onto it
/// before any new artifacts are staged, so the commit we build always sits
/// on top of whatever the remote has accumulated since our last cycle.
fn fetch_and_fast_forward(repo: &Repository, remote_url: &str) -> Result<()> {
    let mut remote = match repo.find_remote("origin") {
        Ok(remote) => remote,
        Err(_) => repo.remote("origin", remote_url)?,
    };

    if let Err(err) = remote.fetch(&[BRANCH], None, None) {
        warn!(%err, "fetch from remote failed, assuming first publish to an empty repository");
        return Ok(());
    }

    let fetch_head = match repo.find_reference("FETCH_HEAD") {
        Ok(reference) => reference,
        Err(_) => return Ok(()),
    };
    let fetch_commit = repo.reference_to_annotated_commit(&fetch_head)?;
    let analysis = repo.merge_analysis(&[&fetch_commit])?;

    if analysis.0.is_up_to_date() {
        return Ok(());
    }

    if analysis.0.is_fast_forward() {
        let branch_ref = format!("refs/heads/{BRANCH}");
        match repo.find_reference(&branch_ref) {
            Ok(mut reference) => {
                reference.set_target(fetch_commit.id(), "fast-forward publisher branch")?;
            }
            Err(_) => {
                repo.reference(&branch_ref, fetch_commit.id(), true, "fast-forward publisher branch")?;
            }
        }
        repo.set_head(&branch_ref)?;
        let mut checkout = git2::build::CheckoutBuilder::new();
        checkout.force();
        repo.checkout_head(Some(&mut checkout))?;
        return Ok(());
    }

    Err(PublisherError::Git(git2::Error::from_str(
        "local publisher branch has diverged from remote, refusing to publish",
    )))
}

fn copy_artifacts(from: &Path, to: &Path) -> Result<()> {
    std::fs::create_dir_all(to)?;
    for entry in std::fs::read_dir(from)? {
        let entry = entry?;
        let dest = to.join(entry.file_name());
        std::fs::copy(entry.path(), dest)?;
    }
    Ok(())
}

fn push(repo: &Repository, remote_url: &str) -> Result<()> {
    let mut remote = match repo.find_remote("origin") {
        Ok(remote) => remote,
        Err(_) => repo.remote("origin", remote_url)?,
    };
    remote
        .push(&[format!("refs/heads/{BRANCH}:refs/heads/{BRANCH}")], None)
        .map_err(PublisherError::Git)
}
