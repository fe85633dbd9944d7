use anyhow::Result;
use tracing::debug;
use tracing::instrument;
use tracing::warn;

use crate::ops::git::GitOps;

/// Find the branch the current branch most likely diverged from.
///
/// For every other local branch, the merge base with the current branch is
/// computed; the branch whose merge base has the latest committer timestamp
/// wins. Branches are visited in name order and only a strictly later
/// timestamp replaces the current pick, so ties go to the alphabetically first
/// branch. Branches whose merge base cannot be computed are skipped.
///
/// Returns `None` when no branch shares history with the current one.
#[instrument(skip_all)]
pub async fn resolve_parent(git: &dyn GitOps) -> Result<Option<String>> {
    let current = git.current_branch().await?;

    let mut branches: Vec<String> = git
        .local_branches()
        .await?
        .into_iter()
        .filter(|branch| *branch != current)
        .collect();
    branches.sort();

    let mut best: Option<(String, i64)> = None;
    for branch in branches {
        let timestamp = match merge_base_time(git, &current, &branch).await {
            Ok(timestamp) => timestamp,
            Err(e) => {
                warn!("Error checking branch {}: {:#}", branch, e);
                continue;
            }
        };
        debug!(branch, timestamp, "merge base");

        if best.as_ref().is_none_or(|(_, closest)| timestamp > *closest) {
            best = Some((branch, timestamp));
        }
    }

    Ok(best.map(|(branch, _)| branch))
}

/// Like [`resolve_parent`], but falls back to `default_branch` when no parent
/// can be determined.
pub async fn resolve_parent_or(git: &dyn GitOps, default_branch: &str) -> Result<String> {
    match resolve_parent(git).await? {
        Some(parent) => Ok(parent),
        None => {
            warn!(
                "Unable to determine the parent branch. Defaulting to '{}'.",
                default_branch
            );
            Ok(default_branch.to_string())
        }
    }
}

async fn merge_base_time(git: &dyn GitOps, current: &str, branch: &str) -> Result<i64> {
    let base = git.merge_base(current, branch).await?;
    git.commit_time(&base).await
}
