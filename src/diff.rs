use anyhow::Result;
use tracing::debug;
use tracing::error;
use tracing::instrument;
use tracing::warn;

use crate::ops::git::GitOps;

/// The changes a pull request is drafted from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectedDiff {
    /// Unstaged, staged and branch diffs, in that order, newline separated.
    pub diff: String,
    /// Labelled contents of every readable untracked file.
    pub untracked: String,
}

/// Gather the working tree diff, the index diff and the `base...HEAD` diff,
/// plus the text of untracked files.
///
/// Errors are logged and reported as `None`.
#[instrument(skip(git))]
pub async fn collect_diff(git: &dyn GitOps, base_branch: &str) -> Option<CollectedDiff> {
    match try_collect_diff(git, base_branch).await {
        Ok(collected) => Some(collected),
        Err(e) => {
            error!("Error retrieving Git diffs: {:#}", e);
            None
        }
    }
}

async fn try_collect_diff(git: &dyn GitOps, base_branch: &str) -> Result<CollectedDiff> {
    let unstaged = git.diff_unstaged().await?;
    let staged = git.diff_staged().await?;
    let branch = git.diff_from(base_branch).await?;
    let diff = format!("{}\n{}\n{}", unstaged, staged, branch);

    let workdir = git.workdir();
    let mut untracked = String::new();
    for path in git.untracked_files().await? {
        let full_path = workdir.join(&path);
        if !full_path.is_file() {
            debug!("Skipping non-regular untracked path: {}", path);
            continue;
        }

        let bytes = match tokio::fs::read(&full_path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("Skipping unreadable file: {} ({})", path, e);
                continue;
            }
        };
        match String::from_utf8(bytes) {
            Ok(contents) => {
                untracked.push_str(&format!(
                    "\n\n--- Untracked file: {} ---\n{}",
                    path, contents
                ));
            }
            Err(_) => warn!("Skipping binary or unreadable file: {}", path),
        }
    }

    Ok(CollectedDiff { diff, untracked })
}
