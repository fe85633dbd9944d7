use std::fmt::Display;
use std::path::Path;
use std::path::PathBuf;
use std::process::Output;

use anyhow::Context;
use anyhow::Result;
use anyhow::bail;
use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use tokio::process::Command;
use tracing::instrument;

// -----------------------------------------------------------------------------
// Types

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitId(pub String);

impl Display for CommitId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// -----------------------------------------------------------------------------
// GitOps trait

/// Operations on the local working copy.
#[cfg_attr(test, automock)]
#[async_trait(?Send)]
pub trait GitOps {
    /// Root of the working tree. Paths returned by [`GitOps::untracked_files`]
    /// are relative to it.
    fn workdir(&self) -> PathBuf;

    /// Name of the checked-out branch. Fails on a detached HEAD.
    async fn current_branch(&self) -> Result<String>;

    /// Names of all local branches, including the current one.
    async fn local_branches(&self) -> Result<Vec<String>>;

    /// The best common ancestor of two revisions.
    async fn merge_base(&self, a: &str, b: &str) -> Result<CommitId>;

    /// Committer timestamp of a commit, in seconds since the epoch.
    async fn commit_time(&self, commit: &CommitId) -> Result<i64>;

    /// URL of the `origin` remote, if configured.
    async fn remote_url(&self) -> Result<Option<String>>;

    /// Working tree changes not yet staged.
    async fn diff_unstaged(&self) -> Result<String>;

    /// Changes staged in the index.
    async fn diff_staged(&self) -> Result<String>;

    /// Changes on HEAD since it diverged from `base` (`base...HEAD`).
    async fn diff_from(&self, base: &str) -> Result<String>;

    /// Untracked, non-ignored files.
    async fn untracked_files(&self) -> Result<Vec<String>>;

    /// Whether the working tree has any modification, including untracked files.
    async fn is_dirty(&self) -> Result<bool>;

    /// Create `branch` from the current HEAD and switch to it.
    async fn create_branch(&self, branch: &str) -> Result<()>;

    /// Rename the current branch to `branch`.
    async fn rename_branch(&self, branch: &str) -> Result<()>;

    /// Push `branch` to `origin` and set it as upstream.
    async fn push_upstream(&self, branch: &str) -> Result<()>;

    /// Stage every change in the working tree.
    async fn add_all(&self) -> Result<()>;

    /// Whether the index differs from HEAD.
    async fn has_staged_changes(&self) -> Result<bool>;

    async fn commit(&self, message: &str) -> Result<()>;

    /// Push the current branch to its upstream.
    async fn push(&self) -> Result<()>;
}

// -----------------------------------------------------------------------------
// RealGit

/// Real implementation that calls the git CLI
pub struct RealGit {
    path: PathBuf,
}

impl RealGit {
    /// Open the working copy containing `path`.
    ///
    /// Fails if `path` is not inside a git repository or if the repository is
    /// bare.
    pub async fn open(path: &Path) -> Result<Self> {
        let output = Command::new("git")
            .current_dir(path)
            .args(["rev-parse", "--is-bare-repository"])
            .output()
            .await
            .context("Failed to execute git command")?;

        if !output.status.success() {
            bail!("The current directory is not a Git repository.");
        }
        if String::from_utf8(output.stdout)?.trim() == "true" {
            bail!("The directory is a bare Git repository.");
        }

        let output = Command::new("git")
            .current_dir(path)
            .args(["rev-parse", "--show-toplevel"])
            .output()
            .await
            .context("Failed to execute git command")?;

        if !output.status.success() {
            bail!(
                "git rev-parse failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }

        let toplevel = String::from_utf8(output.stdout)?.trim().to_string();
        Ok(Self {
            path: PathBuf::from(toplevel),
        })
    }

    async fn output(&self, args: &[&str]) -> Result<Output> {
        Command::new("git")
            .current_dir(&self.path)
            .args(args)
            .output()
            .await
            .context("Failed to execute git command")
    }

    /// Run a git command and return its stdout, failing on a non-zero exit.
    async fn run(&self, args: &[&str]) -> Result<String> {
        let output = self.output(args).await?;

        if !output.status.success() {
            bail!(
                "git {} failed: {}",
                args.first().copied().unwrap_or_default(),
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }

        // Diffs may contain non UTF-8 content from binary-ish files
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait(?Send)]
impl GitOps for RealGit {
    fn workdir(&self) -> PathBuf {
        self.path.clone()
    }

    async fn current_branch(&self) -> Result<String> {
        let output = self.output(&["symbolic-ref", "--short", "-q", "HEAD"]).await?;

        if !output.status.success() {
            bail!("HEAD is detached; check out a branch first");
        }

        Ok(String::from_utf8(output.stdout)?.trim().to_string())
    }

    async fn local_branches(&self) -> Result<Vec<String>> {
        let output = self
            .run(&["for-each-ref", "--format=%(refname:short)", "refs/heads/"])
            .await?;

        Ok(output
            .lines()
            .map(|line| line.trim().to_string())
            .filter(|line| !line.is_empty())
            .collect())
    }

    async fn merge_base(&self, a: &str, b: &str) -> Result<CommitId> {
        let output = self.run(&["merge-base", a, b]).await?;
        let commit = output.trim();
        if commit.is_empty() {
            bail!("No merge base between {} and {}", a, b);
        }
        Ok(CommitId(commit.to_string()))
    }

    async fn commit_time(&self, commit: &CommitId) -> Result<i64> {
        let output = self.run(&["show", "-s", "--format=%ct", &commit.0]).await?;
        output
            .trim()
            .parse::<i64>()
            .with_context(|| format!("Unexpected commit timestamp for {}: {:?}", commit, output))
    }

    async fn remote_url(&self) -> Result<Option<String>> {
        let output = self
            .output(&["config", "--get", "remote.origin.url"])
            .await?;

        // Exit code 1 means the key is not set
        if !output.status.success() {
            return Ok(None);
        }

        let url = String::from_utf8(output.stdout)?.trim().to_string();
        Ok((!url.is_empty()).then_some(url))
    }

    async fn diff_unstaged(&self) -> Result<String> {
        self.run(&["diff"]).await
    }

    async fn diff_staged(&self) -> Result<String> {
        self.run(&["diff", "--cached"]).await
    }

    async fn diff_from(&self, base: &str) -> Result<String> {
        self.run(&["diff", &format!("{}...HEAD", base)]).await
    }

    async fn untracked_files(&self) -> Result<Vec<String>> {
        let output = self
            .run(&["ls-files", "--others", "--exclude-standard", "-z"])
            .await?;

        Ok(output
            .split('\0')
            .filter(|path| !path.is_empty())
            .map(|path| path.to_string())
            .collect())
    }

    async fn is_dirty(&self) -> Result<bool> {
        let output = self.run(&["status", "--porcelain"]).await?;
        Ok(!output.trim().is_empty())
    }

    #[instrument(skip(self))]
    async fn create_branch(&self, branch: &str) -> Result<()> {
        self.run(&["checkout", "-b", branch]).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn rename_branch(&self, branch: &str) -> Result<()> {
        self.run(&["branch", "-m", branch]).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn push_upstream(&self, branch: &str) -> Result<()> {
        self.run(&["push", "-u", "origin", branch]).await?;
        Ok(())
    }

    async fn add_all(&self) -> Result<()> {
        self.run(&["add", "-A"]).await?;
        Ok(())
    }

    async fn has_staged_changes(&self) -> Result<bool> {
        let output = self.output(&["diff", "--cached", "--quiet"]).await?;

        // Exit code 0 means no difference, 1 means there are staged changes
        match output.status.code() {
            Some(0) => Ok(false),
            Some(1) => Ok(true),
            _ => bail!(
                "git diff failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            ),
        }
    }

    #[instrument(skip_all)]
    async fn commit(&self, message: &str) -> Result<()> {
        self.run(&["commit", "-m", message]).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn push(&self) -> Result<()> {
        self.run(&["push"]).await?;
        Ok(())
    }
}
