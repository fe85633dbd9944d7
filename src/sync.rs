use anyhow::Result;
use tracing::error;
use tracing::instrument;

use crate::ops::git::GitOps;

/// What [`sync_and_commit`] ended up doing with the working tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Changes were committed and pushed.
    Committed,
    /// The tree was dirty but staging produced nothing to commit.
    NothingStaged,
    /// The tree had no changes.
    Clean,
    /// A git command failed; the error has been logged.
    Failed,
}

/// Put the work on `new_branch` and commit it.
///
/// - On `default_branch`: create `new_branch` from it and push with upstream.
/// - On another branch with a different name: rename it and push with upstream.
/// - Then, if the tree is dirty, stage everything and commit and push when the
///   index differs from HEAD.
///
/// Git failures are logged and reported as [`SyncOutcome::Failed`]; only
/// failures writing to `stdout` are returned as errors.
#[instrument(skip(git, commit_message, stdout))]
pub async fn sync_and_commit(
    git: &dyn GitOps,
    default_branch: &str,
    new_branch: &str,
    commit_message: &str,
    stdout: &mut impl std::io::Write,
) -> Result<SyncOutcome> {
    match try_sync(git, default_branch, new_branch, commit_message).await {
        Ok(synced) => {
            writeln!(stdout, "{}", synced.message())?;
            writeln!(stdout, "Git operations completed successfully.")?;
            Ok(synced.into())
        }
        Err(e) => {
            error!("An error occurred while executing Git commands: {:#}", e);
            writeln!(
                stdout,
                "An error occurred while executing Git commands: {:#}",
                e
            )?;
            Ok(SyncOutcome::Failed)
        }
    }
}

/// The outcomes of a sync in which every git command succeeded.
enum Synced {
    Committed,
    NothingStaged,
    Clean,
}

impl Synced {
    fn message(&self) -> &'static str {
        match self {
            Synced::Committed => "Changes committed successfully.",
            Synced::NothingStaged => "No staged changes to commit.",
            Synced::Clean => "No changes detected in the repository.",
        }
    }
}

impl From<Synced> for SyncOutcome {
    fn from(synced: Synced) -> Self {
        match synced {
            Synced::Committed => SyncOutcome::Committed,
            Synced::NothingStaged => SyncOutcome::NothingStaged,
            Synced::Clean => SyncOutcome::Clean,
        }
    }
}

async fn try_sync(
    git: &dyn GitOps,
    default_branch: &str,
    new_branch: &str,
    commit_message: &str,
) -> Result<Synced> {
    let current = git.current_branch().await?;

    if current == default_branch {
        git.create_branch(new_branch).await?;
        git.push_upstream(new_branch).await?;
    } else if current != new_branch {
        git.rename_branch(new_branch).await?;
        git.push_upstream(new_branch).await?;
    }

    if !git.is_dirty().await? {
        return Ok(Synced::Clean);
    }

    git.add_all().await?;
    if !git.has_staged_changes().await? {
        return Ok(Synced::NothingStaged);
    }

    git.commit(commit_message).await?;
    git.push().await?;
    Ok(Synced::Committed)
}

#[cfg(test)]
mod tests {
    use anyhow::anyhow;
    use mockall::Sequence;
    use mockall::predicate::eq;

    use super::*;
    use crate::ops::git::MockGitOps;

    #[tokio::test]
    async fn test_from_default_branch_with_changes() {
        let mut seq = Sequence::new();
        let mut git = MockGitOps::new();
        git.expect_current_branch()
            .returning(|| Ok("main".to_string()));
        git.expect_create_branch()
            .with(eq("feature/x"))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        git.expect_push_upstream()
            .with(eq("feature/x"))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        git.expect_is_dirty().returning(|| Ok(true));
        git.expect_add_all()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Ok(()));
        git.expect_has_staged_changes().returning(|| Ok(true));
        git.expect_commit()
            .with(eq("feat: add x"))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        git.expect_push()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Ok(()));

        let mut out = Vec::new();
        let outcome = sync_and_commit(&git, "main", "feature/x", "feat: add x", &mut out)
            .await
            .unwrap();
        assert_eq!(outcome, SyncOutcome::Committed);
        insta::assert_snapshot!(String::from_utf8(out).unwrap(), @r"
        Changes committed successfully.
        Git operations completed successfully.
        ");
    }

    #[tokio::test]
    async fn test_same_branch_clean_tree_makes_no_mutations() {
        let mut git = MockGitOps::new();
        git.expect_current_branch()
            .returning(|| Ok("feature/x".to_string()));
        git.expect_is_dirty().returning(|| Ok(false));
        git.expect_create_branch().never();
        git.expect_rename_branch().never();
        git.expect_push_upstream().never();
        git.expect_add_all().never();
        git.expect_commit().never();
        git.expect_push().never();

        let mut out = Vec::new();
        let outcome = sync_and_commit(&git, "main", "feature/x", "msg", &mut out)
            .await
            .unwrap();
        assert_eq!(outcome, SyncOutcome::Clean);
        assert!(String::from_utf8(out).unwrap().contains("No changes detected"));
    }

    #[tokio::test]
    async fn test_renames_other_branch() {
        let mut seq = Sequence::new();
        let mut git = MockGitOps::new();
        git.expect_current_branch()
            .returning(|| Ok("wip".to_string()));
        git.expect_rename_branch()
            .with(eq("jdoe/fix-login"))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        git.expect_push_upstream()
            .with(eq("jdoe/fix-login"))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        git.expect_create_branch().never();
        git.expect_is_dirty().returning(|| Ok(false));

        let mut out = Vec::new();
        let outcome = sync_and_commit(&git, "main", "jdoe/fix-login", "msg", &mut out)
            .await
            .unwrap();
        assert_eq!(outcome, SyncOutcome::Clean);
    }

    #[tokio::test]
    async fn test_dirty_tree_with_nothing_staged() {
        let mut git = MockGitOps::new();
        git.expect_current_branch()
            .returning(|| Ok("feature/x".to_string()));
        git.expect_is_dirty().returning(|| Ok(true));
        git.expect_add_all().times(1).returning(|| Ok(()));
        git.expect_has_staged_changes().returning(|| Ok(false));
        git.expect_commit().never();
        git.expect_push().never();

        let mut out = Vec::new();
        let outcome = sync_and_commit(&git, "main", "feature/x", "msg", &mut out)
            .await
            .unwrap();
        assert_eq!(outcome, SyncOutcome::NothingStaged);
        assert!(String::from_utf8(out).unwrap().contains("No staged changes to commit."));
    }

    #[tokio::test]
    async fn test_git_failure_is_not_fatal() {
        let mut git = MockGitOps::new();
        git.expect_current_branch()
            .returning(|| Ok("main".to_string()));
        git.expect_create_branch().returning(|_| Ok(()));
        git.expect_push_upstream()
            .returning(|_| Err(anyhow!("git push failed: remote rejected")));
        git.expect_is_dirty().never();

        let mut out = Vec::new();
        let outcome = sync_and_commit(&git, "main", "feature/x", "msg", &mut out)
            .await
            .unwrap();
        assert_eq!(outcome, SyncOutcome::Failed);
        insta::assert_snapshot!(String::from_utf8(out).unwrap(), @"An error occurred while executing Git commands: git push failed: remote rejected");
    }
}
