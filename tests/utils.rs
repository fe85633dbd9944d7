use std::path::Path;
use std::process::Stdio;

use tokio::process::Command;

/// Runs git in `dir`, failing unless it exits successfully.
pub async fn git(dir: &Path, args: &[&str]) -> anyhow::Result<String> {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .stdin(Stdio::null())
        .output()
        .await?;
    anyhow::ensure!(
        output.status.success(),
        "git {} failed: {}",
        args.join(" "),
        String::from_utf8_lossy(&output.stderr).trim()
    );

    Ok(String::from_utf8(output.stdout)?)
}

/// Creates a git repository in the given directory with `main` checked out.
///
/// This initializes the repo and sets basic git config needed for commits.
/// The directory should already exist.
pub async fn create_git_repo(dir: &Path) -> anyhow::Result<()> {
    git(dir, &["init", "--quiet"]).await?;
    git(dir, &["symbolic-ref", "HEAD", "refs/heads/main"]).await?;

    // Set git config for commits
    git(dir, &["config", "user.name", "Test User"]).await?;
    git(dir, &["config", "user.email", "test@example.com"]).await?;
    git(dir, &["config", "commit.gpgsign", "false"]).await?;

    Ok(())
}

/// Creates a bare repository to push to and registers it as `origin`.
pub async fn create_bare_origin(dir: &Path, origin: &Path) -> anyhow::Result<()> {
    std::fs::create_dir_all(origin)?;
    git(origin, &["init", "--bare", "--quiet"]).await?;
    let origin = origin.to_str().ok_or_else(|| anyhow::anyhow!("non UTF-8 path"))?;
    setup_git_remote(dir, origin).await
}

/// Sets up a git remote origin for the repository.
pub async fn setup_git_remote(dir: &Path, remote_url: &str) -> anyhow::Result<()> {
    git(dir, &["remote", "add", "origin", remote_url]).await?;
    Ok(())
}

/// Creates a commit with a single file, authored and committed at `timestamp`.
pub async fn create_commit(
    dir: &Path,
    message: &str,
    filename: &str,
    contents: &str,
    timestamp: i64,
) -> anyhow::Result<()> {
    // Write the file
    tokio::fs::write(dir.join(filename), contents).await?;
    git(dir, &["add", filename]).await?;

    let date = format!("@{} +0000", timestamp);
    let status = Command::new("git")
        .args(["commit", "--quiet", "-m", message])
        .env("GIT_AUTHOR_DATE", &date)
        .env("GIT_COMMITTER_DATE", &date)
        .current_dir(dir)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await?;
    anyhow::ensure!(status.success(), "git commit failed");

    Ok(())
}

pub enum TestDir {
    Temp(tempfile::TempDir),
    Kept(std::path::PathBuf),
}

impl TestDir {
    pub fn new() -> std::io::Result<Self> {
        let temp_dir = tempfile::tempdir()?;

        if std::env::var("DEBUG_TESTS").is_ok() {
            let path = temp_dir.keep();
            eprintln!("Test directory kept at: {}", path.display());
            Ok(TestDir::Kept(path))
        } else {
            Ok(TestDir::Temp(temp_dir))
        }
    }

    pub fn path(&self) -> &std::path::Path {
        match self {
            TestDir::Temp(t) => t.path(),
            TestDir::Kept(p) => p.as_path(),
        }
    }
}
