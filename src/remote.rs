//! Parsing of git remote URLs into a host and an `owner/repo` slug.

use std::sync::LazyLock;

use regex::Regex;

// Parse URLs like:
// https://github.com/owner/repo.git
// https://user@bitbucket.org/workspace/repo.git
// git@github.com:owner/repo.git
static HTTPS_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https?://(?:[^@/]+@)?(?P<host>[^/:@]+)(?::\d+)?/(?P<path>.+)$").unwrap()
});
static SSH_URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\w.-]+@(?P<host>[^:/]+):(?P<path>.+)$").unwrap());

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteUrl {
    pub host: String,
    pub owner: String,
    pub repo: String,
}

impl RemoteUrl {
    /// Parse an HTTPS or SCP-style SSH remote URL. Any other form yields `None`.
    pub fn parse(url: &str) -> Option<Self> {
        let url = url.trim();
        let captures = HTTPS_URL
            .captures(url)
            .or_else(|| SSH_URL.captures(url))?;

        let host = captures["host"].to_lowercase();
        let path = captures["path"].trim_end_matches('/');
        let path = path.strip_suffix(".git").unwrap_or(path);

        let mut segments = path.rsplit('/').filter(|s| !s.is_empty());
        let repo = segments.next()?.to_string();
        let owner = segments.next()?.to_string();

        Some(Self { host, owner, repo })
    }

    /// The `owner/repo` identifier.
    pub fn slug(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }
}

/// Shorthand for [`RemoteUrl::parse`] followed by [`RemoteUrl::slug`].
pub fn repo_slug(url: &str) -> Option<String> {
    RemoteUrl::parse(url).map(|remote| remote.slug())
}
