//! Hosting providers that pull requests can be opened on.
//!
//! - [`github`]: GitHub REST API, bearer-token auth
//! - [`bitbucket`]: Bitbucket Cloud 2.0 API, username + app password auth
//!
//! [`detect_provider`] maps a remote host to a [`ProviderKind`];
//! [`connect`] builds and validates the matching [`VcsProvider`].

pub mod bitbucket;
pub mod github;

use std::fmt::Display;

use anyhow::Context;
use anyhow::Result;
use anyhow::bail;
use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use crate::config::Config;
use crate::ops::git::GitOps;
use crate::remote::RemoteUrl;

pub use bitbucket::BitbucketProvider;
pub use github::GithubProvider;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    GitHub,
    Bitbucket,
}

impl Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::GitHub => f.write_str("GitHub"),
            Self::Bitbucket => f.write_str("Bitbucket"),
        }
    }
}

/// Operations every hosting provider supports.
#[cfg_attr(test, automock)]
#[async_trait(?Send)]
pub trait VcsProvider {
    fn kind(&self) -> ProviderKind;

    /// Fail if the credentials this provider needs are missing.
    fn validate_environment(&self) -> Result<()>;

    /// Handle of the authenticated user.
    async fn get_username(&self) -> Result<String>;

    /// Open a pull request from `head_branch` into the branch it was forked
    /// from, or update the title and body of the matching open one. Returns
    /// the pull request URL.
    async fn create_or_update_pull_request(
        &self,
        head_branch: &str,
        title: &str,
        body: &str,
    ) -> Result<String>;
}

/// Map a remote host to the provider serving it.
pub fn detect_provider(host: &str) -> Result<ProviderKind> {
    match host.to_ascii_lowercase().as_str() {
        "github.com" => Ok(ProviderKind::GitHub),
        "bitbucket.org" => Ok(ProviderKind::Bitbucket),
        other => bail!("Unsupported service provider: {}", other),
    }
}

/// Build the provider for the repository's `origin` remote and check its
/// credentials.
pub async fn connect<'a>(
    config: &Config,
    git: &'a dyn GitOps,
) -> Result<Box<dyn VcsProvider + 'a>> {
    let remote = origin_remote(git).await?;
    let kind = detect_provider(&remote.host)?;

    let provider: Box<dyn VcsProvider + 'a> = match kind {
        ProviderKind::GitHub => Box::new(GithubProvider::from_config(config, git)),
        ProviderKind::Bitbucket => Box::new(BitbucketProvider::from_config(config, git)),
    };
    provider.validate_environment()?;

    Ok(provider)
}

/// The parsed `origin` remote.
pub(crate) async fn origin_remote(git: &dyn GitOps) -> Result<RemoteUrl> {
    let url = git
        .remote_url()
        .await?
        .context("No remote URL found for the repository.")?;
    RemoteUrl::parse(&url).with_context(|| format!("Unsupported URL format: {}", url))
}
