use anyhow::Context;
use anyhow::Result;
use anyhow::bail;
use async_trait::async_trait;
use serde::Deserialize;
use serde::Serialize;
use tracing::info;
use tracing::instrument;
use url::Url;

use super::ProviderKind;
use super::VcsProvider;
use super::origin_remote;
use crate::config::Config;
use crate::ops::git::GitOps;
use crate::ops::http::Auth;
use crate::ops::http::CurlClient;
use crate::ops::http::HttpOps;
use crate::parent::resolve_parent_or;

const BITBUCKET_API_URL: &str = "https://api.bitbucket.org/2.0";

// -----------------------------------------------------------------------------
// Types

/// Pull requests on Bitbucket Cloud.
pub struct BitbucketProvider<'a> {
    git: &'a dyn GitOps,
    http: Box<dyn HttpOps>,
    username: Option<String>,
    app_password: Option<String>,
    default_branch: String,
    api_url: String,
}

#[derive(Debug, Deserialize)]
struct User {
    username: String,
}

#[derive(Debug, Deserialize)]
struct Page<T> {
    values: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct PullRequest {
    id: u64,
    links: Links,
}

#[derive(Debug, Deserialize)]
struct Links {
    html: Option<Href>,
}

#[derive(Debug, Deserialize)]
struct Href {
    href: String,
}

impl PullRequest {
    fn html_url(&self) -> Result<String> {
        self.links
            .html
            .as_ref()
            .map(|html| html.href.clone())
            .context("Pull request URL not available.")
    }
}

#[derive(Debug, Serialize)]
struct BranchRef<'r> {
    branch: BranchName<'r>,
}

#[derive(Debug, Serialize)]
struct BranchName<'r> {
    name: &'r str,
}

#[derive(Debug, Serialize)]
struct CreatePullRequest<'r> {
    title: &'r str,
    description: &'r str,
    source: BranchRef<'r>,
    destination: BranchRef<'r>,
    close_source_branch: bool,
}

impl<'r> CreatePullRequest<'r> {
    fn new(head_branch: &'r str, base_branch: &'r str, title: &'r str, body: &'r str) -> Self {
        Self {
            title,
            description: body,
            source: BranchRef {
                branch: BranchName { name: head_branch },
            },
            destination: BranchRef {
                branch: BranchName { name: base_branch },
            },
            close_source_branch: true,
        }
    }
}

#[derive(Debug, Serialize)]
struct UpdatePullRequest<'r> {
    title: &'r str,
    description: &'r str,
}

// -----------------------------------------------------------------------------
// BitbucketProvider impl

impl<'a> BitbucketProvider<'a> {
    pub fn new(
        git: &'a dyn GitOps,
        http: Box<dyn HttpOps>,
        username: Option<String>,
        app_password: Option<String>,
        default_branch: String,
    ) -> Self {
        Self {
            git,
            http,
            username,
            app_password,
            default_branch,
            api_url: BITBUCKET_API_URL.to_string(),
        }
    }

    pub fn from_config(config: &Config, git: &'a dyn GitOps) -> Self {
        let http = CurlClient::new(
            Auth::Basic {
                username: config.bitbucket_username.clone().unwrap_or_default(),
                password: config.bitbucket_app_password.clone().unwrap_or_default(),
            },
            "application/json",
        );
        Self::new(
            git,
            Box::new(http),
            config.bitbucket_username.clone(),
            config.bitbucket_app_password.clone(),
            config.default_branch.clone(),
        )
    }

    fn pull_requests_url(&self, workspace: &str, repo: &str) -> String {
        format!(
            "{}/repositories/{}/{}/pullrequests",
            self.api_url, workspace, repo
        )
    }

    /// First open pull request from `head` into `base`, if any.
    async fn find_open_pull_request(
        &self,
        workspace: &str,
        repo: &str,
        head: &str,
        base: &str,
    ) -> Result<Option<PullRequest>> {
        let query = format!(
            "source.branch.name=\"{}\" AND destination.branch.name=\"{}\"",
            head, base
        );
        let url = Url::parse_with_params(
            &self.pull_requests_url(workspace, repo),
            &[("state", "OPEN"), ("q", &query)],
        )?;

        let response = self.http.get(url.as_str()).await?;
        let page: Page<PullRequest> = serde_json::from_str(&response)?;
        Ok(page.values.into_iter().next())
    }
}

#[async_trait(?Send)]
impl VcsProvider for BitbucketProvider<'_> {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Bitbucket
    }

    fn validate_environment(&self) -> Result<()> {
        if self.username.is_none() || self.app_password.is_none() {
            bail!(
                "BITBUCKET_USERNAME and BITBUCKET_APP_PASSWORD environment variables are not set."
            );
        }
        Ok(())
    }

    #[instrument(skip_all)]
    async fn get_username(&self) -> Result<String> {
        let response = self
            .http
            .get(&format!("{}/user", self.api_url))
            .await
            .context("Error fetching Bitbucket username")?;
        let user: User = serde_json::from_str(&response)?;
        Ok(user.username)
    }

    #[instrument(skip(self, title, body))]
    async fn create_or_update_pull_request(
        &self,
        head_branch: &str,
        title: &str,
        body: &str,
    ) -> Result<String> {
        let remote = origin_remote(self.git).await?;
        let base_branch = resolve_parent_or(self.git, &self.default_branch).await?;
        let pull_requests_url = self.pull_requests_url(&remote.owner, &remote.repo);

        if let Some(existing) = self
            .find_open_pull_request(&remote.owner, &remote.repo, head_branch, &base_branch)
            .await?
        {
            info!("Pull request already exists: #{}", existing.id);

            let url = format!("{}/{}", pull_requests_url, existing.id);
            let request_body = UpdatePullRequest {
                title,
                description: body,
            };
            let json_data = serde_json::to_string(&request_body)?;
            let response = self.http.put(&url, &json_data).await?;
            let pr: PullRequest = serde_json::from_str(&response)?;
            let html_url = pr.html_url()?;

            info!("Pull request updated: {}", html_url);
            return Ok(html_url);
        }

        let request_body = CreatePullRequest::new(head_branch, &base_branch, title, body);
        let json_data = serde_json::to_string(&request_body)?;
        let response = self
            .http
            .post(&pull_requests_url, &json_data)
            .await
            .context("Failed to create pull request")?;
        let pr: PullRequest = serde_json::from_str(&response)?;
        let html_url = pr.html_url()?;

        info!("Pull request created: {}", html_url);
        Ok(html_url)
    }
}
