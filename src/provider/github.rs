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

const GITHUB_API_URL: &str = "https://api.github.com";

// -----------------------------------------------------------------------------
// Types

/// Pull requests on GitHub, via the REST API.
pub struct GithubProvider<'a> {
    git: &'a dyn GitOps,
    http: Box<dyn HttpOps>,
    token: Option<String>,
    default_branch: String,
    api_url: String,
}

#[derive(Debug, Deserialize)]
struct User {
    login: String,
}

#[derive(Debug, Deserialize)]
struct PullRequest {
    number: u64,
    html_url: String,
}

#[derive(Debug, Serialize)]
struct CreatePullRequest<'r> {
    title: &'r str,
    body: &'r str,
    head: &'r str,
    base: &'r str,
}

#[derive(Debug, Serialize)]
struct UpdatePullRequest<'r> {
    title: &'r str,
    body: &'r str,
}

// -----------------------------------------------------------------------------
// GithubProvider impl

impl<'a> GithubProvider<'a> {
    pub fn new(
        git: &'a dyn GitOps,
        http: Box<dyn HttpOps>,
        token: Option<String>,
        default_branch: String,
    ) -> Self {
        Self {
            git,
            http,
            token,
            default_branch,
            api_url: GITHUB_API_URL.to_string(),
        }
    }

    pub fn from_config(config: &Config, git: &'a dyn GitOps) -> Self {
        let token = config.github_token.clone();
        let http = CurlClient::new(
            Auth::Bearer(token.clone().unwrap_or_default()),
            "application/vnd.github+json",
        );
        Self::new(git, Box::new(http), token, config.default_branch.clone())
    }

    /// First open pull request from `owner:head` into `base`, if any.
    async fn find_open_pull_request(
        &self,
        owner: &str,
        repo: &str,
        head: &str,
        base: &str,
    ) -> Result<Option<PullRequest>> {
        let url = Url::parse_with_params(
            &format!("{}/repos/{}/{}/pulls", self.api_url, owner, repo),
            &[
                ("state", "open"),
                ("base", base),
                ("head", &format!("{}:{}", owner, head)),
            ],
        )?;

        let response = self.http.get(url.as_str()).await?;
        let prs: Vec<PullRequest> = serde_json::from_str(&response)?;
        Ok(prs.into_iter().next())
    }
}

#[async_trait(?Send)]
impl VcsProvider for GithubProvider<'_> {
    fn kind(&self) -> ProviderKind {
        ProviderKind::GitHub
    }

    fn validate_environment(&self) -> Result<()> {
        if self.token.is_none() {
            bail!("GITHUB_TOKEN environment variable is not set.");
        }
        Ok(())
    }

    #[instrument(skip_all)]
    async fn get_username(&self) -> Result<String> {
        let response = self
            .http
            .get(&format!("{}/user", self.api_url))
            .await
            .context("Error fetching GitHub username")?;
        let user: User = serde_json::from_str(&response)?;
        Ok(user.login)
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

        if let Some(existing) = self
            .find_open_pull_request(&remote.owner, &remote.repo, head_branch, &base_branch)
            .await?
        {
            info!("Pull request already exists: {}", existing.html_url);

            let url = format!(
                "{}/repos/{}/{}/pulls/{}",
                self.api_url, remote.owner, remote.repo, existing.number
            );
            let request_body = UpdatePullRequest { title, body };
            let json_data = serde_json::to_string(&request_body)?;
            let response = self.http.patch(&url, &json_data).await?;
            let pr: PullRequest = serde_json::from_str(&response)?;

            info!("Pull request updated: {}", pr.html_url);
            return Ok(pr.html_url);
        }

        let url = format!(
            "{}/repos/{}/{}/pulls",
            self.api_url, remote.owner, remote.repo
        );
        let request_body = CreatePullRequest {
            title,
            body,
            head: head_branch,
            base: &base_branch,
        };
        let json_data = serde_json::to_string(&request_body)?;
        let response = self.http.post(&url, &json_data).await?;
        let pr: PullRequest = serde_json::from_str(&response)?;

        info!("Pull request created: {}", pr.html_url);
        Ok(pr.html_url)
    }
}

#[cfg(test)]
mod tests {
    use mockall::predicate::eq;

    use super::*;
    use crate::ops::git::CommitId;
    use crate::ops::git::MockGitOps;
    use crate::ops::http::MockHttpOps;

    /// Repository on `jdoe/feature` forked from `develop`.
    fn mock_git() -> MockGitOps {
        let mut git = MockGitOps::new();
        git.expect_remote_url()
            .returning(|| Ok(Some("git@github.com:acme/widgets.git".to_string())));
        git.expect_current_branch()
            .returning(|| Ok("jdoe/feature".to_string()));
        git.expect_local_branches().returning(|| {
            Ok(vec![
                "develop".to_string(),
                "jdoe/feature".to_string(),
                "main".to_string(),
            ])
        });
        git.expect_merge_base()
            .returning(|_, other| Ok(CommitId(other.to_string())));
        git.expect_commit_time()
            .returning(|commit| Ok(if commit.0 == "develop" { 200 } else { 100 }));
        git
    }

    const LIST_URL: &str = "https://api.github.com/repos/acme/widgets/pulls?state=open&base=develop&head=acme%3Ajdoe%2Ffeature";

    #[tokio::test]
    async fn test_get_username() {
        let git = MockGitOps::new();
        let mut http = MockHttpOps::new();
        http.expect_get()
            .with(eq("https://api.github.com/user"))
            .returning(|_| Ok(r#"{"login":"jdoe","id":1}"#.to_string()));

        let provider = GithubProvider::new(&git, Box::new(http), Some("t".into()), "main".into());
        assert_eq!(provider.get_username().await.unwrap(), "jdoe");
    }

    #[tokio::test]
    async fn test_get_username_bad_credentials() {
        let git = MockGitOps::new();
        let mut http = MockHttpOps::new();
        http.expect_get()
            .returning(|_| Err(anyhow::anyhow!("API error (401): Bad credentials")));

        let provider = GithubProvider::new(&git, Box::new(http), Some("t".into()), "main".into());
        let err = provider.get_username().await.unwrap_err();
        assert!(format!("{:#}", err).contains("Bad credentials"));
    }

    #[test]
    fn test_validate_environment() {
        let git = MockGitOps::new();
        let provider =
            GithubProvider::new(&git, Box::new(MockHttpOps::new()), None, "main".into());
        assert!(provider.validate_environment().is_err());

        let provider =
            GithubProvider::new(&git, Box::new(MockHttpOps::new()), Some("t".into()), "main".into());
        assert!(provider.validate_environment().is_ok());
    }

    #[tokio::test]
    async fn test_creates_pull_request_against_parent() {
        let git = mock_git();
        let mut http = MockHttpOps::new();
        http.expect_get()
            .with(eq(LIST_URL))
            .returning(|_| Ok("[]".to_string()));
        http.expect_post()
            .withf(|url, json| {
                let payload: serde_json::Value = serde_json::from_str(json).unwrap();
                url == "https://api.github.com/repos/acme/widgets/pulls"
                    && payload
                        == serde_json::json!({
                            "title": "Add widgets",
                            "body": "Body",
                            "head": "jdoe/feature",
                            "base": "develop",
                        })
            })
            .times(1)
            .returning(|_, _| {
                Ok(r#"{"number":7,"html_url":"https://github.com/acme/widgets/pull/7"}"#.to_string())
            });
        http.expect_patch().never();

        let provider = GithubProvider::new(&git, Box::new(http), Some("t".into()), "main".into());
        let url = provider
            .create_or_update_pull_request("jdoe/feature", "Add widgets", "Body")
            .await
            .unwrap();
        assert_eq!(url, "https://github.com/acme/widgets/pull/7");
    }

    #[tokio::test]
    async fn test_updates_existing_pull_request_idempotently() {
        let git = mock_git();
        let mut http = MockHttpOps::new();
        http.expect_get().with(eq(LIST_URL)).times(2).returning(|_| {
            Ok(r#"[{"number":7,"html_url":"https://github.com/acme/widgets/pull/7","state":"open"}]"#
                .to_string())
        });
        http.expect_patch()
            .withf(|url, json| {
                url == "https://api.github.com/repos/acme/widgets/pulls/7"
                    && json == r#"{"title":"New title","body":"New body"}"#
            })
            .times(2)
            .returning(|_, _| {
                Ok(r#"{"number":7,"html_url":"https://github.com/acme/widgets/pull/7"}"#.to_string())
            });
        http.expect_post().never();

        let provider = GithubProvider::new(&git, Box::new(http), Some("t".into()), "main".into());
        let first = provider
            .create_or_update_pull_request("jdoe/feature", "New title", "New body")
            .await
            .unwrap();
        let second = provider
            .create_or_update_pull_request("jdoe/feature", "New title", "New body")
            .await
            .unwrap();
        assert_eq!(first, "https://github.com/acme/widgets/pull/7");
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_falls_back_to_default_branch() {
        let mut git = MockGitOps::new();
        git.expect_remote_url()
            .returning(|| Ok(Some("https://github.com/acme/widgets".to_string())));
        git.expect_current_branch()
            .returning(|| Ok("jdoe/feature".to_string()));
        git.expect_local_branches()
            .returning(|| Ok(vec!["jdoe/feature".to_string()]));

        let mut http = MockHttpOps::new();
        http.expect_get()
            .withf(|url| url.contains("base=trunk"))
            .returning(|_| Ok("[]".to_string()));
        http.expect_post()
            .withf(|_, json| json.contains(r#""base":"trunk""#))
            .returning(|_, _| {
                Ok(r#"{"number":1,"html_url":"https://github.com/acme/widgets/pull/1"}"#.to_string())
            });

        let provider = GithubProvider::new(&git, Box::new(http), Some("t".into()), "trunk".into());
        let url = provider
            .create_or_update_pull_request("jdoe/feature", "T", "B")
            .await
            .unwrap();
        assert_eq!(url, "https://github.com/acme/widgets/pull/1");
    }

    #[tokio::test]
    async fn test_create_failure_is_reported() {
        let git = mock_git();
        let mut http = MockHttpOps::new();
        http.expect_get().returning(|_| Ok("[]".to_string()));
        http.expect_post().returning(|_, _| {
            Err(anyhow::anyhow!(
                "API error (422): No commits between develop and jdoe/feature"
            ))
        });

        let provider = GithubProvider::new(&git, Box::new(http), Some("t".into()), "main".into());
        let err = provider
            .create_or_update_pull_request("jdoe/feature", "T", "B")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("No commits between"));
    }
}
