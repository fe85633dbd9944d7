use std::path::PathBuf;

use anyhow::Result;
use anyhow::bail;

pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o";
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_EDITOR: &str = "vi";
pub const DEFAULT_BRANCH: &str = "main";

/// Process-wide settings, read from the environment once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub openai_api_key: Option<String>,
    pub openai_model: String,
    pub openai_base_url: String,
    pub github_token: Option<String>,
    pub bitbucket_username: Option<String>,
    pub bitbucket_app_password: Option<String>,
    /// Editor used to amend suggestions
    pub editor: String,
    /// Branch that new work is branched from, and the fallback PR base
    pub default_branch: String,
    /// Prompt template overriding the bundled one
    pub prompt_file: Option<PathBuf>,
}

impl Config {
    /// Load config from the process environment
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from an arbitrary variable lookup. Empty values are
    /// treated as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        Self {
            openai_api_key: get("OPENAI_API_KEY"),
            openai_model: get("OPENAI_MODEL").unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_string()),
            openai_base_url: get("OPENAI_BASE_URL")
                .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string()),
            github_token: get("GITHUB_TOKEN"),
            bitbucket_username: get("BITBUCKET_USERNAME"),
            bitbucket_app_password: get("BITBUCKET_APP_PASSWORD"),
            editor: get("EDITOR").unwrap_or_else(|| DEFAULT_EDITOR.to_string()),
            default_branch: get("PRDRAFT_DEFAULT_BRANCH")
                .unwrap_or_else(|| DEFAULT_BRANCH.to_string()),
            prompt_file: get("PRDRAFT_PROMPT_FILE").map(PathBuf::from),
        }
    }

    /// Check settings every run needs, regardless of hosting provider.
    pub fn validate(&self) -> Result<()> {
        if self.openai_api_key.is_none() {
            bail!("OPENAI_API_KEY environment variable is not set.");
        }
        Ok(())
    }

    /// Fully populated config for tests
    #[cfg(test)]
    pub fn for_tests() -> Self {
        Self {
            openai_api_key: Some("sk-test".to_string()),
            openai_model: DEFAULT_OPENAI_MODEL.to_string(),
            openai_base_url: "https://llm.test/v1".to_string(),
            github_token: Some("ghp_test".to_string()),
            bitbucket_username: Some("bb-user".to_string()),
            bitbucket_app_password: Some("bb-pass".to_string()),
            editor: DEFAULT_EDITOR.to_string(),
            default_branch: DEFAULT_BRANCH.to_string(),
            prompt_file: None,
        }
    }
}
