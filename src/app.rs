use anyhow::Context;
use anyhow::Result;
use colored::Colorize;
use tracing::warn;

use crate::browser::Browser;
use crate::config::Config;
use crate::diff::collect_diff;
use crate::ops::git::GitOps;
use crate::parent::resolve_parent_or;
use crate::prompt::compose_prompt;
use crate::prompt::load_template;
use crate::provider;
use crate::provider::VcsProvider;
use crate::review::Decision;
use crate::review::Reviewer;
use crate::suggest::Suggestion;
use crate::suggest::SuggestionSource;
use crate::sync::SyncOutcome;
use crate::sync::sync_and_commit;

const DESCRIBE_PROMPT: &str = "Describe the change in a few words; your editor opens next.";

/// How a run ended, when it did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Completed { pr_url: String },
    /// The user pressed 'x'.
    Aborted,
}

pub struct App {
    pub config: Config,
    pub git: Box<dyn GitOps>,
    pub llm: Box<dyn SuggestionSource>,
    pub reviewer: Box<dyn Reviewer>,
    pub browser: Box<dyn Browser>,
}

impl App {
    pub fn new(
        config: Config,
        git: Box<dyn GitOps>,
        llm: Box<dyn SuggestionSource>,
        reviewer: Box<dyn Reviewer>,
        browser: Box<dyn Browser>,
    ) -> Self {
        Self {
            config,
            git,
            llm,
            reviewer,
            browser,
        }
    }

    /// Draft, review and publish a pull request for the local changes.
    ///
    /// The hosting provider is selected from the `origin` remote and its
    /// credentials are checked before anything else happens.
    pub async fn run(&self, stdout: &mut impl std::io::Write) -> Result<Outcome> {
        let provider = provider::connect(&self.config, self.git.as_ref()).await?;
        self.run_with_provider(provider.as_ref(), stdout).await
    }

    pub async fn run_with_provider(
        &self,
        provider: &dyn VcsProvider,
        stdout: &mut impl std::io::Write,
    ) -> Result<Outcome> {
        let git = self.git.as_ref();
        let template = load_template(self.config.prompt_file.as_deref())?;

        let Decision::Accept(description) = self.reviewer.describe(DESCRIBE_PROMPT)? else {
            return Ok(Outcome::Aborted);
        };

        let base_branch = resolve_parent_or(git, &self.config.default_branch).await?;
        let diff = collect_diff(git, &base_branch)
            .await
            .context("Unable to collect the Git diff")?;
        let prompt = compose_prompt(&template, &description, &diff);

        writeln!(stdout, "Drafting suggestions...")?;
        let suggestion = self.llm.suggest(&prompt).await?;
        let username = provider.get_username().await?;
        let suggestion = Suggestion {
            branch_name: format!("{}/{}", username, suggestion.branch_name),
            ..suggestion
        };

        let Some(reviewed) = self.review_suggestion(suggestion)? else {
            return Ok(Outcome::Aborted);
        };
        print_summary(&reviewed, stdout)?;

        writeln!(stdout, "Executing commands...")?;
        let sync = sync_and_commit(
            git,
            &self.config.default_branch,
            &reviewed.branch_name,
            &reviewed.commit_message,
            stdout,
        )
        .await?;
        if sync == SyncOutcome::Failed {
            // The branch may not exist on the remote; the provider will say so
            warn!(
                "Git commands failed; continuing with the pull request for {}",
                reviewed.branch_name
            );
        }

        let pr_url = provider
            .create_or_update_pull_request(
                &reviewed.branch_name,
                &reviewed.pr_title,
                &reviewed.pr_body,
            )
            .await
            .context("Failed to create pull request")?;
        writeln!(stdout, "Pull request: {}", pr_url)?;

        match self.browser.open(&pr_url) {
            Ok(()) => writeln!(stdout, "Opened URL in default browser: {}", pr_url)?,
            Err(e) => writeln!(stdout, "Failed to open URL: {:#}", e)?,
        }

        Ok(Outcome::Completed { pr_url })
    }

    /// Let the user confirm or edit each field. `None` if they abort.
    fn review_suggestion(&self, suggestion: Suggestion) -> Result<Option<Suggestion>> {
        let review = |label: &str, value: &str| -> Result<Option<String>> {
            match self.reviewer.review(label, value)? {
                Decision::Accept(value) => Ok(Some(value)),
                Decision::Abort => Ok(None),
            }
        };

        let Some(branch_name) = review("Branch name", &suggestion.branch_name)? else {
            return Ok(None);
        };
        let Some(commit_message) = review("Commit message", &suggestion.commit_message)? else {
            return Ok(None);
        };
        let Some(pr_title) = review("PR title", &suggestion.pr_title)? else {
            return Ok(None);
        };
        let Some(pr_body) = review("PR body", &suggestion.pr_body)? else {
            return Ok(None);
        };

        Ok(Some(Suggestion {
            branch_name,
            commit_message,
            pr_title,
            pr_body,
        }))
    }
}

fn print_summary(suggestion: &Suggestion, stdout: &mut impl std::io::Write) -> Result<()> {
    writeln!(stdout, "\nCollected Information:\n")?;
    writeln!(stdout, "Branch Name:\n{}\n", suggestion.branch_name.blue())?;
    writeln!(stdout, "Commit Message:\n{}\n", suggestion.commit_message.green())?;
    writeln!(stdout, "PR Title:\n{}\n", suggestion.pr_title.cyan())?;
    writeln!(stdout, "PR Body:\n{}\n", suggestion.pr_body.yellow())?;
    Ok(())
}
