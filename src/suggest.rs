use anyhow::Context;
use anyhow::Result;
use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use serde::Deserialize;
use serde::Serialize;
use tracing::instrument;

use crate::config::Config;
use crate::ops::http::Auth;
use crate::ops::http::CurlClient;
use crate::ops::http::HttpOps;

/// Drafted values for a change, all editable during review.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Suggestion {
    pub branch_name: String,
    pub commit_message: String,
    pub pr_title: String,
    pub pr_body: String,
}

/// Something that drafts a [`Suggestion`] from a prompt.
#[cfg_attr(test, automock)]
#[async_trait(?Send)]
pub trait SuggestionSource {
    async fn suggest(&self, prompt: &str) -> Result<Suggestion>;
}

// -----------------------------------------------------------------------------
// OpenAiClient

/// Chat completions client for OpenAI-compatible endpoints.
pub struct OpenAiClient {
    http: Box<dyn HttpOps>,
    base_url: String,
    model: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'r> {
    model: &'r str,
    messages: Vec<ChatMessage<'r>>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'r> {
    role: &'r str,
    content: &'r str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ReplyMessage,
}

#[derive(Debug, Deserialize)]
struct ReplyMessage {
    content: Option<String>,
}

impl OpenAiClient {
    pub fn new(http: Box<dyn HttpOps>, base_url: &str, model: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
        }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let api_key = config
            .openai_api_key
            .clone()
            .context("OPENAI_API_KEY environment variable is not set.")?;
        let http = CurlClient::new(Auth::Bearer(api_key), "application/json");
        Ok(Self::new(
            Box::new(http),
            &config.openai_base_url,
            &config.openai_model,
        ))
    }
}

#[async_trait(?Send)]
impl SuggestionSource for OpenAiClient {
    #[instrument(skip_all)]
    async fn suggest(&self, prompt: &str) -> Result<Suggestion> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
        };
        let json_data = serde_json::to_string(&request)?;
        let url = format!("{}/chat/completions", self.base_url);

        let response = self
            .http
            .post(&url, &json_data)
            .await
            .context("OpenAI API error")?;
        let response: ChatResponse =
            serde_json::from_str(&response).context("Unexpected OpenAI API response")?;
        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .context("OpenAI API returned no message")?;

        parse_reply(&content)
    }
}

/// Parse a model reply as a [`Suggestion`], ignoring markdown code fences.
pub fn parse_reply(reply: &str) -> Result<Suggestion> {
    let json = reply.replace("```json", "").replace("```", "");
    serde_json::from_str(json.trim())
        .with_context(|| format!("Model reply is not the expected JSON object: {}", reply))
}
