use std::io::Write as _;
use std::process::Stdio;

use anyhow::Context;
use anyhow::Result;
use anyhow::bail;
use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use serde_json::Value;
use tokio::io::AsyncWriteExt as _;
use tokio::process::Command;
use tracing::debug;

const USER_AGENT: &str = "User-Agent: prdraft-cli";

// -----------------------------------------------------------------------------
// HttpOps trait

/// JSON-over-HTTP requests. Bodies are passed and returned as raw JSON text.
#[cfg_attr(test, automock)]
#[async_trait(?Send)]
pub trait HttpOps {
    async fn get(&self, url: &str) -> Result<String>;
    async fn post(&self, url: &str, json_data: &str) -> Result<String>;
    async fn put(&self, url: &str, json_data: &str) -> Result<String>;
    async fn patch(&self, url: &str, json_data: &str) -> Result<String>;
}

// -----------------------------------------------------------------------------
// CurlClient

/// How requests authenticate.
#[derive(Clone)]
pub enum Auth {
    /// `Authorization: Bearer <token>`
    Bearer(String),
    /// HTTP basic auth
    Basic { username: String, password: String },
}

/// HTTP client using curl for making API requests
pub struct CurlClient {
    auth: Auth,
    accept: String,
}

impl CurlClient {
    pub fn new(auth: Auth, accept: &str) -> Self {
        Self {
            auth,
            accept: accept.to_string(),
        }
    }

    /// Run one request.
    ///
    /// Credentials go to curl through a private config file and the body
    /// through stdin, so neither shows up in the process arguments and the
    /// body is not subject to the per-argument size limit.
    async fn request(&self, method: &str, url: &str, json_data: Option<&str>) -> Result<String> {
        debug!(method, url, "curl request");

        let mut config = tempfile::Builder::new()
            .prefix("prdraft-curl-")
            .tempfile()
            .context("Failed to create curl config file")?;
        config.write_all(auth_config(&self.auth).as_bytes())?;
        config.flush()?;

        let mut args: Vec<String> = vec![
            "-sS".into(),
            "-w".into(),
            "\n%{http_code}".into(),
            "-X".into(),
            method.into(),
            "-H".into(),
            format!("Accept: {}", self.accept),
            "-H".into(),
            USER_AGENT.into(),
            "-K".into(),
            config.path().to_string_lossy().into_owned(),
        ];

        if json_data.is_some() {
            args.push("-H".into());
            args.push("Content-Type: application/json".into());
            args.push("--data-binary".into());
            args.push("@-".into());
        }

        args.push(url.into());

        let mut child = Command::new("curl")
            .args(&args)
            .stdin(if json_data.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .context("Failed to execute curl command")?;

        if let (Some(json_data), Some(mut stdin)) = (json_data, child.stdin.take()) {
            // curl reports its own error if it exits before reading the body
            if let Err(e) = stdin.write_all(json_data.as_bytes()).await {
                if e.kind() != std::io::ErrorKind::BrokenPipe {
                    return Err(e).context("Failed to send request body to curl");
                }
            }
        }

        let output = child
            .wait_with_output()
            .await
            .context("Failed to execute curl command")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stderr = stderr.trim();
            if stderr.is_empty() {
                bail!("curl command failed with {}", output.status);
            }
            bail!("curl command failed: {}", stderr);
        }

        parse_response(output.stdout)
    }
}

/// curl config lines carrying the credentials.
fn auth_config(auth: &Auth) -> String {
    match auth {
        Auth::Bearer(token) => format!(
            "header = {}\n",
            config_quote(&format!("Authorization: Bearer {}", token))
        ),
        Auth::Basic { username, password } => format!(
            "user = {}\n",
            config_quote(&format!("{}:{}", username, password))
        ),
    }
}

/// Quote a value for a curl config file.
fn config_quote(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('"');
    for c in value.chars() {
        match c {
            '\\' => quoted.push_str("\\\\"),
            '"' => quoted.push_str("\\\""),
            '\n' => quoted.push_str("\\n"),
            '\r' => quoted.push_str("\\r"),
            '\t' => quoted.push_str("\\t"),
            c => quoted.push(c),
        }
    }
    quoted.push('"');
    quoted
}

#[async_trait(?Send)]
impl HttpOps for CurlClient {
    async fn get(&self, url: &str) -> Result<String> {
        self.request("GET", url, None).await
    }

    async fn post(&self, url: &str, json_data: &str) -> Result<String> {
        self.request("POST", url, Some(json_data)).await
    }

    async fn put(&self, url: &str, json_data: &str) -> Result<String> {
        self.request("PUT", url, Some(json_data)).await
    }

    async fn patch(&self, url: &str, json_data: &str) -> Result<String> {
        self.request("PATCH", url, Some(json_data)).await
    }
}

/// Parse curl response with status code appended
fn parse_response(stdout: Vec<u8>) -> Result<String> {
    let output_str = String::from_utf8(stdout)?;
    let (response, status_code) = match output_str.rsplit_once('\n') {
        Some((body, code)) => (body.to_string(), code.trim().parse::<u16>().unwrap_or(0)),
        None => (String::new(), output_str.trim().parse::<u16>().unwrap_or(0)),
    };

    if status_code == 0 {
        bail!("No HTTP response received");
    }

    if status_code >= 400 {
        if let Some(message) = error_message(&response) {
            bail!("API error ({}): {}", status_code, message);
        }
        bail!(
            "API request failed with status {}: {}",
            status_code,
            response
        );
    }

    Ok(response)
}

/// Pull a human readable message out of an error body.
///
/// GitHub uses `{"message": ...}`, Bitbucket and OpenAI use
/// `{"error": {"message": ...}}`.
fn error_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    value
        .get("message")
        .or_else(|| value.get("error").and_then(|e| e.get("message")))
        .and_then(Value::as_str)
        .map(str::to_string)
}
