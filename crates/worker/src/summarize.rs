// crates/worker/src/summarize.rs
//! Summarization collaborator seam.
//!
//! The worker treats the summarizer as an external service that may fail or
//! time out; the `turn_summary` handler always has a truncation fallback.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;

/// User messages at or below this length become the turn title verbatim;
/// the same bound clips the truncation fallback.
pub const TURN_TITLE_MAX: usize = 80;

/// Transcript text sent to the collaborator is clipped to this many chars.
const SUMMARIZE_INPUT_MAX: usize = 4000;

const DEFAULT_ENDPOINT: &str = "https://api.anthropic.com/v1/messages";

const TITLE_SYSTEM_PROMPT: &str = "You title coding-assistant conversation turns. \
Reply with a single short title (under 10 words) for the user's request. \
No quotes, no trailing punctuation.";

#[derive(Debug, Error)]
pub enum SummarizeError {
    #[error("summarizer request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("summarizer returned status {0}")]
    Status(u16),

    #[error("summarizer returned no content")]
    Empty,

    #[error("summarizer disabled")]
    Disabled,
}

/// External summarization collaborator: turn text in, short title out.
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, text: &str) -> Result<String, SummarizeError>;
}

/// Always-failing summarizer for keyless/offline operation; callers fall
/// back to truncation.
#[derive(Debug, Default)]
pub struct DisabledSummarizer;

#[async_trait]
impl Summarizer for DisabledSummarizer {
    async fn summarize(&self, _text: &str) -> Result<String, SummarizeError> {
        Err(SummarizeError::Disabled)
    }
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: String,
}

/// Anthropic-style messages API client.
pub struct HttpSummarizer {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
}

impl HttpSummarizer {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }

    /// Point at a different endpoint (tests, proxies).
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

#[async_trait]
impl Summarizer for HttpSummarizer {
    async fn summarize(&self, text: &str) -> Result<String, SummarizeError> {
        let clipped: String = text.chars().take(SUMMARIZE_INPUT_MAX).collect();
        let response = self
            .client
            .post(&self.endpoint)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .json(&json!({
                "model": self.model,
                "max_tokens": 64,
                "system": TITLE_SYSTEM_PROMPT,
                "messages": [{"role": "user", "content": clipped}],
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SummarizeError::Status(response.status().as_u16()));
        }

        let body: MessagesResponse = response.json().await?;
        let title = body
            .content
            .first()
            .map(|b| b.text.trim().to_string())
            .unwrap_or_default();
        if title.is_empty() {
            return Err(SummarizeError::Empty);
        }
        Ok(title)
    }
}

/// Char-safe truncation used as the summarizer fallback.
pub fn truncate_title(text: &str, max_chars: usize) -> String {
    let trimmed = text.trim();
    if trimmed.chars().count() <= max_chars {
        return trimmed.to_string();
    }
    let clipped: String = trimmed.chars().take(max_chars.saturating_sub(3)).collect();
    format!("{}...", clipped.trim_end())
}
