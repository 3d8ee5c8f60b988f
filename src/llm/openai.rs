//! OpenAI text generator.
//!
//! Implements the TextGenerator trait for OpenAI's chat completions API.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::error::{GeneratorError, QueryMendError, Result};
use crate::llm::{GenerationOptions, TextGenerator};

/// Default timeout for API requests.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// OpenAI API base URL.
const OPENAI_API_URL: &str = "https://api.openai.com/v1/chat/completions";

/// OpenAI client configuration.
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    /// API key for authentication.
    pub api_key: String,
    /// Model to use (e.g., "gpt-4o", "gpt-4o-mini").
    pub model: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
    /// Endpoint URL; overridable for compatible gateways.
    pub api_url: String,
}

impl OpenAiConfig {
    /// Creates a new config with the given API key and model.
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            api_url: OPENAI_API_URL.to_string(),
        }
    }

    /// Sets the request timeout.
    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    /// Sets the endpoint URL.
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into();
        self
    }
}

/// OpenAI text generator.
#[derive(Debug, Clone)]
pub struct OpenAiGenerator {
    config: OpenAiConfig,
    client: Client,
}

impl OpenAiGenerator {
    /// Creates a new OpenAI generator with the given configuration.
    pub fn new(config: OpenAiConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| QueryMendError::config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }

    /// Maps an API error response to a generator error.
    fn parse_error(status: reqwest::StatusCode, body: &str) -> GeneratorError {
        let detail = serde_json::from_str::<OpenAiErrorResponse>(body)
            .map(|r| r.error.message)
            .unwrap_or_else(|_| body.to_string());

        match status {
            reqwest::StatusCode::UNAUTHORIZED | reqwest::StatusCode::FORBIDDEN => {
                GeneratorError::InvalidCredentials(
                    "Authentication failed. Check your OPENAI_API_KEY.".to_string(),
                )
            }
            reqwest::StatusCode::TOO_MANY_REQUESTS => GeneratorError::RateLimited(format!(
                "Rate limited. Please wait and try again. {detail}"
            )),
            _ if detail.contains("content_policy") || detail.contains("content management") => {
                GeneratorError::ContentBlocked(detail)
            }
            _ => GeneratorError::Transport(format!("OpenAI API error ({}): {}", status, detail)),
        }
    }
}

/// Maps a request-level failure to a generator error.
pub(crate) fn map_request_error(provider: &str, e: reqwest::Error) -> GeneratorError {
    if e.is_timeout() {
        GeneratorError::Timeout(format!("{provider} request timed out"))
    } else if e.is_connect() {
        GeneratorError::Transport(format!(
            "Failed to connect to {provider}. Check your network."
        ))
    } else {
        GeneratorError::Transport(format!("{provider} request failed: {e}"))
    }
}

#[async_trait]
impl TextGenerator for OpenAiGenerator {
    async fn complete(
        &self,
        prompt: &str,
        options: &GenerationOptions,
    ) -> std::result::Result<String, GeneratorError> {
        let request = OpenAiRequest {
            model: self.config.model.clone(),
            messages: vec![OpenAiMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
            temperature: options.temperature,
            max_tokens: options.max_tokens,
        };

        debug!(model = %self.config.model, prompt_len = prompt.len(), "Sending OpenAI request");

        let response = self
            .client
            .post(&self.config.api_url)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| map_request_error("OpenAI", e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| GeneratorError::Transport(format!("Failed to read response: {}", e)))?;

        if !status.is_success() {
            return Err(Self::parse_error(status, &body));
        }

        let response: OpenAiResponse = serde_json::from_str(&body)
            .map_err(|e| GeneratorError::Transport(format!("Failed to parse response: {}", e)))?;

        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| GeneratorError::Transport("No response from OpenAI".to_string()))?;

        if choice.finish_reason.as_deref() == Some("content_filter") {
            return Err(GeneratorError::ContentBlocked(
                "Content blocked by safety filters. Try rephrasing your question.".to_string(),
            ));
        }

        choice
            .message
            .content
            .ok_or_else(|| GeneratorError::Transport("Empty response from OpenAI".to_string()))
    }
}

// OpenAI API types

#[derive(Debug, Serialize)]
struct OpenAiRequest {
    model: String,
    messages: Vec<OpenAiMessage>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct OpenAiMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiResponseMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiErrorResponse {
    error: OpenAiError,
}

#[derive(Debug, Deserialize)]
struct OpenAiError {
    message: String,
}
