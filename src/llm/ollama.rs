//! Ollama text generator.
//!
//! Talks to a local Ollama server through the non-streaming `/api/chat`
//! endpoint. No API key is needed.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::error::{GeneratorError, QueryMendError, Result};
use crate::llm::openai::map_request_error;
use crate::llm::{GenerationOptions, TextGenerator};

/// Local models can be slow to load on first use.
const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Default Ollama API URL.
const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

/// Default model.
pub const DEFAULT_OLLAMA_MODEL: &str = "llama3.2:3b";

/// Ollama client configuration.
#[derive(Debug, Clone)]
pub struct OllamaConfig {
    pub base_url: String,
    pub model: String,
    pub timeout_secs: u64,
}

impl OllamaConfig {
    /// Creates a new config with the given model.
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_OLLAMA_URL.to_string(),
            model: model.into(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    /// Sets the base URL.
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Sets the request timeout.
    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self::new(DEFAULT_OLLAMA_MODEL)
    }
}

/// Ollama text generator.
#[derive(Debug, Clone)]
pub struct OllamaGenerator {
    config: OllamaConfig,
    client: Client,
}

impl OllamaGenerator {
    /// Creates a new Ollama generator with the given configuration.
    pub fn new(config: OllamaConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| QueryMendError::config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }

    /// Returns the chat API endpoint URL.
    fn chat_url(&self) -> String {
        format!("{}/api/chat", self.config.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl TextGenerator for OllamaGenerator {
    async fn complete(
        &self,
        prompt: &str,
        options: &GenerationOptions,
    ) -> std::result::Result<String, GeneratorError> {
        let request = OllamaRequest {
            model: self.config.model.clone(),
            messages: vec![OllamaMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
            stream: false,
            options: OllamaOptions {
                temperature: options.temperature,
                num_predict: options.max_tokens,
            },
        };

        debug!(model = %self.config.model, prompt_len = prompt.len(), "Sending Ollama request");

        let response = self
            .client
            .post(self.chat_url())
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    GeneratorError::Transport(format!(
                        "Cannot reach Ollama at {}. Is `ollama serve` running?",
                        self.config.base_url
                    ))
                } else {
                    map_request_error("Ollama", e)
                }
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| GeneratorError::Transport(format!("Failed to read response: {e}")))?;

        if !status.is_success() {
            return Err(self.status_error(status, &body));
        }

        let reply: OllamaResponse = serde_json::from_str(&body)
            .map_err(|e| GeneratorError::Transport(format!("Unexpected Ollama payload: {e}")))?;

        if reply.message.content.trim().is_empty() {
            return Err(GeneratorError::Transport(
                "Ollama returned an empty message".to_string(),
            ));
        }
        Ok(reply.message.content)
    }
}

impl OllamaGenerator {
    /// Classifies a non-success HTTP status.
    fn status_error(&self, status: StatusCode, body: &str) -> GeneratorError {
        match status {
            StatusCode::TOO_MANY_REQUESTS => GeneratorError::RateLimited(body.to_string()),
            StatusCode::NOT_FOUND => GeneratorError::Transport(format!(
                "Model '{}' is not available locally. Try: ollama pull {}",
                self.config.model, self.config.model
            )),
            _ => GeneratorError::Transport(format!("Ollama returned {status}: {body}")),
        }
    }
}

// Ollama API types

#[derive(Debug, Serialize)]
struct OllamaRequest {
    model: String,
    messages: Vec<OllamaMessage>,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Debug, Serialize, Deserialize)]
struct OllamaMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct OllamaResponse {
    message: OllamaMessage,
}
