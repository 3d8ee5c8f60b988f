//! Text generation backends for QueryMend.
//!
//! The workflow treats the generator as an opaque, fallible text function.
//! This module defines that capability and its implementations.

pub mod factory;
pub mod gemini;
pub mod mock;
pub mod ollama;
pub mod openai;
pub mod parser;
pub mod prompt;
pub mod retry;

pub use factory::create_generator;
pub use gemini::{GeminiConfig, GeminiGenerator};
pub use mock::ScriptedGenerator;
pub use ollama::{OllamaConfig, OllamaGenerator};
pub use openai::{OpenAiConfig, OpenAiGenerator};
pub use parser::parse_sql;
pub use prompt::{debug_prompt, generation_prompt};
pub use retry::{RetryPolicy, RetryingGenerator};

use async_trait::async_trait;
use std::str::FromStr;

use crate::error::GeneratorError;

/// Sampling options passed with every completion request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationOptions {
    /// Sampling temperature; low values keep SQL output stable.
    pub temperature: f32,
    /// Upper bound on generated tokens.
    pub max_tokens: u32,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            temperature: 0.1,
            max_tokens: 2000,
        }
    }
}

/// Trait for backends that turn a prompt into text.
///
/// Implementations must be thread-safe (Send + Sync) to support async operations.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Generates a completion for the given prompt.
    async fn complete(
        &self,
        prompt: &str,
        options: &GenerationOptions,
    ) -> std::result::Result<String, GeneratorError>;
}

#[async_trait]
impl<T: TextGenerator + ?Sized> TextGenerator for Box<T> {
    async fn complete(
        &self,
        prompt: &str,
        options: &GenerationOptions,
    ) -> std::result::Result<String, GeneratorError> {
        (**self).complete(prompt, options).await
    }
}

/// LLM provider type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LlmProvider {
    /// Google Gemini (generateContent API)
    #[default]
    Gemini,
    /// OpenAI chat completions
    OpenAi,
    /// Local Ollama instance
    Ollama,
    /// Mock generator for testing (no API key required)
    Mock,
}

impl LlmProvider {
    /// Returns the provider as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gemini => "gemini",
            Self::OpenAi => "openai",
            Self::Ollama => "ollama",
            Self::Mock => "mock",
        }
    }
}

impl FromStr for LlmProvider {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "gemini" => Ok(Self::Gemini),
            "openai" => Ok(Self::OpenAi),
            "ollama" => Ok(Self::Ollama),
            "mock" => Ok(Self::Mock),
            _ => Err(format!("Unknown LLM provider: {}", s)),
        }
    }
}

impl std::fmt::Display for LlmProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
