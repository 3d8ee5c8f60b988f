//! Text generator factory.
//!
//! Centralizes provider-specific logic for creating generators from config.

use tracing::debug;

use crate::config::LlmConfig;
use crate::error::{QueryMendError, Result};
use crate::llm::gemini::DEFAULT_GEMINI_MODEL;
use crate::llm::ollama::DEFAULT_OLLAMA_MODEL;
use crate::llm::{
    GeminiConfig, GeminiGenerator, LlmProvider, OllamaConfig, OllamaGenerator, OpenAiConfig,
    OpenAiGenerator, RetryPolicy, RetryingGenerator, ScriptedGenerator, TextGenerator,
};

/// Default OpenAI model.
const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";

/// SQL returned by the mock provider for every prompt.
const MOCK_SQL: &str = "SELECT 1 AS result";

/// Creates a generator for the configured provider, wrapped in retry handling.
///
/// For providers that require an API key (Gemini, OpenAI), the key is resolved in order:
/// 1. Environment variable (`GEMINI_API_KEY` or `OPENAI_API_KEY`)
/// 2. `api_key` from the `[llm]` config section
pub fn create_generator(config: &LlmConfig) -> Result<Box<dyn TextGenerator>> {
    let provider = config.provider()?;
    let policy = RetryPolicy::new(config.max_retries, config.retry_base_delay());
    debug!(provider = %provider, max_retries = config.max_retries, "Creating generator");

    match provider {
        LlmProvider::Gemini => {
            let key = resolve_api_key(
                std::env::var("GEMINI_API_KEY").ok(),
                config.api_key.clone(),
                "GEMINI_API_KEY",
            )?;
            let model = config.model.as_deref().unwrap_or(DEFAULT_GEMINI_MODEL);
            let generator = GeminiGenerator::new(
                GeminiConfig::new(key, model).with_timeout(config.timeout_secs),
            )?;
            Ok(Box::new(RetryingGenerator::new(generator, policy)))
        }
        LlmProvider::OpenAi => {
            let key = resolve_api_key(
                std::env::var("OPENAI_API_KEY").ok(),
                config.api_key.clone(),
                "OPENAI_API_KEY",
            )?;
            let model = config.model.as_deref().unwrap_or(DEFAULT_OPENAI_MODEL);
            let mut openai = OpenAiConfig::new(key, model).with_timeout(config.timeout_secs);
            if let Some(url) = &config.base_url {
                openai = openai.with_url(url.clone());
            }
            Ok(Box::new(RetryingGenerator::new(
                OpenAiGenerator::new(openai)?,
                policy,
            )))
        }
        LlmProvider::Ollama => {
            let model = config.model.as_deref().unwrap_or(DEFAULT_OLLAMA_MODEL);
            let mut ollama = OllamaConfig::new(model).with_timeout(config.timeout_secs);
            if let Some(url) = &config.base_url {
                ollama = ollama.with_url(url.clone());
            }
            Ok(Box::new(RetryingGenerator::new(
                OllamaGenerator::new(ollama)?,
                policy,
            )))
        }
        LlmProvider::Mock => Ok(Box::new(ScriptedGenerator::always_sql(MOCK_SQL))),
    }
}

/// Picks the environment key over the configured one.
fn resolve_api_key(
    from_env: Option<String>,
    from_config: Option<String>,
    env_var: &str,
) -> Result<String> {
    from_env
        .filter(|k| !k.trim().is_empty())
        .or_else(|| from_config.filter(|k| !k.trim().is_empty()))
        .ok_or_else(|| {
            QueryMendError::config(format!(
                "No API key configured. Set {env_var} or api_key under [llm]."
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{parse_sql, GenerationOptions};

    fn config_for(provider: &str) -> LlmConfig {
        LlmConfig {
            provider: provider.to_string(),
            api_key: Some("test-key".to_string()),
            ..LlmConfig::default()
        }
    }

    #[test]
    fn test_env_key_wins_over_config() {
        let key = resolve_api_key(
            Some("from-env".to_string()),
            Some("from-config".to_string()),
            "GEMINI_API_KEY",
        )
        .unwrap();
        assert_eq!(key, "from-env");
    }

    #[test]
    fn test_config_key_used_when_env_missing() {
        let key = resolve_api_key(None, Some("from-config".to_string()), "OPENAI_API_KEY").unwrap();
        assert_eq!(key, "from-config");

        let key = resolve_api_key(
            Some("  ".to_string()),
            Some("from-config".to_string()),
            "OPENAI_API_KEY",
        )
        .unwrap();
        assert_eq!(key, "from-config");
    }

    #[test]
    fn test_missing_key_is_config_error() {
        let err = resolve_api_key(None, None, "GEMINI_API_KEY").unwrap_err();
        assert!(matches!(err, QueryMendError::Config(_)));
        assert!(err.to_string().contains("GEMINI_API_KEY"));
    }

    #[test]
    fn test_create_with_configured_key() {
        assert!(create_generator(&config_for("gemini")).is_ok());
        assert!(create_generator(&config_for("openai")).is_ok());
        assert!(create_generator(&config_for("ollama")).is_ok());
    }

    #[test]
    fn test_unknown_provider_fails() {
        assert!(create_generator(&config_for("bard")).is_err());
    }

    #[tokio::test]
    async fn test_mock_provider_returns_parseable_sql() {
        let generator = create_generator(&config_for("mock")).unwrap();
        let text = generator
            .complete("anything", &GenerationOptions::default())
            .await
            .unwrap();
        assert_eq!(parse_sql(&text).unwrap(), MOCK_SQL);
    }
}
