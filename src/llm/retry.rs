//! Bounded retry around a text generator.
//!
//! Independent of the workflow's debug budget: this only smooths over
//! transient backend failures (rate limits, network errors, timeouts).

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::error::GeneratorError;
use crate::llm::{GenerationOptions, TextGenerator};

/// Retry count and backoff for generator calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts per call, including the first one.
    pub max_attempts: u32,
    /// Delay before the second attempt; doubles after each retry.
    pub base_delay: Duration,
}

impl RetryPolicy {
    /// Creates a policy with the given attempt count and base delay.
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    /// A policy that never retries.
    pub fn none() -> Self {
        Self::new(1, Duration::ZERO)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(1000))
    }
}

/// Generator wrapper that retries retryable failures with exponential backoff.
#[derive(Debug)]
pub struct RetryingGenerator<G> {
    inner: G,
    policy: RetryPolicy,
}

impl<G: TextGenerator> RetryingGenerator<G> {
    /// Wraps `inner` with the given policy.
    pub fn new(inner: G, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    /// Returns the wrapped generator.
    pub fn inner(&self) -> &G {
        &self.inner
    }
}

#[async_trait]
impl<G: TextGenerator> TextGenerator for RetryingGenerator<G> {
    async fn complete(
        &self,
        prompt: &str,
        options: &GenerationOptions,
    ) -> std::result::Result<String, GeneratorError> {
        let mut delay = self.policy.base_delay;
        let mut attempt = 1;

        loop {
            debug!(
                "Generator request attempt {} of {}",
                attempt, self.policy.max_attempts
            );

            match self.inner.complete(prompt, options).await {
                Ok(text) => return Ok(text),
                Err(e) if e.is_retryable() && attempt < self.policy.max_attempts => {
                    warn!(
                        "Generator request failed (attempt {}), retrying in {:?}: {}",
                        attempt, delay, e
                    );
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ScriptedGenerator;

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::new(max_attempts, Duration::from_millis(1))
    }

    #[tokio::test]
    async fn test_retries_transient_errors() {
        let inner = ScriptedGenerator::new()
            .fail(GeneratorError::RateLimited("429".to_string()))
            .fail(GeneratorError::Transport("reset".to_string()))
            .respond("ok");
        let generator = RetryingGenerator::new(inner, fast_policy(3));

        let text = generator
            .complete("p", &GenerationOptions::default())
            .await
            .unwrap();

        assert_eq!(text, "ok");
        assert_eq!(generator.inner().call_count(), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let inner = ScriptedGenerator::always_failing(GeneratorError::Timeout("slow".to_string()));
        let generator = RetryingGenerator::new(inner, fast_policy(2));

        let err = generator
            .complete("p", &GenerationOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(err, GeneratorError::Timeout(_)));
        assert_eq!(generator.inner().call_count(), 2);
    }

    #[tokio::test]
    async fn test_does_not_retry_permanent_errors() {
        let inner = ScriptedGenerator::always_failing(GeneratorError::InvalidCredentials(
            "bad key".to_string(),
        ));
        let generator = RetryingGenerator::new(inner, fast_policy(5));

        let result = generator.complete("p", &GenerationOptions::default()).await;

        assert!(matches!(result, Err(GeneratorError::InvalidCredentials(_))));
        assert_eq!(generator.inner().call_count(), 1);
    }

    #[test]
    fn test_policy_clamps_attempts() {
        assert_eq!(RetryPolicy::new(0, Duration::ZERO).max_attempts, 1);
        assert_eq!(RetryPolicy::none().max_attempts, 1);
    }
}
