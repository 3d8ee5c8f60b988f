//! Scripted generator for testing.
//!
//! Returns queued responses in order and records every prompt it receives.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::GeneratorError;
use crate::llm::{GenerationOptions, TextGenerator};

type Reply = std::result::Result<String, GeneratorError>;

/// Generator that replays a fixed script of replies.
///
/// Once the script is exhausted, every call returns the fallback reply
/// (a transport error unless overridden with [`ScriptedGenerator::otherwise`]).
#[derive(Debug)]
pub struct ScriptedGenerator {
    script: Mutex<VecDeque<Reply>>,
    fallback: Reply,
    prompts: Mutex<Vec<String>>,
}

impl Default for ScriptedGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedGenerator {
    /// Creates a generator with an empty script.
    pub fn new() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback: Err(GeneratorError::Transport(
                "no scripted response left".to_string(),
            )),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Creates a generator that fails every call with `error`.
    pub fn always_failing(error: GeneratorError) -> Self {
        Self::new().otherwise(Err(error))
    }

    /// Creates a generator that answers every call with a yaml block for `sql`.
    pub fn always_sql(sql: &str) -> Self {
        Self::new().otherwise(Ok(yaml_block(sql)))
    }

    /// Queues a successful text reply.
    pub fn respond(self, text: impl Into<String>) -> Self {
        self.push(Ok(text.into()))
    }

    /// Queues a reply containing a well-formed yaml block for `sql`.
    pub fn respond_sql(self, sql: &str) -> Self {
        self.push(Ok(yaml_block(sql)))
    }

    /// Queues a failure.
    pub fn fail(self, error: GeneratorError) -> Self {
        self.push(Err(error))
    }

    /// Sets the reply used after the script runs out.
    pub fn otherwise(mut self, reply: Reply) -> Self {
        self.fallback = reply;
        self
    }

    /// Returns the prompts received so far.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }

    /// Returns the number of calls made.
    pub fn call_count(&self) -> usize {
        self.prompts.lock().map(|p| p.len()).unwrap_or_default()
    }

    fn push(self, reply: Reply) -> Self {
        if let Ok(mut script) = self.script.lock() {
            script.push_back(reply);
        }
        self
    }
}

/// Wraps `sql` in the fenced yaml format the parser expects.
pub fn yaml_block(sql: &str) -> String {
    let body = sql
        .lines()
        .map(|line| format!("  {line}"))
        .collect::<Vec<_>>()
        .join("\n");
    format!("```yaml\nsql: |\n{body}\n```")
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn complete(
        &self,
        prompt: &str,
        _options: &GenerationOptions,
    ) -> std::result::Result<String, GeneratorError> {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.to_string());
        }

        let next = self.script.lock().ok().and_then(|mut s| s.pop_front());
        next.unwrap_or_else(|| self.fallback.clone())
    }
}
