//! Narrow collaborator interfaces for the LLM and embedding services. The
//! engine depends only on the traits here; concrete provider clients are
//! deliberately out of the core.

#[cfg(feature = "http-reference-client")]
pub mod http;

mod mock;

pub use mock::{MockEmbeddingClient, MockLlmClient};

use async_trait::async_trait;

#[derive(Debug, Clone, Default)]
pub struct GenerateOptions {
    pub model: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

#[derive(Debug, thiserror::Error, Clone, PartialEq)]
pub enum LlmError {
    #[error("llm provider error: {0}")]
    Provider(String),
    #[error("llm rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },
    #[error("llm request timed out")]
    Timeout,
}

#[derive(Debug, thiserror::Error, Clone, PartialEq)]
pub enum EmbeddingError {
    #[error("embedding provider error: {0}")]
    Provider(String),
    #[error("embedding vector has unexpected dimension: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("embedding vector was empty")]
    EmptyVector,
}

/// A chat/completion-style LLM handle: `generate(prompt, systemPrompt,
/// options) -> string`, safe to call concurrently.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn generate(
        &self,
        prompt: &str,
        system_prompt: Option<&str>,
        options: &GenerateOptions,
    ) -> Result<String, LlmError>;
}

/// A dense-vector embedding handle: `embed(text) -> vector`, fixed
/// dimension across calls.
#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    /// Declared dimension, when the client can report one up-front.
    /// Dimension is otherwise explicit configuration, never discovered
    /// from the first successful embedding.
    fn dimension(&self) -> Option<usize> {
        None
    }
}

/// Inputs past this length are truncated with an ellipsis before reaching
/// an `EmbeddingClient`, which is expected to accept inputs up to
/// ~8 000 characters.
pub const MAX_EMBEDDING_INPUT_CHARS: usize = 8_000;

pub fn truncate_for_embedding(text: &str) -> String {
    if text.chars().count() <= MAX_EMBEDDING_INPUT_CHARS {
        return text.to_string();
    }
    let mut truncated: String = text.chars().take(MAX_EMBEDDING_INPUT_CHARS).collect();
    truncated.push('…');
    truncated
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncation_is_noop_under_limit() {
        assert_eq!(truncate_for_embedding("short"), "short");
    }

    #[test]
    fn truncation_engages_over_limit() {
        let long = "a".repeat(MAX_EMBEDDING_INPUT_CHARS + 10);
        let truncated = truncate_for_embedding(&long);
        assert!(truncated.ends_with('…'));
        assert_eq!(truncated.chars().count(), MAX_EMBEDDING_INPUT_CHARS + 1);
    }
}
