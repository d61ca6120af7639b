//! Scriptable collaborators for tests, driving seeded end-to-end scenarios
//! without a live provider.

use crate::{EmbeddingClient, EmbeddingError, GenerateOptions, LlmClient, LlmError};
use async_trait::async_trait;
use std::sync::Mutex;

/// An `LlmClient` whose responses are either scripted per-call or computed
/// by a closure over the prompt. Falls back to echoing the prompt when the
/// script is exhausted, which is enough to drive the unit-extraction
/// fallback-free path in the seeded scenarios.
pub struct MockLlmClient {
    scripted: Mutex<Vec<String>>,
    responder: Option<Box<dyn Fn(&str) -> String + Send + Sync>>,
    fail_always: bool,
}

impl MockLlmClient {
    pub fn new() -> Self {
        Self {
            scripted: Mutex::new(Vec::new()),
            responder: None,
            fail_always: false,
        }
    }

    pub fn with_responses(responses: impl IntoIterator<Item = String>) -> Self {
        Self {
            scripted: Mutex::new(responses.into_iter().rev().collect()),
            responder: None,
            fail_always: false,
        }
    }

    pub fn with_responder(f: impl Fn(&str) -> String + Send + Sync + 'static) -> Self {
        Self {
            scripted: Mutex::new(Vec::new()),
            responder: Some(Box::new(f)),
            fail_always: false,
        }
    }

    /// An `LlmClient` that always errors, to exercise the deterministic
    /// fallback paths when the provider is unavailable.
    pub fn always_failing() -> Self {
        Self {
            scripted: Mutex::new(Vec::new()),
            responder: None,
            fail_always: true,
        }
    }
}

impl Default for MockLlmClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn generate(
        &self,
        prompt: &str,
        _system_prompt: Option<&str>,
        _options: &GenerateOptions,
    ) -> Result<String, LlmError> {
        if self.fail_always {
            return Err(LlmError::Provider("mock configured to always fail".to_string()));
        }
        if let Some(responder) = &self.responder {
            return Ok(responder(prompt));
        }
        let mut scripted = self.scripted.lock().expect("mock lock poisoned");
        if let Some(next) = scripted.pop() {
            return Ok(next);
        }
        Ok(prompt.to_string())
    }
}

/// An `EmbeddingClient` returning scripted or deterministic vectors.
pub struct MockEmbeddingClient {
    dimension: usize,
    vectors: Mutex<Vec<Vec<f32>>>,
    fail_always: bool,
}

impl MockEmbeddingClient {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            vectors: Mutex::new(Vec::new()),
            fail_always: false,
        }
    }

    pub fn with_vectors(dimension: usize, vectors: impl IntoIterator<Item = Vec<f32>>) -> Self {
        Self {
            dimension,
            vectors: Mutex::new(vectors.into_iter().rev().collect()),
            fail_always: false,
        }
    }

    pub fn always_failing(dimension: usize) -> Self {
        Self {
            dimension,
            vectors: Mutex::new(Vec::new()),
            fail_always: true,
        }
    }

    /// Deterministic pseudo-embedding derived from text length and byte
    /// sum, used when no vector was scripted — stable across calls for the
    /// same input, which is what the idempotence tests need.
    fn deterministic_vector(&self, text: &str) -> Vec<f32> {
        let seed = text.bytes().map(|b| b as u32).sum::<u32>().max(1) as f32;
        (0..self.dimension)
            .map(|i| ((seed + i as f32).sin()))
            .collect()
    }
}

#[async_trait]
impl EmbeddingClient for MockEmbeddingClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        if self.fail_always {
            return Err(EmbeddingError::Provider(
                "mock configured to always fail".to_string(),
            ));
        }
        if text.trim().is_empty() {
            return Err(EmbeddingError::EmptyVector);
        }
        let mut vectors = self.vectors.lock().expect("mock lock poisoned");
        let vector = vectors.pop().unwrap_or_else(|| self.deterministic_vector(text));
        if vector.len() != self.dimension {
            return Err(EmbeddingError::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            });
        }
        Ok(vector)
    }

    fn dimension(&self) -> Option<usize> {
        Some(self.dimension)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn scripted_responses_drain_in_order() {
        let client = MockLlmClient::with_responses(vec!["a".to_string(), "b".to_string()]);
        let options = GenerateOptions::default();
        assert_eq!(client.generate("p", None, &options).await.unwrap(), "a");
        assert_eq!(client.generate("p", None, &options).await.unwrap(), "b");
    }

    #[tokio::test]
    async fn always_failing_embedder_errors() {
        let client = MockEmbeddingClient::always_failing(8);
        assert!(client.embed("hello").await.is_err());
    }

    #[tokio::test]
    async fn deterministic_vector_is_stable() {
        let client = MockEmbeddingClient::new(4);
        let a = client.embed("same text").await.unwrap();
        let b = client.embed("same text").await.unwrap();
        assert_eq!(a, b);
    }
}
