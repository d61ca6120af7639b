//! Composed top-level error type: composes sub-crate errors into one enum
//! the caller matches on.

#[derive(Debug, thiserror::Error)]
pub enum OperationError {
    #[error("validation failed: {0}")]
    Validation(String),
    #[error(transparent)]
    Llm(#[from] semgraph_llm::LlmError),
    #[error(transparent)]
    Embedding(#[from] semgraph_llm::EmbeddingError),
    #[error(transparent)]
    Index(#[from] semgraph_vector::VectorIndexError),
    #[error(transparent)]
    Search(#[from] semgraph_search::SearchError),
    #[error("graph-store operation failed: {0}")]
    Store(String),
    #[error("operation timed out after {0:?}")]
    Timeout(std::time::Duration),
    #[error("internal assertion failure: {0}")]
    Internal(String),
}

impl OperationError {
    /// The error kind name surfaced in the `{success: false, error, message}`
    /// envelope.
    pub fn kind(&self) -> &'static str {
        match self {
            OperationError::Validation(_) => "ValidationError",
            OperationError::Llm(_) => "LLMError",
            OperationError::Embedding(_) => "EmbeddingError",
            OperationError::Index(_) => "IndexError",
            OperationError::Search(_) => "IndexError",
            OperationError::Store(_) => "StoreError",
            OperationError::Timeout(_) => "Timeout",
            OperationError::Internal(_) => "Internal",
        }
    }
}
