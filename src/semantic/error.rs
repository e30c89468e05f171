//! Semantic retrieval error types.

use thiserror::Error;

/// Failures in the embedding or vector-index path. The retrieval surface
/// swallows these into an empty result; they exist for logging and tests.
#[derive(Debug, Error)]
pub enum SemanticError {
    #[error("failed to connect to vector index at {url}: {message}")]
    ConnectionFailed { url: String, message: String },

    #[error("vector search failed on '{collection}': {message}")]
    SearchFailed { collection: String, message: String },

    #[error("embedding request failed: {message}")]
    EmbeddingFailed { message: String },

    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}
