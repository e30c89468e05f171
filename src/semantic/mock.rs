//! Mock semantic backends for tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;

use super::embedder::Embedder;
use super::error::SemanticError;
use super::index::{ScoredMatch, VectorIndex};

/// Fixed-response index; set `fail` to exercise the swallow-errors path.
#[derive(Default)]
pub struct MockVectorIndex {
    pub matches: Mutex<Vec<ScoredMatch>>,
    pub fail: Mutex<bool>,
    pub queries: Mutex<Vec<(String, u64)>>,
}

impl MockVectorIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_matches(matches: Vec<ScoredMatch>) -> Self {
        let mock = Self::default();
        *mock.matches.lock() = matches;
        mock
    }

    /// Convenience for a single `{id, text, score}` document.
    pub fn with_document(id: &str, text: &str, score: f32) -> Self {
        Self::with_matches(vec![ScoredMatch {
            id: id.to_string(),
            score,
            payload: HashMap::from([("text".to_string(), text.to_string())]),
        }])
    }
}

#[async_trait]
impl VectorIndex for MockVectorIndex {
    async fn top_k(
        &self,
        collection: &str,
        _query: Vec<f32>,
        limit: u64,
    ) -> Result<Vec<ScoredMatch>, SemanticError> {
        if *self.fail.lock() {
            return Err(SemanticError::SearchFailed {
                collection: collection.to_string(),
                message: "mock failure".to_string(),
            });
        }
        self.queries.lock().push((collection.to_string(), limit));
        let matches = self.matches.lock();
        Ok(matches.iter().take(limit as usize).cloned().collect())
    }
}

/// Embedder that fails on demand.
pub struct FailingEmbedder;

#[async_trait]
impl Embedder for FailingEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>, SemanticError> {
        Err(SemanticError::EmbeddingFailed {
            message: "mock failure".to_string(),
        })
    }

    fn dim(&self) -> usize {
        0
    }
}
