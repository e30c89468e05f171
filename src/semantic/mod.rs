//! Semantic retrieval: embed, query the vector index, format documents.
//!
//! Used as the fallback for policy/FAQ retrieval when the JSON-RPC path is
//! absent or returns nothing. The whole surface is best-effort: any failure
//! logs and yields an empty list.

pub mod embedder;
pub mod error;
pub mod index;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

#[cfg(test)]
mod tests;

pub use embedder::{Embedder, RemoteEmbedder, StubEmbedder};
pub use error::SemanticError;
pub use index::{QdrantIndex, ScoredMatch, VectorIndex};
#[cfg(any(test, feature = "mock"))]
pub use mock::{FailingEmbedder, MockVectorIndex};

use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

/// Collection holding the store's knowledge documents.
pub const DEFAULT_COLLECTION_NAME: &str = "store_knowledge";

/// Default number of matches requested per query.
pub const DEFAULT_TOP_K: usize = 3;

/// Default confidence gate threshold.
pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.7;

/// A retrieved context document, from either retrieval path.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievedDocument {
    pub id: String,
    pub text: String,
    /// Similarity in `[0, 1]`; tool-sourced documents use 1.0.
    pub score: f32,
    pub metadata: HashMap<String, String>,
}

impl RetrievedDocument {
    pub fn new(id: impl Into<String>, text: impl Into<String>, score: f32) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            score,
            metadata: HashMap::new(),
        }
    }
}

/// Embedding model + vector index as one `embed → top-k → format` operation.
pub struct SemanticIndexClient {
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    collection: String,
    top_k: usize,
}

impl SemanticIndexClient {
    pub fn new(embedder: Arc<dyn Embedder>, index: Arc<dyn VectorIndex>) -> Self {
        Self {
            embedder,
            index,
            collection: DEFAULT_COLLECTION_NAME.to_string(),
            top_k: DEFAULT_TOP_K,
        }
    }

    pub fn with_collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = collection.into();
        self
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    /// Retrieves the top-k documents for `query`. Never fails: embedding or
    /// search errors are logged and produce an empty list. Matches without a
    /// `text` payload are dropped; scores are clamped to `[0, 1]`.
    pub async fn retrieve(&self, query: &str) -> Vec<RetrievedDocument> {
        let vector = match self.embedder.embed(query).await {
            Ok(vector) => vector,
            Err(e) => {
                warn!(error = %e, "query embedding failed, skipping semantic retrieval");
                return Vec::new();
            }
        };

        let matches = match self
            .index
            .top_k(&self.collection, vector, self.top_k as u64)
            .await
        {
            Ok(matches) => matches,
            Err(e) => {
                warn!(error = %e, collection = %self.collection, "vector search failed");
                return Vec::new();
            }
        };

        matches
            .into_iter()
            .filter_map(|m| {
                let text = m.payload.get("text")?.clone();
                let mut metadata = m.payload;
                metadata.remove("text");
                Some(RetrievedDocument {
                    id: m.id,
                    text,
                    score: m.score.clamp(0.0, 1.0),
                    metadata,
                })
            })
            .collect()
    }
}

/// True iff at least one document clears the threshold.
pub fn has_high_confidence_results(docs: &[RetrievedDocument], threshold: f32) -> bool {
    docs.iter().any(|d| d.score >= threshold)
}
