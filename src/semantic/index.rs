//! Vector index access.

use async_trait::async_trait;
use qdrant_client::Qdrant;
use qdrant_client::qdrant::SearchPointsBuilder;
use qdrant_client::qdrant::point_id::PointIdOptions;
use std::collections::HashMap;

use super::error::SemanticError;

/// One match from the index, payload flattened to display strings.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredMatch {
    pub id: String,
    pub score: f32,
    pub payload: HashMap<String, String>,
}

/// Read-only similarity search. Index population is out of scope; ingestion
/// tooling owns the writes.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    async fn top_k(
        &self,
        collection: &str,
        query: Vec<f32>,
        limit: u64,
    ) -> Result<Vec<ScoredMatch>, SemanticError>;
}

/// Direct Qdrant wrapper.
pub struct QdrantIndex {
    client: Qdrant,
    url: String,
}

impl QdrantIndex {
    /// Creates a client for `url`.
    pub fn new(url: &str) -> Result<Self, SemanticError> {
        let client = Qdrant::from_url(url)
            .build()
            .map_err(|e| SemanticError::ConnectionFailed {
                url: url.to_string(),
                message: e.to_string(),
            })?;

        Ok(Self {
            client,
            url: url.to_string(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Performs a basic health check request.
    pub async fn health_check(&self) -> Result<(), SemanticError> {
        self.client
            .health_check()
            .await
            .map_err(|e| SemanticError::ConnectionFailed {
                url: self.url.clone(),
                message: e.to_string(),
            })?;
        Ok(())
    }
}

#[async_trait]
impl VectorIndex for QdrantIndex {
    async fn top_k(
        &self,
        collection: &str,
        query: Vec<f32>,
        limit: u64,
    ) -> Result<Vec<ScoredMatch>, SemanticError> {
        let search = SearchPointsBuilder::new(collection, query, limit).with_payload(true);

        let result = self
            .client
            .search_points(search)
            .await
            .map_err(|e| SemanticError::SearchFailed {
                collection: collection.to_string(),
                message: e.to_string(),
            })?;

        Ok(result
            .result
            .into_iter()
            .filter_map(|point| {
                let id = match point.id.and_then(|pid| pid.point_id_options) {
                    Some(PointIdOptions::Num(n)) => n.to_string(),
                    Some(PointIdOptions::Uuid(s)) => s,
                    None => return None,
                };

                let payload = point
                    .payload
                    .into_iter()
                    .filter_map(|(key, value)| {
                        let rendered = value
                            .as_str()
                            .map(|s| s.to_string())
                            .or_else(|| value.as_integer().map(|i| i.to_string()))
                            .or_else(|| value.as_double().map(|d| d.to_string()))?;
                        Some((key, rendered))
                    })
                    .collect();

                Some(ScoredMatch {
                    id,
                    score: point.score,
                    payload,
                })
            })
            .collect())
    }
}
