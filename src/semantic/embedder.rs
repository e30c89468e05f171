//! Embedding backends.
//!
//! The gateway embeds queries through a remote endpoint when one is
//! configured and otherwise falls back to a deterministic stub, so the
//! retrieval path keeps working in development without model credentials.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use super::error::SemanticError;

/// Produces a dense vector of fixed dimension for a query text.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, SemanticError>;

    fn dim(&self) -> usize;
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingDatum {
    embedding: Vec<f32>,
}

/// HTTP embedding backend speaking the `{model, input}` / `{data}` protocol.
pub struct RemoteEmbedder {
    http: reqwest::Client,
    url: String,
    api_key: Option<String>,
    model: String,
    dim: usize,
}

impl RemoteEmbedder {
    pub fn new(url: String, api_key: Option<String>, model: String, dim: usize) -> Self {
        Self {
            http: reqwest::Client::new(),
            url,
            api_key,
            model,
            dim,
        }
    }
}

#[async_trait]
impl Embedder for RemoteEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, SemanticError> {
        let mut request = self.http.post(&self.url).json(&json!({
            "model": self.model,
            "input": [text],
        }));
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| SemanticError::EmbeddingFailed {
                message: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(SemanticError::EmbeddingFailed {
                message: format!("status {}", response.status().as_u16()),
            });
        }

        let body: EmbeddingResponse =
            response
                .json()
                .await
                .map_err(|e| SemanticError::EmbeddingFailed {
                    message: e.to_string(),
                })?;

        let vector = body
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| SemanticError::EmbeddingFailed {
                message: "empty embedding data".to_string(),
            })?;

        if vector.len() != self.dim {
            return Err(SemanticError::DimensionMismatch {
                expected: self.dim,
                actual: vector.len(),
            });
        }

        Ok(vector)
    }

    fn dim(&self) -> usize {
        self.dim
    }
}

/// Deterministic embedder for dev and tests. Same text, same vector; the
/// output is unit-normalized so cosine scores stay in range.
pub struct StubEmbedder {
    dim: usize,
}

impl StubEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { dim }
    }
}

#[async_trait]
impl Embedder for StubEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, SemanticError> {
        let mut state: u64 = 0xcbf2_9ce4_8422_2325;
        for byte in text.bytes() {
            state ^= u64::from(byte);
            state = state.wrapping_mul(0x0000_0100_0000_01b3);
        }

        let mut vector = Vec::with_capacity(self.dim);
        for i in 0..self.dim {
            let mut x = state ^ (i as u64).wrapping_mul(0x9e37_79b9_7f4a_7c15);
            x ^= x >> 33;
            x = x.wrapping_mul(0xff51_afd7_ed55_8ccd);
            x ^= x >> 33;
            vector.push(((x as f64 / u64::MAX as f64) * 2.0 - 1.0) as f32);
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }

        Ok(vector)
    }

    fn dim(&self) -> usize {
        self.dim
    }
}
