//! JSON-RPC 2.0 transport for the upstream tool service.

use serde::Deserialize;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::{debug, warn};

use super::error::ToolError;

/// Maximum attempts when the service answers 429.
const MAX_ATTEMPTS: u32 = 3;

/// Linear backoff step between 429 retries.
const BACKOFF_STEP: Duration = Duration::from_millis(250);

#[derive(Debug, Deserialize)]
struct JsonRpcEnvelope {
    #[allow(dead_code)]
    jsonrpc: Option<String>,
    result: Option<Value>,
    error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

/// Stateless JSON-RPC client bound to one shop's tool endpoint.
#[derive(Debug, Clone)]
pub struct ToolClient {
    http: reqwest::Client,
    endpoint: String,
}

impl ToolClient {
    /// Creates a client for `https://<shop_domain>/api/mcp`.
    pub fn new(shop_domain: &str) -> Self {
        Self::with_endpoint(format!("https://{shop_domain}/api/mcp"))
    }

    /// Creates a client for an explicit endpoint URL. Used by tests to point
    /// at a local mock server.
    pub fn with_endpoint(endpoint: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Posts one `tools/call` envelope and returns its `result`.
    ///
    /// Only HTTP 429 is retried, linearly, up to [`MAX_ATTEMPTS`]; every other
    /// failure returns immediately.
    pub async fn call(&self, name: &str, arguments: Value) -> Result<Value, ToolError> {
        let envelope = json!({
            "jsonrpc": "2.0",
            "method": "tools/call",
            "params": { "name": name, "arguments": arguments },
            "id": uuid::Uuid::new_v4().to_string(),
        });

        let mut attempt = 1;
        loop {
            let response = self.http.post(&self.endpoint).json(&envelope).send().await?;
            let status = response.status();

            if status.as_u16() == 429 {
                if attempt >= MAX_ATTEMPTS {
                    return Err(ToolError::RateLimited { attempts: attempt });
                }
                let delay = BACKOFF_STEP * attempt;
                debug!(tool = name, attempt, delay_ms = delay.as_millis() as u64, "tool service throttled, backing off");
                tokio::time::sleep(delay).await;
                attempt += 1;
                continue;
            }

            if !status.is_success() {
                return Err(ToolError::Status {
                    status: status.as_u16(),
                });
            }

            let body: JsonRpcEnvelope = response
                .json()
                .await
                .map_err(|e| ToolError::Malformed(e.to_string()))?;

            if let Some(error) = body.error {
                return Err(ToolError::Rpc {
                    method: name.to_string(),
                    code: error.code,
                    message: error.message,
                });
            }

            return body
                .result
                .ok_or_else(|| ToolError::Malformed("missing result".to_string()));
        }
    }

    /// Runs a call and flattens every failure into `None` with a warning,
    /// which is the contract of all typed wrappers.
    pub(super) async fn call_opt(&self, name: &str, arguments: Value) -> Option<Value> {
        match self.call(name, arguments).await {
            Ok(result) => Some(result),
            Err(e) => {
                warn!(tool = name, error = %e, "tool call failed");
                None
            }
        }
    }
}
