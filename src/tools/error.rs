//! Tool client error types.

use thiserror::Error;

/// Failures inside the JSON-RPC tool client. These never escape the typed
/// wrappers, which degrade to `None` and log.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("tool request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("tool service returned status {status}")]
    Status { status: u16 },

    #[error("tool service rate limited after {attempts} attempts")]
    RateLimited { attempts: u32 },

    #[error("tool call '{method}' returned JSON-RPC error {code}: {message}")]
    Rpc {
        method: String,
        code: i64,
        message: String,
    },

    #[error("malformed tool response: {0}")]
    Malformed(String),
}
