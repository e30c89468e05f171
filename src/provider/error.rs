//! Provider adapter error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("provider request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("provider returned status {status}")]
    Status { status: u16 },

    #[error("provider stream decode failed: {0}")]
    Decode(String),

    #[error("local inference failed: {0}")]
    Local(String),

    #[error("no provider could serve the request: {0}")]
    Unavailable(String),
}
