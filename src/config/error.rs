//! Configuration error types.

use thiserror::Error;

/// Errors that can occur during configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Port value is outside valid range (1-65535).
    #[error("invalid port '{value}': must be between 1 and 65535")]
    InvalidPort { value: String },

    /// Port string could not be parsed as a number.
    #[error("failed to parse port '{value}': {source}")]
    PortParseError {
        value: String,
        #[source]
        source: std::num::ParseIntError,
    },

    /// Bind address string could not be parsed.
    #[error("failed to parse bind address '{value}': {source}")]
    InvalidBindAddr {
        value: String,
        #[source]
        source: std::net::AddrParseError,
    },

    /// A numeric option could not be parsed or is out of range.
    #[error("invalid value '{value}' for {name}")]
    InvalidNumber { name: &'static str, value: String },

    /// `PROXY_SECRET` is unset but the request path requires signature
    /// verification.
    #[error("PROXY_SECRET is not configured")]
    MissingProxySecret,

    /// The semantic score threshold must sit in `[0, 1]`.
    #[error("invalid score threshold {value}: must be within [0, 1]")]
    InvalidThreshold { value: f32 },
}
