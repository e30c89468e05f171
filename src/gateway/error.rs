//! Gateway error taxonomy and HTTP mapping.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::config::ConfigError;
use crate::session::SessionError;

#[derive(Debug, Error)]
pub enum GatewayError {
    /// Signature verification failed. The response body stays generic; no
    /// detail about the signature scheme leaks.
    #[error("unauthorized")]
    Unauthorized,

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("rate limit exceeded")]
    RateLimited,

    /// Both provider backends failed.
    #[error("assistant unavailable")]
    Provider(String),

    #[error("session storage failed")]
    Session(String),

    #[error("server misconfigured")]
    Config(String),
}

impl From<SessionError> for GatewayError {
    fn from(e: SessionError) -> Self {
        match e {
            SessionError::RateLimited { .. } => GatewayError::RateLimited,
            other => GatewayError::Session(other.to_string()),
        }
    }
}

impl From<ConfigError> for GatewayError {
    fn from(e: ConfigError) -> Self {
        GatewayError::Config(e.to_string())
    }
}

#[derive(serde::Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: u16,
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = match &self {
            GatewayError::Unauthorized => StatusCode::UNAUTHORIZED,
            GatewayError::BadRequest(_) => StatusCode::BAD_REQUEST,
            GatewayError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            GatewayError::Provider(_) => StatusCode::BAD_GATEWAY,
            GatewayError::Session(_) | GatewayError::Config(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        // Internal detail goes to the log, never the response body.
        if status.is_server_error() {
            tracing::error!(error = ?self, "request failed");
        }

        let body = Json(ErrorResponse {
            error: self.to_string(),
            code: status.as_u16(),
        });

        (status, body).into_response()
    }
}
