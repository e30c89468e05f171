//! Session coordination error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    /// The per-window operation budget is exhausted.
    #[error("rate limit exceeded: {count} operations in the current window (max {max})")]
    RateLimited { count: u32, max: u32 },

    /// Durable storage rejected a write; the mutation did not take effect.
    #[error("session persistence failed: {0}")]
    Persistence(#[from] sqlx::Error),

    /// The actor task is gone (its channel closed).
    #[error("session actor unavailable for '{session_id}'")]
    ActorUnavailable { session_id: String },
}
