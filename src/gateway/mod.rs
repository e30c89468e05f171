//! HTTP gateway (Axum).
//!
//! Front door for the storefront widget: CORS, signed-proxy verification,
//! session orchestration, retrieval, prompt assembly, and the streaming
//! response pipeline.

pub mod encoder;
pub mod error;
pub mod handler;
pub mod retrieval;
pub mod state;


use axum::{
    Router,
    extract::State,
    http::{HeaderName, HeaderValue, Method, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use tower_http::cors::{Any, CorsLayer};
use tracing::warn;

pub use encoder::DONE_MARKER;
pub use error::GatewayError;
pub use handler::{ChatRequest, ChatResponse, DEV_BYPASS_HEADER, chat_handler};
pub use state::AppState;

/// Builds the application router. The proxy-prefixed chat route mirrors the
/// direct one so both the storefront proxy and direct callers land on the
/// same pipeline.
pub fn create_router_with_state(state: AppState) -> Router {
    let cors = cors_layer(&state.config.allowed_origin);

    Router::new()
        .route("/health", get(health_handler))
        .route("/ping", get(health_handler))
        .route("/ready", get(ready_handler))
        .route("/chat", post(handler::chat_handler))
        .route("/apps/assistant/chat", post(handler::chat_handler))
        .route("/session/end", post(handler::end_session_handler))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

fn cors_layer(allowed_origin: &str) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            HeaderName::from_static(DEV_BYPASS_HEADER),
            HeaderName::from_static(crate::auth::SIGNATURE_HEADER),
        ]);

    if allowed_origin == "*" {
        return layer.allow_origin(Any);
    }

    match allowed_origin.parse::<HeaderValue>() {
        Ok(origin) => layer.allow_origin(origin),
        Err(_) => {
            warn!(allowed_origin, "unparseable ALLOWED_ORIGIN, falling back to any origin");
            layer.allow_origin(Any)
        }
    }
}

pub async fn health_handler() -> &'static str {
    "ok"
}

#[derive(serde::Serialize)]
pub struct ReadyResponse {
    pub status: &'static str,
    pub components: ComponentStatus,
}

#[derive(serde::Serialize)]
pub struct ComponentStatus {
    pub provider: &'static str,
    pub tools: &'static str,
    pub embedder: &'static str,
    pub active_sessions: usize,
}

/// Reports which backends this process is wired to.
pub async fn ready_handler(State(state): State<AppState>) -> Response {
    let provider = if state.config.mock_provider {
        "mock"
    } else if state.config.llm_provider_key.is_some() {
        "remote+local"
    } else {
        "local"
    };

    let components = ComponentStatus {
        provider,
        tools: if state.tools.is_some() {
            "configured"
        } else {
            "absent"
        },
        embedder: if state.config.embedding_url.is_some() {
            "remote"
        } else {
            "stub"
        },
        active_sessions: state.sessions.active_count().await,
    };

    axum::Json(ReadyResponse {
        status: "ok",
        components,
    })
    .into_response()
}
