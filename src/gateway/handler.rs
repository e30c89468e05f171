//! Chat request pipeline.

use axum::{
    Json,
    body::Bytes,
    extract::{RawQuery, State},
    http::HeaderMap,
    response::{IntoResponse, Response},
};
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use super::encoder;
use super::error::GatewayError;
use super::retrieval;
use super::state::AppState;
use crate::auth::{self, SIGNATURE_HEADER, SignedRequest};
use crate::intent;
use crate::session::Role;

/// Header that, together with the `DEV_BYPASS` config flag, skips signature
/// verification. Both signals are required.
pub const DEV_BYPASS_HEADER: &str = "x-dev-bypass";

/// Decoded chat request body.
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default, alias = "sessionId")]
    pub session_id: Option<String>,
    #[serde(default, alias = "cartId")]
    pub cart_id: Option<String>,
    #[serde(default)]
    pub stream: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub reply: String,
    pub session_id: String,
}

/// End-of-conversation request body.
#[derive(Debug, Deserialize)]
pub struct EndSessionRequest {
    #[serde(alias = "sessionId")]
    pub session_id: String,
}

#[derive(Debug, Serialize)]
pub struct EndSessionResponse {
    pub ended: String,
}

#[instrument(
    skip(state, headers, body),
    fields(session_id = tracing::field::Empty, intent = tracing::field::Empty)
)]
pub async fn chat_handler(
    State(state): State<AppState>,
    RawQuery(raw_query): RawQuery,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, GatewayError> {
    authenticate(&state, raw_query.as_deref(), &headers, &body)?;

    let chat = parse_chat_request(&body)?;

    let session_id = chat
        .session_id
        .clone()
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    tracing::Span::current().record("session_id", tracing::field::display(&session_id));

    let session = state.sessions.obtain(&session_id).await?;

    if let Some(cart_id) = &chat.cart_id {
        session.set_cart_id(cart_id.as_str()).await?;
    }

    session.check_rate().await?;

    session.append(Role::User, chat.message.as_str()).await?;

    let strategy = intent::select_strategy(&chat.message);
    tracing::Span::current().record("intent", tracing::field::debug(&strategy));
    let outcome = retrieval::run_strategy(&state, &session, strategy, &chat.message).await;
    debug!(documents = outcome.documents.len(), "retrieval complete");

    let history = session.history().await?;
    // The just-appended user turn is the final prompt message; the tail fed
    // to the assembler stops right before it.
    let prior = &history[..history.len().saturating_sub(1)];
    let messages = state
        .assembler
        .build_messages(prior, &outcome.documents, &chat.message);

    if chat.stream.unwrap_or(false) {
        return match state.provider.stream(&messages).await {
            Ok(tokens) => Ok(encoder::stream_response(session, tokens)),
            Err(e) => {
                warn!(error = %e, "stream initiation failed on both backends");
                Ok(encoder::error_stream_response(
                    &session_id,
                    "assistant unavailable",
                ))
            }
        };
    }

    let mut tokens = state
        .provider
        .stream(&messages)
        .await
        .map_err(|e| GatewayError::Provider(e.to_string()))?;
    let mut reply = String::new();
    while let Some(fragment) = tokens.next().await {
        let fragment = fragment.map_err(|e| GatewayError::Provider(e.to_string()))?;
        reply.push_str(&fragment);
    }

    session.append(Role::Assistant, reply.as_str()).await?;

    Ok(Json(ChatResponse { reply, session_id }).into_response())
}

/// Explicit end of a conversation: archives the transcript and clears state.
#[instrument(skip(state, headers, body))]
pub async fn end_session_handler(
    State(state): State<AppState>,
    RawQuery(raw_query): RawQuery,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, GatewayError> {
    authenticate(&state, raw_query.as_deref(), &headers, &body)?;

    let request: EndSessionRequest = serde_json::from_slice(&body)
        .map_err(|e| GatewayError::BadRequest(format!("invalid request body: {e}")))?;

    state.sessions.end(&request.session_id).await?;

    Ok(Json(EndSessionResponse {
        ended: request.session_id,
    })
    .into_response())
}

/// Signature gate shared by the signed routes. Skipped only when the config
/// flag and the per-request header are both present.
fn authenticate(
    state: &AppState,
    raw_query: Option<&str>,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<(), GatewayError> {
    let bypass_requested = headers
        .get(DEV_BYPASS_HEADER)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == "1");
    if state.config.dev_bypass && bypass_requested {
        warn!("signature verification bypassed (dev mode)");
        return Ok(());
    }

    let secret = state.config.require_proxy_secret()?;
    let request = SignedRequest {
        raw_query: raw_query.unwrap_or(""),
        header_signature: headers
            .get(SIGNATURE_HEADER)
            .and_then(|v| v.to_str().ok()),
        body,
    };

    if !auth::verify(secret, &request) {
        return Err(GatewayError::Unauthorized);
    }
    Ok(())
}

fn parse_chat_request(body: &[u8]) -> Result<ChatRequest, GatewayError> {
    let chat: ChatRequest = serde_json::from_slice(body)
        .map_err(|e| GatewayError::BadRequest(format!("invalid request body: {e}")))?;

    if chat.message.trim().is_empty() {
        return Err(GatewayError::BadRequest(
            "message must not be empty".to_string(),
        ));
    }

    Ok(chat)
}
