//! Transport encoder: token stream → client event stream.
//!
//! Emits `data: <JSON>\n\n` frames: one metadata frame first, one delta
//! frame per fragment, one terminal frame carrying the assembled reply, then
//! the `data: [DONE]\n\n` sentinel. On failure, a single error frame followed
//! by the sentinel. The encoder consumes the token stream exactly once,
//! accumulating the concatenation as it forwards deltas.

use axum::http::{HeaderValue, header};
use axum::response::sse::{Event, Sse};
use axum::response::{IntoResponse, Response};
use futures_util::StreamExt;
use serde::Serialize;
use std::convert::Infallible;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::warn;

use crate::provider::TokenStream;
use crate::session::{Role, SessionHandle};

/// Sentinel terminating every event stream.
pub const DONE_MARKER: &str = "[DONE]";

const FRAME_BUFFER: usize = 32;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataFrame<'a> {
    pub session_id: &'a str,
    pub done: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeltaFrame<'a> {
    pub delta: &'a str,
    pub session_id: &'a str,
    pub done: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TerminalFrame<'a> {
    pub content: &'a str,
    pub session_id: &'a str,
    pub done: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorFrame<'a> {
    pub error: &'a str,
    pub session_id: &'a str,
}

pub fn frame_event<T: Serialize>(payload: &T) -> Event {
    match serde_json::to_string(payload) {
        Ok(json) => Event::default().data(json),
        Err(_) => Event::default().comment("encode-error"),
    }
}

/// Builds the streaming response for one turn.
///
/// The encoder task forwards deltas as they arrive and appends the assistant
/// turn only after the token stream completed; when the client disconnects,
/// the channel send fails, the task returns, and dropping the token stream
/// closes the upstream connection without recording partial content.
pub fn stream_response(session: SessionHandle, mut tokens: TokenStream) -> Response {
    let (tx, rx) = mpsc::channel::<Result<Event, Infallible>>(FRAME_BUFFER);
    let session_id = session.session_id().to_string();

    tokio::spawn(async move {
        let metadata = frame_event(&MetadataFrame {
            session_id: &session_id,
            done: false,
        });
        if tx.send(Ok(metadata)).await.is_err() {
            return;
        }

        let mut full = String::new();
        while let Some(item) = tokens.next().await {
            match item {
                Ok(fragment) => {
                    full.push_str(&fragment);
                    let delta = frame_event(&DeltaFrame {
                        delta: &fragment,
                        session_id: &session_id,
                        done: false,
                    });
                    if tx.send(Ok(delta)).await.is_err() {
                        return;
                    }
                }
                Err(e) => {
                    warn!(session_id, error = %e, "token stream failed mid-flight");
                    emit_error_and_close(&tx, &session_id, "assistant unavailable").await;
                    return;
                }
            }
        }

        // The stream reached its end; record the turn before the terminal
        // frame so a failed write surfaces as an error frame instead.
        if let Err(e) = session.append(Role::Assistant, full.clone()).await {
            warn!(session_id, error = %e, "assistant turn was not recorded");
            emit_error_and_close(&tx, &session_id, "reply could not be recorded").await;
            return;
        }

        let terminal = frame_event(&TerminalFrame {
            content: &full,
            session_id: &session_id,
            done: true,
        });
        if tx.send(Ok(terminal)).await.is_err() {
            return;
        }
        let _ = tx.send(Ok(Event::default().data(DONE_MARKER))).await;
    });

    let mut response = Sse::new(ReceiverStream::new(rx)).into_response();
    let headers = response.headers_mut();
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
    // Disable proxy buffering so deltas reach the widget immediately.
    headers.insert("x-accel-buffering", HeaderValue::from_static("no"));
    response
}

/// Streaming response for a turn whose token stream never started: metadata,
/// one error frame, the sentinel.
pub fn error_stream_response(session_id: &str, message: &str) -> Response {
    let events = vec![
        Ok::<_, Infallible>(frame_event(&MetadataFrame {
            session_id,
            done: false,
        })),
        Ok(frame_event(&ErrorFrame {
            error: message,
            session_id,
        })),
        Ok(Event::default().data(DONE_MARKER)),
    ];

    let mut response = Sse::new(futures_util::stream::iter(events)).into_response();
    let headers = response.headers_mut();
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
    headers.insert("x-accel-buffering", HeaderValue::from_static("no"));
    response
}

async fn emit_error_and_close(
    tx: &mpsc::Sender<Result<Event, Infallible>>,
    session_id: &str,
    message: &str,
) {
    let error = frame_event(&ErrorFrame {
        error: message,
        session_id,
    });
    let _ = tx.send(Ok(error)).await;
    let _ = tx.send(Ok(Event::default().data(DONE_MARKER))).await;
}
