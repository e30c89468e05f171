//! Primary remote provider: chat completions over SSE.

use async_openai::types::chat::{
    CreateChatCompletionRequest, CreateChatCompletionStreamResponse,
};
use async_trait::async_trait;
use futures_util::StreamExt;
use serde_json::json;
use std::collections::VecDeque;
use tracing::{debug, error};

use super::error::ProviderError;
use super::{ProviderBackend, TokenStream};
use crate::prompt::ChatMessage;

/// Stream sentinel closing a chat-completions SSE response.
pub const DONE_SENTINEL: &str = "[DONE]";

const DEFAULT_TEMPERATURE: f32 = 0.7;
const DEFAULT_MAX_TOKENS: u32 = 1024;

/// Streams completions from a remote chat-completions endpoint.
pub struct RemoteProvider {
    http: reqwest::Client,
    url: String,
    api_key: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl RemoteProvider {
    pub fn new(url: String, api_key: String, model: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            url,
            api_key,
            model,
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }
}

#[async_trait]
impl ProviderBackend for RemoteProvider {
    async fn stream(&self, messages: &[ChatMessage]) -> Result<TokenStream, ProviderError> {
        let request: CreateChatCompletionRequest = serde_json::from_value(json!({
            "model": self.model,
            "messages": messages
                .iter()
                .map(|m| json!({ "role": m.role.as_str(), "content": m.content }))
                .collect::<Vec<_>>(),
            "stream": true,
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
        }))
        .map_err(|e| ProviderError::Decode(e.to_string()))?;

        let response = self
            .http
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            error!(status = status.as_u16(), "provider rejected stream initiation");
            return Err(ProviderError::Status {
                status: status.as_u16(),
            });
        }

        let state = SseState {
            inner: response.bytes_stream(),
            decoder: SseFrameDecoder::default(),
            pending: VecDeque::new(),
            done: false,
        };

        // Dropping the resulting stream drops the underlying HTTP body and
        // closes the upstream connection, which is the cancellation path.
        let stream = futures_util::stream::unfold(state, |mut state| async move {
            loop {
                if state.done {
                    return None;
                }

                if let Some(payload) = state.pending.pop_front() {
                    if payload == DONE_SENTINEL {
                        state.done = true;
                        return None;
                    }
                    match delta_fragment(&payload) {
                        Some(fragment) if !fragment.is_empty() => {
                            return Some((Ok(fragment), state));
                        }
                        _ => continue,
                    }
                }

                match state.inner.next().await {
                    Some(Ok(bytes)) => state.pending.extend(state.decoder.push(&bytes)),
                    Some(Err(e)) => {
                        state.done = true;
                        return Some((Err(ProviderError::Http(e)), state));
                    }
                    None => {
                        state.done = true;
                        return None;
                    }
                }
            }
        });

        Ok(stream.boxed())
    }
}

struct SseState<S> {
    inner: S,
    decoder: SseFrameDecoder,
    pending: VecDeque<String>,
    done: bool,
}

/// Extracts `choices[0].delta.content` from one stream frame. Frames that do
/// not parse are skipped; providers interleave comments and usage frames.
fn delta_fragment(payload: &str) -> Option<String> {
    let chunk: CreateChatCompletionStreamResponse = match serde_json::from_str(payload) {
        Ok(chunk) => chunk,
        Err(e) => {
            debug!(error = %e, "skipping unparseable stream frame");
            return None;
        }
    };
    chunk
        .choices
        .first()
        .and_then(|choice| choice.delta.content.clone())
}

/// Incremental `text/event-stream` decoder: buffers bytes, yields the data
/// payload of each complete event.
#[derive(Default)]
pub(super) struct SseFrameDecoder {
    buffer: String,
}

impl SseFrameDecoder {
    /// Feeds raw bytes, returning the payloads of every event completed by
    /// them. Partial events stay buffered for the next call.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buffer.push_str(&String::from_utf8_lossy(bytes));

        let mut payloads = Vec::new();
        while let Some(boundary) = self.buffer.find("\n\n") {
            let event: String = self.buffer.drain(..boundary + 2).collect();
            let data_lines: Vec<&str> = event
                .lines()
                .filter_map(|line| line.strip_prefix("data:"))
                .map(|data| data.strip_prefix(' ').unwrap_or(data))
                .collect();
            if !data_lines.is_empty() {
                payloads.push(data_lines.join("\n"));
            }
        }
        payloads
    }
}
