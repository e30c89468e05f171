//! Local inference fallback.
//!
//! Talks to the local backend through the `genai` binding. When the backend
//! exposes a native token stream it is forwarded unchanged; when only a
//! complete response is available, the text is re-split on
//! whitespace-preserving boundaries and paced with a small delay so the
//! client still sees streaming.

use async_trait::async_trait;
use futures_util::StreamExt;
use genai::Client;
use genai::chat::{ChatMessage as GenaiMessage, ChatRequest, ChatStreamEvent};
use std::time::Duration;
use tracing::debug;

use super::error::ProviderError;
use super::{ProviderBackend, TokenStream};
use crate::prompt::{ChatMessage, MessageRole};

/// Pacing between synthesized tokens when the backend has no native stream.
const INTER_TOKEN_DELAY: Duration = Duration::from_millis(15);

pub struct LocalProvider {
    client: Client,
    model: String,
}

impl LocalProvider {
    pub fn new(model: String) -> Self {
        Self {
            client: Client::default(),
            model,
        }
    }
}

#[async_trait]
impl ProviderBackend for LocalProvider {
    async fn stream(&self, messages: &[ChatMessage]) -> Result<TokenStream, ProviderError> {
        match self
            .client
            .exec_chat_stream(&self.model, to_genai_request(messages), None)
            .await
        {
            Ok(response) => {
                let stream = response
                    .stream
                    .filter_map(|event| async move {
                        match event {
                            Ok(ChatStreamEvent::Chunk(chunk)) if !chunk.content.is_empty() => {
                                Some(Ok(chunk.content))
                            }
                            Ok(_) => None,
                            Err(e) => Some(Err(ProviderError::Local(e.to_string()))),
                        }
                    })
                    .boxed();
                Ok(stream)
            }
            Err(stream_error) => {
                debug!(error = %stream_error, "no native stream from local backend, using whole response");
                let response = self
                    .client
                    .exec_chat(&self.model, to_genai_request(messages), None)
                    .await
                    .map_err(|e| ProviderError::Local(e.to_string()))?;

                let text = response.first_text().unwrap_or_default().to_string();
                Ok(resynthesized_stream(text))
            }
        }
    }
}

fn to_genai_request(messages: &[ChatMessage]) -> ChatRequest {
    let genai_messages: Vec<GenaiMessage> = messages
        .iter()
        .map(|m| match m.role {
            MessageRole::System => GenaiMessage::system(m.content.clone()),
            MessageRole::User => GenaiMessage::user(m.content.clone()),
            MessageRole::Assistant => GenaiMessage::assistant(m.content.clone()),
        })
        .collect();
    ChatRequest::new(genai_messages)
}

/// Turns a complete reply into a paced token stream.
pub(super) fn resynthesized_stream(text: String) -> TokenStream {
    let tokens = split_preserving_whitespace(&text);
    futures_util::stream::unfold(tokens.into_iter(), |mut tokens| async move {
        let token = tokens.next()?;
        tokio::time::sleep(INTER_TOKEN_DELAY).await;
        Some((Ok(token), tokens))
    })
    .boxed()
}

/// Splits into word-plus-following-whitespace tokens; concatenating the
/// tokens reproduces the input exactly.
pub(super) fn split_preserving_whitespace(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_whitespace = false;

    for ch in text.chars() {
        if ch.is_whitespace() {
            in_whitespace = true;
            current.push(ch);
        } else {
            if in_whitespace {
                tokens.push(std::mem::take(&mut current));
                in_whitespace = false;
            }
            current.push(ch);
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}
