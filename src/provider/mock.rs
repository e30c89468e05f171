//! Programmable provider backend for tests.

use async_trait::async_trait;
use futures_util::StreamExt;
use parking_lot::Mutex;

use super::error::ProviderError;
use super::{ProviderBackend, TokenStream};
use crate::prompt::ChatMessage;

/// Yields configured fragments, or fails at initiation, or fails mid-stream.
#[derive(Default)]
pub struct MockProvider {
    pub fragments: Mutex<Vec<String>>,
    pub fail_initiation: Mutex<bool>,
    pub fail_mid_stream: Mutex<bool>,
    /// Prompts observed by `stream`, for assertions.
    pub prompts: Mutex<Vec<Vec<ChatMessage>>>,
}

impl MockProvider {
    pub fn with_fragments(fragments: &[&str]) -> Self {
        let mock = Self::default();
        *mock.fragments.lock() = fragments.iter().map(|s| s.to_string()).collect();
        mock
    }

    pub fn failing() -> Self {
        let mock = Self::default();
        *mock.fail_initiation.lock() = true;
        mock
    }

    pub fn last_prompt(&self) -> Option<Vec<ChatMessage>> {
        self.prompts.lock().last().cloned()
    }
}

#[async_trait]
impl ProviderBackend for MockProvider {
    async fn stream(&self, messages: &[ChatMessage]) -> Result<TokenStream, ProviderError> {
        if *self.fail_initiation.lock() {
            return Err(ProviderError::Unavailable("mock initiation failure".to_string()));
        }
        self.prompts.lock().push(messages.to_vec());

        let mut items: Vec<Result<String, ProviderError>> =
            self.fragments.lock().iter().cloned().map(Ok).collect();
        if *self.fail_mid_stream.lock() {
            items.push(Err(ProviderError::Decode("mock mid-stream failure".to_string())));
        }
        Ok(futures_util::stream::iter(items).boxed())
    }
}
