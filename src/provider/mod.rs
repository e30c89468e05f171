//! LLM provider adapter.
//!
//! Exposes one uniform operation, `stream(messages)`, over two backends: a
//! remote chat-completions endpoint used when a credential is configured,
//! and a local inference binding as the fallback. Failure to initiate the
//! primary stream falls through to the fallback; only when both are
//! unavailable does the adapter error.

pub mod error;
pub mod local;
pub mod remote;

#[cfg(any(test, feature = "mock"))]
pub mod mock;


pub use error::ProviderError;
pub use local::LocalProvider;
#[cfg(any(test, feature = "mock"))]
pub use mock::MockProvider;
pub use remote::{DONE_SENTINEL, RemoteProvider};

use async_trait::async_trait;
use futures_util::StreamExt;
use futures_util::stream::BoxStream;
use std::sync::Arc;
use tracing::warn;

use crate::config::Config;
use crate::prompt::ChatMessage;

/// A finite, non-restartable sequence of token fragments.
pub type TokenStream = BoxStream<'static, Result<String, ProviderError>>;

/// Anything that can stream a completion for an assembled prompt.
#[async_trait]
pub trait ProviderBackend: Send + Sync {
    async fn stream(&self, messages: &[ChatMessage]) -> Result<TokenStream, ProviderError>;
}

/// Primary-with-fallback composition of two backends.
pub struct ProviderAdapter {
    primary: Option<Arc<dyn ProviderBackend>>,
    fallback: Arc<dyn ProviderBackend>,
}

impl ProviderAdapter {
    pub fn new(
        primary: Option<Arc<dyn ProviderBackend>>,
        fallback: Arc<dyn ProviderBackend>,
    ) -> Self {
        Self { primary, fallback }
    }

    /// Wires the production backends: remote when `LLM_PROVIDER_KEY` is
    /// configured, the local binding always.
    pub fn from_config(config: &Config) -> Self {
        let primary = config.llm_provider_key.as_ref().map(|key| {
            Arc::new(RemoteProvider::new(
                config.llm_provider_url.clone(),
                key.clone(),
                config.llm_model.clone(),
            )) as Arc<dyn ProviderBackend>
        });
        let fallback =
            Arc::new(LocalProvider::new(config.local_model.clone())) as Arc<dyn ProviderBackend>;
        Self::new(primary, fallback)
    }
}

#[async_trait]
impl ProviderBackend for ProviderAdapter {
    async fn stream(&self, messages: &[ChatMessage]) -> Result<TokenStream, ProviderError> {
        if let Some(primary) = &self.primary {
            match primary.stream(messages).await {
                Ok(stream) => return Ok(stream),
                Err(e) => {
                    warn!(error = %e, "primary provider failed to initiate, using fallback");
                }
            }
        }
        self.fallback.stream(messages).await
    }
}

/// Deterministic provider used when `MOCK_PROVIDER` is set: echoes fixed
/// fragments without touching any upstream. Also the workhorse of the e2e
/// tests.
pub struct StaticProvider {
    fragments: Vec<String>,
}

impl StaticProvider {
    pub fn new(fragments: Vec<String>) -> Self {
        Self { fragments }
    }

    /// The canned reply used by `MOCK_PROVIDER` mode.
    pub fn canned() -> Self {
        Self::new(vec![
            "This ".to_string(),
            "is ".to_string(),
            "a mock ".to_string(),
            "reply.".to_string(),
        ])
    }
}

#[async_trait]
impl ProviderBackend for StaticProvider {
    async fn stream(&self, _messages: &[ChatMessage]) -> Result<TokenStream, ProviderError> {
        let fragments: Vec<Result<String, ProviderError>> =
            self.fragments.iter().cloned().map(Ok).collect();
        Ok(futures_util::stream::iter(fragments).boxed())
    }
}
