//! # Vitrine Gateway
//!
//! Conversational commerce gateway for a storefront widget.
//!
//! Vitrine sits between the widget and its upstreams: a signed storefront
//! proxy in front, a JSON-RPC tool service, a semantic index, and an LLM
//! provider (remote with a local fallback) behind.
//!
//! ```text
//! Widget → verify → session actor → intent → retrieval → prompt → LLM → SSE
//! ```
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use vitrine::Config;
//!
//! # fn run() -> anyhow::Result<()> {
//! let config = Config::from_env()?;
//! println!("Listening on {}", config.socket_addr());
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`auth`] - Signed-proxy request verification
//! - [`config`] - Environment-backed configuration
//! - [`gateway`] - HTTP front door, orchestration, event-stream encoder
//! - [`intent`] - Utterance classification and strategy selection
//! - [`prompt`] - Bounded prompt assembly
//! - [`provider`] - LLM streaming adapter (remote primary, local fallback)
//! - [`semantic`] - Embedding + vector-index retrieval fallback
//! - [`session`] - Per-conversation actors, durable store, archive
//! - [`tools`] - JSON-RPC catalog/cart/policy/order client

#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod auth;
pub mod config;
pub mod gateway;
pub mod intent;
pub mod prompt;
pub mod provider;
pub mod semantic;
pub mod session;
pub mod tools;

pub use auth::{SIGNATURE_HEADER, SignedRequest};
pub use config::{Config, ConfigError};
pub use gateway::{
    AppState, ChatRequest, ChatResponse, DONE_MARKER, GatewayError, create_router_with_state,
};
pub use intent::{Intent, RetrievalStrategy};
pub use prompt::{ChatMessage, MessageRole, PromptAssembler};
#[cfg(any(test, feature = "mock"))]
pub use provider::MockProvider;
pub use provider::{
    LocalProvider, ProviderAdapter, ProviderBackend, ProviderError, RemoteProvider, StaticProvider,
    TokenStream,
};
#[cfg(any(test, feature = "mock"))]
pub use semantic::{FailingEmbedder, MockVectorIndex};
pub use semantic::{
    Embedder, QdrantIndex, RemoteEmbedder, RetrievedDocument, SemanticError, SemanticIndexClient,
    StubEmbedder, has_high_confidence_results,
};
#[cfg(any(test, feature = "mock"))]
pub use session::MemorySessionStore;
pub use session::{
    CartActionRecord, HistoryEntry, PersistedSession, Role, SessionError, SessionHandle,
    SessionLimits, SessionRegistry, SessionStore, SqliteSessionStore, TranscriptArchive,
};
#[cfg(any(test, feature = "mock"))]
pub use tools::MockToolBackend;
pub use tools::{
    CartLine, CartSnapshot, CatalogProduct, OrderSummary, PolicyAnswer, ToolBackend, ToolClient,
    ToolError,
};
