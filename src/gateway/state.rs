//! Shared per-process handler state.

use std::sync::Arc;

use crate::config::Config;
use crate::prompt::PromptAssembler;
use crate::provider::ProviderBackend;
use crate::semantic::SemanticIndexClient;
use crate::session::SessionRegistry;
use crate::tools::ToolBackend;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,

    pub sessions: Arc<SessionRegistry>,

    /// Absent when no `SHOP_DOMAIN` is configured; retrieval then degrades
    /// to the semantic index and empty context.
    pub tools: Option<Arc<dyn ToolBackend>>,

    pub semantic: Arc<SemanticIndexClient>,

    pub provider: Arc<dyn ProviderBackend>,

    pub assembler: PromptAssembler,
}

impl AppState {
    pub fn new(
        config: Arc<Config>,
        sessions: Arc<SessionRegistry>,
        tools: Option<Arc<dyn ToolBackend>>,
        semantic: Arc<SemanticIndexClient>,
        provider: Arc<dyn ProviderBackend>,
    ) -> Self {
        let assembler = PromptAssembler::new(
            config.history_tail_for_prompt,
            config.context_char_budget,
        );
        Self {
            config,
            sessions,
            tools,
            semantic,
            provider,
            assembler,
        }
    }
}
