//! Prompt assembly.
//!
//! Builds the bounded message sequence handed to the LLM adapter: one system
//! message (persona, grounding rules, retrieved context), the tail of the
//! conversation history, and the current utterance. No I/O happens here.

#[cfg(test)]
mod tests;

use crate::semantic::RetrievedDocument;
use crate::session::{HistoryEntry, Role};

/// Role of an outbound prompt message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::System => "system",
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        }
    }
}

/// One message in the assembled prompt.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }
}

const PERSONA: &str = "You are the storefront assistant for a fine jewelry boutique. \
Be concise and courteous. Never invent products, prices, stock levels, or policies: \
state factual claims only when the retrieved context below supports them, citing the \
document id inline like [doc-id]. If the context does not cover a question, say so \
and offer to help another way. Always answer in the language the customer writes in.";

/// Assembles prompts under fixed history and context budgets.
#[derive(Debug, Clone, Copy)]
pub struct PromptAssembler {
    /// Most recent history entries carried into the prompt.
    pub history_tail: usize,
    /// Soft character budget for the retrieved-context block.
    pub context_char_budget: usize,
}

impl Default for PromptAssembler {
    fn default() -> Self {
        Self {
            history_tail: 10,
            context_char_budget: 4000,
        }
    }
}

impl PromptAssembler {
    pub fn new(history_tail: usize, context_char_budget: usize) -> Self {
        Self {
            history_tail,
            context_char_budget,
        }
    }

    /// Builds the ordered message sequence for one turn.
    pub fn build_messages(
        &self,
        history: &[HistoryEntry],
        context: &[RetrievedDocument],
        utterance: &str,
    ) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(self.history_tail + 2);
        messages.push(ChatMessage::system(self.system_message(context)));

        let tail_start = history.len().saturating_sub(self.history_tail);
        for entry in &history[tail_start..] {
            let message = match entry.role {
                Role::User => ChatMessage::user(entry.content.clone()),
                Role::Assistant => ChatMessage::assistant(entry.content.clone()),
            };
            messages.push(message);
        }

        messages.push(ChatMessage::user(utterance.to_string()));
        messages
    }

    fn system_message(&self, context: &[RetrievedDocument]) -> String {
        let kept = self.fit_to_budget(context);
        if kept.is_empty() {
            return PERSONA.to_string();
        }

        let mut block = String::from(PERSONA);
        block.push_str("\n\nRetrieved context:\n");
        for doc in &kept {
            block.push_str(&format!("[{}] {}\n", doc.id, doc.text));
        }
        block
    }

    /// Drops whole documents, lowest score first, until the block fits.
    /// Kept documents are ordered by descending score.
    fn fit_to_budget<'a>(&self, context: &'a [RetrievedDocument]) -> Vec<&'a RetrievedDocument> {
        let mut kept: Vec<&RetrievedDocument> = context.iter().collect();
        kept.sort_by(|a, b| b.score.total_cmp(&a.score));

        let entry_chars = |doc: &RetrievedDocument| doc.id.len() + doc.text.len() + 4;
        let mut total: usize = kept.iter().map(|d| entry_chars(d)).sum();

        while total > self.context_char_budget && !kept.is_empty() {
            let dropped = kept.pop().expect("kept is non-empty");
            total -= entry_chars(dropped);
        }

        kept
    }
}
