//! Session data model.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::VecDeque;

/// Capacity of the per-session cart-action ring.
pub const CART_ACTION_CAPACITY: usize = 50;

/// Speaker of a history entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// One conversation turn. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub role: Role,
    pub content: String,
    /// Milliseconds since epoch, assigned by the server on append.
    pub timestamp: i64,
}

/// One cart mutation observed by the session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartActionRecord {
    pub action: String,
    pub details: Value,
    pub timestamp: i64,
}

/// The durable projection of a session, loaded on actor start and written on
/// every mutation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersistedSession {
    pub session_id: String,
    pub history: Vec<HistoryEntry>,
    pub cart_id: Option<String>,
    pub cart_actions: Vec<CartActionRecord>,
}

/// In-memory state owned by one session actor.
#[derive(Debug)]
pub(super) struct SessionState {
    pub session_id: String,
    pub history: Vec<HistoryEntry>,
    pub cart_id: Option<String>,
    pub cart_actions: VecDeque<CartActionRecord>,
    pub rate_window_start: i64,
    pub rate_count: u32,
    pub started_at: i64,
    /// Archive row for this lifetime, created lazily on overflow or end.
    pub conversation_id: Option<i64>,
}

impl SessionState {
    pub fn new(session_id: String) -> Self {
        let now = Utc::now().timestamp_millis();
        Self {
            session_id,
            history: Vec::new(),
            cart_id: None,
            cart_actions: VecDeque::with_capacity(CART_ACTION_CAPACITY),
            rate_window_start: now,
            rate_count: 0,
            started_at: now,
            conversation_id: None,
        }
    }

    pub fn from_persisted(persisted: PersistedSession) -> Self {
        let mut state = Self::new(persisted.session_id);
        state.history = persisted.history;
        state.cart_id = persisted.cart_id;
        state.cart_actions = persisted.cart_actions.into();
        state
    }

    pub fn to_persisted(&self) -> PersistedSession {
        PersistedSession {
            session_id: self.session_id.clone(),
            history: self.history.clone(),
            cart_id: self.cart_id.clone(),
            cart_actions: self.cart_actions.iter().cloned().collect(),
        }
    }

    /// Pushes into the bounded ring, evicting the oldest record when full.
    pub fn push_cart_action(&mut self, record: CartActionRecord) {
        if self.cart_actions.len() == CART_ACTION_CAPACITY {
            self.cart_actions.pop_front();
        }
        self.cart_actions.push_back(record);
    }
}
