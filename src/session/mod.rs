//! Per-conversation coordination.
//!
//! A [`SessionRegistry`] hands out one [`SessionHandle`] per session id;
//! behind each handle a single actor task serializes every mutation, writes
//! the durable copy on each change, and archives the full transcript when
//! the conversation ends.

pub mod actor;
pub mod archive;
pub mod error;
pub mod store;
pub mod types;

#[cfg(test)]
mod tests;

pub use actor::{SessionHandle, SessionLimits};
pub use archive::{ArchivedConversation, TranscriptArchive};
pub use error::SessionError;
#[cfg(any(test, feature = "mock"))]
pub use store::MemorySessionStore;
pub use store::{SessionStore, SqliteSessionStore};
pub use types::{CART_ACTION_CAPACITY, CartActionRecord, HistoryEntry, PersistedSession, Role};

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Creates session actors lazily and keeps at most one live actor per id.
pub struct SessionRegistry {
    sessions: Mutex<HashMap<String, SessionHandle>>,
    store: Arc<dyn SessionStore>,
    archive: TranscriptArchive,
    limits: SessionLimits,
}

impl SessionRegistry {
    pub fn new(
        store: Arc<dyn SessionStore>,
        archive: TranscriptArchive,
        limits: SessionLimits,
    ) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            store,
            archive,
            limits,
        }
    }

    /// Returns the live handle for `session_id`, starting an actor (and
    /// loading its durable state) on first reference. The registry lock is
    /// held across the load so concurrent first references cannot race two
    /// actors into existence.
    pub async fn obtain(&self, session_id: &str) -> Result<SessionHandle, SessionError> {
        let mut sessions = self.sessions.lock().await;

        if let Some(handle) = sessions.get(session_id)
            && !handle.is_closed()
        {
            return Ok(handle.clone());
        }

        let persisted = self.store.load(session_id).await?;
        let handle = actor::spawn_session(
            session_id,
            persisted,
            self.store.clone(),
            self.archive.clone(),
            self.limits,
        );
        sessions.insert(session_id.to_string(), handle.clone());
        Ok(handle)
    }

    /// Ends the session: archives its transcript, clears durable state, and
    /// stops the actor. A later `obtain` with the same id starts fresh.
    pub async fn end(&self, session_id: &str) -> Result<(), SessionError> {
        let handle = self.obtain(session_id).await?;
        let result = handle.end().await;
        self.sessions.lock().await.remove(session_id);
        result
    }

    pub async fn active_count(&self) -> usize {
        let sessions = self.sessions.lock().await;
        sessions.values().filter(|h| !h.is_closed()).count()
    }
}
