//! Durable per-session storage.
//!
//! The actor writes its whole projection (`history`, `cart_id`,
//! `cart_actions`) on every mutation and reloads it when a known session id
//! arrives after a restart. Long-term transcripts live in the archive, not
//! here.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::Row;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use tracing::warn;

use super::error::SessionError;
use super::types::{CartActionRecord, HistoryEntry, PersistedSession};

/// Opens the SQLite pool for the configured database URL. In-memory
/// databases are pinned to a single connection, otherwise each pooled
/// connection would see its own empty database.
pub async fn connect_pool(database_url: &str) -> Result<SqlitePool, SessionError> {
    let max_connections = if database_url.contains(":memory:") { 1 } else { 5 };
    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await?;
    Ok(pool)
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn load(&self, session_id: &str) -> Result<Option<PersistedSession>, SessionError>;

    async fn save(&self, session: &PersistedSession) -> Result<(), SessionError>;

    async fn clear(&self, session_id: &str) -> Result<(), SessionError>;
}

/// SQLite-backed store, one row per live session.
#[derive(Clone)]
pub struct SqliteSessionStore {
    pool: SqlitePool,
}

impl SqliteSessionStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Creates the backing table when missing.
    pub async fn migrate(&self) -> Result<(), SessionError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS session_state (
                session_id TEXT PRIMARY KEY,
                history TEXT NOT NULL,
                cart_id TEXT,
                cart_actions TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl SessionStore for SqliteSessionStore {
    async fn load(&self, session_id: &str) -> Result<Option<PersistedSession>, SessionError> {
        let row = sqlx::query(
            "SELECT history, cart_id, cart_actions FROM session_state WHERE session_id = $1",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let history_json: String = row.get("history");
        let cart_id: Option<String> = row.get("cart_id");
        let actions_json: String = row.get("cart_actions");

        let history: Vec<HistoryEntry> = match serde_json::from_str(&history_json) {
            Ok(history) => history,
            Err(e) => {
                warn!(session_id, error = %e, "corrupt persisted history, starting fresh");
                return Ok(None);
            }
        };
        let cart_actions: Vec<CartActionRecord> =
            serde_json::from_str(&actions_json).unwrap_or_default();

        Ok(Some(PersistedSession {
            session_id: session_id.to_string(),
            history,
            cart_id,
            cart_actions,
        }))
    }

    async fn save(&self, session: &PersistedSession) -> Result<(), SessionError> {
        let history = serde_json::to_string(&session.history).unwrap_or_else(|_| "[]".to_string());
        let actions =
            serde_json::to_string(&session.cart_actions).unwrap_or_else(|_| "[]".to_string());

        sqlx::query(
            r#"
            INSERT INTO session_state (session_id, history, cart_id, cart_actions, updated_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT(session_id) DO UPDATE SET
                history = excluded.history,
                cart_id = excluded.cart_id,
                cart_actions = excluded.cart_actions,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&session.session_id)
        .bind(history)
        .bind(&session.cart_id)
        .bind(actions)
        .bind(Utc::now().timestamp_millis())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn clear(&self, session_id: &str) -> Result<(), SessionError> {
        sqlx::query("DELETE FROM session_state WHERE session_id = $1")
            .bind(session_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

/// In-memory store for tests and credential-less development.
#[cfg(any(test, feature = "mock"))]
#[derive(Default)]
pub struct MemorySessionStore {
    sessions: parking_lot::Mutex<std::collections::HashMap<String, PersistedSession>>,
    pub fail_saves: parking_lot::Mutex<bool>,
}

#[cfg(any(test, feature = "mock"))]
impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(any(test, feature = "mock"))]
#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn load(&self, session_id: &str) -> Result<Option<PersistedSession>, SessionError> {
        Ok(self.sessions.lock().get(session_id).cloned())
    }

    async fn save(&self, session: &PersistedSession) -> Result<(), SessionError> {
        if *self.fail_saves.lock() {
            return Err(SessionError::Persistence(sqlx::Error::PoolClosed));
        }
        self.sessions
            .lock()
            .insert(session.session_id.clone(), session.clone());
        Ok(())
    }

    async fn clear(&self, session_id: &str) -> Result<(), SessionError> {
        self.sessions.lock().remove(session_id);
        Ok(())
    }
}
