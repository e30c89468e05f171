//! Long-term transcript archive.
//!
//! Append-only relational surface: one `conversations` row per session
//! lifetime, its `messages` in order, and a `cart_actions` audit trail.
//! Writes are best-effort; partial failure is logged by the caller.

use sqlx::sqlite::SqlitePool;
use sqlx::{QueryBuilder, Row};

use super::error::SessionError;
use super::types::HistoryEntry;

/// A fully archived conversation, as read back for inspection and tests.
#[derive(Debug, Clone, PartialEq)]
pub struct ArchivedConversation {
    pub id: i64,
    pub session_id: String,
    pub started_at: i64,
    pub ended_at: Option<i64>,
    pub messages: Vec<HistoryEntry>,
}

#[derive(Clone)]
pub struct TranscriptArchive {
    pool: SqlitePool,
}

impl TranscriptArchive {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Creates the archive tables when missing.
    pub async fn migrate(&self) -> Result<(), SessionError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS conversations (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                session_id TEXT NOT NULL,
                started_at INTEGER NOT NULL,
                ended_at INTEGER
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS messages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                conversation_id INTEGER NOT NULL REFERENCES conversations(id),
                role TEXT NOT NULL,
                content TEXT NOT NULL,
                created_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS cart_actions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                session_id TEXT NOT NULL,
                cart_id TEXT,
                action TEXT NOT NULL,
                details TEXT NOT NULL,
                created_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Opens the conversation row for one session lifetime.
    pub async fn begin_conversation(
        &self,
        session_id: &str,
        started_at: i64,
    ) -> Result<i64, SessionError> {
        let result = sqlx::query(
            "INSERT INTO conversations (session_id, started_at) VALUES ($1, $2)",
        )
        .bind(session_id)
        .bind(started_at)
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    /// Appends a batch of messages in one statement.
    pub async fn append_messages(
        &self,
        conversation_id: i64,
        messages: &[HistoryEntry],
    ) -> Result<(), SessionError> {
        if messages.is_empty() {
            return Ok(());
        }

        let mut builder: QueryBuilder<sqlx::Sqlite> =
            QueryBuilder::new("INSERT INTO messages (conversation_id, role, content, created_at) ");
        builder.push_values(messages, |mut b, entry| {
            b.push_bind(conversation_id)
                .push_bind(entry.role.as_str())
                .push_bind(&entry.content)
                .push_bind(entry.timestamp);
        });
        builder.build().execute(&self.pool).await?;

        Ok(())
    }

    /// Stamps the end of a conversation.
    pub async fn finish_conversation(
        &self,
        conversation_id: i64,
        ended_at: i64,
    ) -> Result<(), SessionError> {
        sqlx::query("UPDATE conversations SET ended_at = $1 WHERE id = $2")
            .bind(ended_at)
            .bind(conversation_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Mirrors one cart action into the audit trail.
    pub async fn record_cart_action(
        &self,
        session_id: &str,
        cart_id: Option<&str>,
        action: &str,
        details: &serde_json::Value,
        created_at: i64,
    ) -> Result<(), SessionError> {
        sqlx::query(
            r#"
            INSERT INTO cart_actions (session_id, cart_id, action, details, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(session_id)
        .bind(cart_id)
        .bind(action)
        .bind(details.to_string())
        .bind(created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Reads every archived conversation for a session id, oldest first,
    /// messages in insertion order.
    pub async fn conversations_for_session(
        &self,
        session_id: &str,
    ) -> Result<Vec<ArchivedConversation>, SessionError> {
        let rows = sqlx::query(
            "SELECT id, session_id, started_at, ended_at FROM conversations WHERE session_id = $1 ORDER BY id",
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await?;

        let mut conversations = Vec::with_capacity(rows.len());
        for row in rows {
            let id: i64 = row.get("id");
            let message_rows = sqlx::query(
                "SELECT role, content, created_at FROM messages WHERE conversation_id = $1 ORDER BY id",
            )
            .bind(id)
            .fetch_all(&self.pool)
            .await?;

            let messages = message_rows
                .into_iter()
                .map(|m| {
                    let role: String = m.get("role");
                    HistoryEntry {
                        role: if role == "assistant" {
                            super::types::Role::Assistant
                        } else {
                            super::types::Role::User
                        },
                        content: m.get("content"),
                        timestamp: m.get("created_at"),
                    }
                })
                .collect();

            conversations.push(ArchivedConversation {
                id,
                session_id: row.get("session_id"),
                started_at: row.get("started_at"),
                ended_at: row.get("ended_at"),
                messages,
            });
        }

        Ok(conversations)
    }

    /// Count of archived cart actions for a session.
    pub async fn cart_action_count(&self, session_id: &str) -> Result<i64, SessionError> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM cart_actions WHERE session_id = $1")
            .bind(session_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get("n"))
    }
}
