//! Single-writer session coordinator.
//!
//! One actor task owns each session's state; callers talk to it through a
//! [`SessionHandle`]. Commands are processed strictly in arrival order, so
//! concurrent requests on the same session id serialize behind one another
//! while independent sessions run in parallel.

use chrono::Utc;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use super::archive::TranscriptArchive;
use super::error::SessionError;
use super::store::SessionStore;
use super::types::{CartActionRecord, HistoryEntry, PersistedSession, Role, SessionState};

const COMMAND_BUFFER: usize = 32;

/// Per-session bounds, taken from config at startup.
#[derive(Debug, Clone, Copy)]
pub struct SessionLimits {
    pub max_history: usize,
    pub rate_limit_window_ms: i64,
    pub rate_limit_max: u32,
}

impl Default for SessionLimits {
    fn default() -> Self {
        Self {
            max_history: 200,
            rate_limit_window_ms: 60_000,
            rate_limit_max: 20,
        }
    }
}

enum SessionCommand {
    History {
        reply: oneshot::Sender<Vec<HistoryEntry>>,
    },
    Append {
        role: Role,
        content: String,
        reply: oneshot::Sender<Result<HistoryEntry, SessionError>>,
    },
    SetCartId {
        cart_id: String,
        reply: oneshot::Sender<Result<(), SessionError>>,
    },
    CartId {
        reply: oneshot::Sender<Option<String>>,
    },
    CartActions {
        reply: oneshot::Sender<Vec<CartActionRecord>>,
    },
    LogCartAction {
        action: String,
        details: Value,
        reply: oneshot::Sender<Result<(), SessionError>>,
    },
    CheckRate {
        reply: oneshot::Sender<Result<(), SessionError>>,
    },
    End {
        reply: oneshot::Sender<Result<(), SessionError>>,
    },
}

/// Cloneable mailbox for one session actor.
#[derive(Clone)]
pub struct SessionHandle {
    session_id: String,
    tx: mpsc::Sender<SessionCommand>,
}

impl SessionHandle {
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// True once the actor has ended and its mailbox closed.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    pub async fn history(&self) -> Result<Vec<HistoryEntry>, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.send(SessionCommand::History { reply }, rx).await
    }

    pub async fn append(
        &self,
        role: Role,
        content: impl Into<String>,
    ) -> Result<HistoryEntry, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.send(
            SessionCommand::Append {
                role,
                content: content.into(),
                reply,
            },
            rx,
        )
        .await?
    }

    pub async fn set_cart_id(&self, cart_id: impl Into<String>) -> Result<(), SessionError> {
        let (reply, rx) = oneshot::channel();
        self.send(
            SessionCommand::SetCartId {
                cart_id: cart_id.into(),
                reply,
            },
            rx,
        )
        .await?
    }

    pub async fn cart_id(&self) -> Result<Option<String>, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.send(SessionCommand::CartId { reply }, rx).await
    }

    pub async fn cart_actions(&self) -> Result<Vec<CartActionRecord>, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.send(SessionCommand::CartActions { reply }, rx).await
    }

    pub async fn log_cart_action(
        &self,
        action: impl Into<String>,
        details: Value,
    ) -> Result<(), SessionError> {
        let (reply, rx) = oneshot::channel();
        self.send(
            SessionCommand::LogCartAction {
                action: action.into(),
                details,
                reply,
            },
            rx,
        )
        .await?
    }

    pub async fn check_rate(&self) -> Result<(), SessionError> {
        let (reply, rx) = oneshot::channel();
        self.send(SessionCommand::CheckRate { reply }, rx).await?
    }

    /// Archives the transcript, clears state, and stops the actor.
    pub async fn end(&self) -> Result<(), SessionError> {
        let (reply, rx) = oneshot::channel();
        self.send(SessionCommand::End { reply }, rx).await?
    }

    async fn send<R>(
        &self,
        command: SessionCommand,
        rx: oneshot::Receiver<R>,
    ) -> Result<R, SessionError> {
        let unavailable = || SessionError::ActorUnavailable {
            session_id: self.session_id.clone(),
        };
        self.tx.send(command).await.map_err(|_| unavailable())?;
        rx.await.map_err(|_| unavailable())
    }
}

/// Spawns the actor task for one session and returns its handle.
pub(super) fn spawn_session(
    session_id: &str,
    persisted: Option<PersistedSession>,
    store: Arc<dyn SessionStore>,
    archive: TranscriptArchive,
    limits: SessionLimits,
) -> SessionHandle {
    let state = match persisted {
        Some(persisted) => SessionState::from_persisted(persisted),
        None => SessionState::new(session_id.to_string()),
    };

    let (tx, rx) = mpsc::channel(COMMAND_BUFFER);
    let actor = SessionActor {
        state,
        store,
        archive,
        limits,
    };
    tokio::spawn(actor.run(rx));

    SessionHandle {
        session_id: session_id.to_string(),
        tx,
    }
}

struct SessionActor {
    state: SessionState,
    store: Arc<dyn SessionStore>,
    archive: TranscriptArchive,
    limits: SessionLimits,
}

impl SessionActor {
    async fn run(mut self, mut rx: mpsc::Receiver<SessionCommand>) {
        debug!(session_id = %self.state.session_id, "session actor started");

        while let Some(command) = rx.recv().await {
            match command {
                SessionCommand::History { reply } => {
                    let _ = reply.send(self.state.history.clone());
                }
                SessionCommand::Append {
                    role,
                    content,
                    reply,
                } => {
                    let _ = reply.send(self.append(role, content).await);
                }
                SessionCommand::SetCartId { cart_id, reply } => {
                    let _ = reply.send(self.set_cart_id(cart_id).await);
                }
                SessionCommand::CartId { reply } => {
                    let _ = reply.send(self.state.cart_id.clone());
                }
                SessionCommand::CartActions { reply } => {
                    let _ = reply.send(self.state.cart_actions.iter().cloned().collect());
                }
                SessionCommand::LogCartAction {
                    action,
                    details,
                    reply,
                } => {
                    let _ = reply.send(self.log_cart_action(action, details).await);
                }
                SessionCommand::CheckRate { reply } => {
                    let _ = reply.send(self.check_rate());
                }
                SessionCommand::End { reply } => {
                    let _ = reply.send(self.end().await);
                    break;
                }
            }
        }

        debug!(session_id = %self.state.session_id, "session actor stopped");
    }

    /// Appends with a server timestamp and persists before replying. On a
    /// failed write the entry is rolled back so memory matches storage.
    async fn append(&mut self, role: Role, content: String) -> Result<HistoryEntry, SessionError> {
        let last_ts = self.state.history.last().map(|e| e.timestamp).unwrap_or(0);
        let entry = HistoryEntry {
            role,
            content,
            timestamp: Utc::now().timestamp_millis().max(last_ts),
        };
        self.state.history.push(entry.clone());

        self.trim_overflow().await;

        if let Err(e) = self.store.save(&self.state.to_persisted()).await {
            self.state.history.pop();
            return Err(e);
        }

        Ok(entry)
    }

    /// Drops entries beyond the cap from memory, spilling them to the
    /// archive so the transcript stays complete end to end.
    async fn trim_overflow(&mut self) {
        if self.state.history.len() <= self.limits.max_history {
            return;
        }

        let overflow: Vec<HistoryEntry> = self
            .state
            .history
            .drain(..self.state.history.len() - self.limits.max_history)
            .collect();

        match self.conversation_id().await {
            Some(conversation_id) => {
                if let Err(e) = self.archive.append_messages(conversation_id, &overflow).await {
                    warn!(
                        session_id = %self.state.session_id,
                        dropped = overflow.len(),
                        error = %e,
                        "failed to spill history overflow to archive"
                    );
                }
            }
            None => warn!(
                session_id = %self.state.session_id,
                dropped = overflow.len(),
                "history overflow dropped without archive row"
            ),
        }
    }

    async fn set_cart_id(&mut self, cart_id: String) -> Result<(), SessionError> {
        let previous = self.state.cart_id.replace(cart_id);
        if let Err(e) = self.store.save(&self.state.to_persisted()).await {
            self.state.cart_id = previous;
            return Err(e);
        }
        Ok(())
    }

    async fn log_cart_action(
        &mut self,
        action: String,
        details: Value,
    ) -> Result<(), SessionError> {
        let record = CartActionRecord {
            action,
            details,
            timestamp: Utc::now().timestamp_millis(),
        };
        self.state.push_cart_action(record.clone());
        self.store.save(&self.state.to_persisted()).await?;

        // Mirror to the audit trail; the ring stays authoritative on failure.
        if let Err(e) = self
            .archive
            .record_cart_action(
                &self.state.session_id,
                self.state.cart_id.as_deref(),
                &record.action,
                &record.details,
                record.timestamp,
            )
            .await
        {
            warn!(session_id = %self.state.session_id, error = %e, "cart action mirror failed");
        }

        Ok(())
    }

    /// Sliding-window counter: reset after the window elapses, otherwise
    /// count the operation and reject past the per-window maximum.
    fn check_rate(&mut self) -> Result<(), SessionError> {
        let now = Utc::now().timestamp_millis();

        if now - self.state.rate_window_start > self.limits.rate_limit_window_ms {
            self.state.rate_window_start = now;
            self.state.rate_count = 1;
            return Ok(());
        }

        self.state.rate_count += 1;
        if self.state.rate_count > self.limits.rate_limit_max {
            return Err(SessionError::RateLimited {
                count: self.state.rate_count,
                max: self.limits.rate_limit_max,
            });
        }
        Ok(())
    }

    /// Conversation header then messages batch, best-effort, then clear.
    async fn end(&mut self) -> Result<(), SessionError> {
        let now = Utc::now().timestamp_millis();

        if !self.state.history.is_empty() || self.state.conversation_id.is_some() {
            match self.conversation_id().await {
                Some(conversation_id) => {
                    if let Err(e) = self
                        .archive
                        .append_messages(conversation_id, &self.state.history)
                        .await
                    {
                        warn!(session_id = %self.state.session_id, error = %e, "transcript archive write failed");
                    }
                    if let Err(e) = self.archive.finish_conversation(conversation_id, now).await {
                        warn!(session_id = %self.state.session_id, error = %e, "conversation close failed");
                    }
                }
                None => warn!(
                    session_id = %self.state.session_id,
                    "ending session without archive row, transcript lost"
                ),
            }
        }

        if let Err(e) = self.store.clear(&self.state.session_id).await {
            warn!(session_id = %self.state.session_id, error = %e, "durable session clear failed");
        }

        self.state.history.clear();
        self.state.cart_actions.clear();
        self.state.cart_id = None;
        self.state.conversation_id = None;

        Ok(())
    }

    /// Lazily opens the archive row for this lifetime.
    async fn conversation_id(&mut self) -> Option<i64> {
        if let Some(id) = self.state.conversation_id {
            return Some(id);
        }
        match self
            .archive
            .begin_conversation(&self.state.session_id, self.state.started_at)
            .await
        {
            Ok(id) => {
                self.state.conversation_id = Some(id);
                Some(id)
            }
            Err(e) => {
                warn!(session_id = %self.state.session_id, error = %e, "failed to open conversation row");
                None
            }
        }
    }
}
