//! Durable session store backed by the history service.

use crate::client::HistoryClient;
use crate::error::HistoryError;
use async_trait::async_trait;
use chat_relay_ai::{Role, Turn};
use chat_relay_conversation::{Session, SessionError, SessionStore};
use chat_relay_core::SessionKey;
use tracing::warn;

/// [`SessionStore`] persisting sessions in the history service.
///
/// Chats are stored under the context's raw identifier. Appends read the
/// stored history, extend it and write it back, so callers must serialize
/// operations per key.
#[derive(Debug, Clone)]
pub struct RemoteSessionStore {
    client: HistoryClient,
}

impl RemoteSessionStore {
    #[must_use]
    pub fn new(client: HistoryClient) -> Self {
        Self { client }
    }

    async fn load(&self, key: SessionKey) -> Result<Option<Session>, SessionError> {
        let record = self
            .client
            .get_chat(&key.id().to_string())
            .await
            .map_err(unavailable)?;
        record
            .map(|record| Session::from_turns(key, repair(key, record.history)))
            .transpose()
    }
}

/// Drops model turns stored ahead of the first user turn, so a damaged
/// chat heals on its next write instead of failing every read.
fn repair(key: SessionKey, mut turns: Vec<Turn>) -> Vec<Turn> {
    let leading = turns.iter().take_while(|t| t.role != Role::User).count();
    if leading > 0 {
        warn!(%key, dropped = leading, "stored history does not start with a user turn");
        turns.drain(..leading);
    }
    turns
}

fn unavailable(e: HistoryError) -> SessionError {
    warn!(error = %e, "history service call failed");
    SessionError::Unavailable {
        reason: e.to_string(),
    }
}

#[async_trait]
impl SessionStore for RemoteSessionStore {
    async fn get(&self, key: SessionKey) -> Result<Option<Session>, SessionError> {
        self.load(key).await
    }

    async fn create(&self, key: SessionKey) -> Result<Session, SessionError> {
        if let Some(session) = self.load(key).await? {
            return Ok(session);
        }
        self.client
            .create_chat(&key.id().to_string(), &[])
            .await
            .map_err(unavailable)?;
        Ok(Session::new(key))
    }

    async fn append(&self, key: SessionKey, turns: Vec<Turn>) -> Result<(), SessionError> {
        let mut session = self
            .load(key)
            .await?
            .ok_or(SessionError::NotFound { key })?;
        session.append(turns)?;
        self.client
            .update_chat(&key.id().to_string(), session.turns())
            .await
            .map_err(unavailable)
    }

    async fn delete(&self, key: SessionKey) -> Result<(), SessionError> {
        self.client
            .delete_chat(&key.id().to_string())
            .await
            .map_err(unavailable)
    }
}
