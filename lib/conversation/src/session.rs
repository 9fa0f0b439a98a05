//! Conversation sessions and their storage.
//!
//! A session is the ordered turn history of one chat context. Channel
//! sessions are durable and live in the history service; thread sessions
//! live in process memory. [`RoutingSessionStore`] picks the backend from
//! the key's scope.

use crate::error::SessionError;
use async_trait::async_trait;
use chat_relay_ai::{Role, Turn};
use chat_relay_core::SessionKey;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

/// A conversation session.
///
/// Turns are kept in insertion order. A non-empty session always starts
/// with a user turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    key: SessionKey,
    turns: Vec<Turn>,
}

impl Session {
    /// Creates an empty session.
    #[must_use]
    pub fn new(key: SessionKey) -> Self {
        Self {
            key,
            turns: Vec::new(),
        }
    }

    /// Rebuilds a session from stored turns.
    ///
    /// # Errors
    ///
    /// Returns `InvalidTurnOrder` if the first stored turn is not a user turn.
    pub fn from_turns(key: SessionKey, turns: Vec<Turn>) -> Result<Self, SessionError> {
        let mut session = Self::new(key);
        session.append(turns)?;
        Ok(session)
    }

    #[must_use]
    pub fn key(&self) -> SessionKey {
        self.key
    }

    #[must_use]
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    #[must_use]
    pub fn into_turns(self) -> Vec<Turn> {
        self.turns
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Appends turns after the current last turn.
    ///
    /// # Errors
    ///
    /// Returns `InvalidTurnOrder` if the session is empty and the first new
    /// turn is not a user turn. Nothing is appended in that case.
    pub fn append(&mut self, turns: Vec<Turn>) -> Result<(), SessionError> {
        let starts_with_model = turns.first().is_some_and(|t| t.role != Role::User);
        if self.turns.is_empty() && starts_with_model {
            return Err(SessionError::InvalidTurnOrder { key: self.key });
        }
        self.turns.extend(turns);
        Ok(())
    }
}

/// Trait for session storage.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Gets the session for a key, if one exists.
    async fn get(&self, key: SessionKey) -> Result<Option<Session>, SessionError>;

    /// Creates the session for a key, returning the existing one if present.
    async fn create(&self, key: SessionKey) -> Result<Session, SessionError>;

    /// Appends turns, in order, to an existing session.
    async fn append(&self, key: SessionKey, turns: Vec<Turn>) -> Result<(), SessionError>;

    /// Removes a session entirely. Removing an absent session succeeds.
    async fn delete(&self, key: SessionKey) -> Result<(), SessionError>;
}

/// Process-local session store.
#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    sessions: DashMap<SessionKey, Session>,
}

impl InMemorySessionStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live sessions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn get(&self, key: SessionKey) -> Result<Option<Session>, SessionError> {
        Ok(self.sessions.get(&key).map(|s| s.value().clone()))
    }

    async fn create(&self, key: SessionKey) -> Result<Session, SessionError> {
        let session = self
            .sessions
            .entry(key)
            .or_insert_with(|| Session::new(key))
            .value()
            .clone();
        Ok(session)
    }

    async fn append(&self, key: SessionKey, turns: Vec<Turn>) -> Result<(), SessionError> {
        match self.sessions.entry(key) {
            Entry::Occupied(mut entry) => entry.get_mut().append(turns),
            Entry::Vacant(_) => Err(SessionError::NotFound { key }),
        }
    }

    async fn delete(&self, key: SessionKey) -> Result<(), SessionError> {
        self.sessions.remove(&key);
        Ok(())
    }
}

/// Routes channel keys to a durable store and thread keys to an ephemeral one.
pub struct RoutingSessionStore<D, E> {
    durable: D,
    ephemeral: E,
}

impl<D, E> RoutingSessionStore<D, E>
where
    D: SessionStore,
    E: SessionStore,
{
    /// Creates a routing store.
    pub fn new(durable: D, ephemeral: E) -> Self {
        Self { durable, ephemeral }
    }

    fn route(&self, key: SessionKey) -> &dyn SessionStore {
        if key.is_thread() {
            &self.ephemeral
        } else {
            &self.durable
        }
    }
}

#[async_trait]
impl<D, E> SessionStore for RoutingSessionStore<D, E>
where
    D: SessionStore,
    E: SessionStore,
{
    async fn get(&self, key: SessionKey) -> Result<Option<Session>, SessionError> {
        self.route(key).get(key).await
    }

    async fn create(&self, key: SessionKey) -> Result<Session, SessionError> {
        self.route(key).create(key).await
    }

    async fn append(&self, key: SessionKey, turns: Vec<Turn>) -> Result<(), SessionError> {
        self.route(key).append(key, turns).await
    }

    async fn delete(&self, key: SessionKey) -> Result<(), SessionError> {
        self.route(key).delete(key).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chat_relay_ai::Part;
    use chat_relay_core::ChannelId;

    fn thread_key() -> SessionKey {
        SessionKey::thread(ChannelId::new(100))
    }

    fn user(text: &str) -> Turn {
        Turn::user(vec![Part::text(text)])
    }

    #[tokio::test]
    async fn get_has_no_side_effect() {
        let store = InMemorySessionStore::new();
        assert_eq!(store.get(thread_key()).await.expect("get"), None);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn create_is_idempotent() {
        let store = InMemorySessionStore::new();
        let key = thread_key();

        store.create(key).await.expect("create");
        store
            .append(key, vec![user("hi"), Turn::model("hello")])
            .await
            .expect("append");

        let again = store.create(key).await.expect("create again");
        assert_eq!(again.len(), 2);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn appends_read_back_in_order() {
        let store = InMemorySessionStore::new();
        let key = thread_key();
        store.create(key).await.expect("create");

        store
            .append(key, vec![user("one"), Turn::model("two")])
            .await
            .expect("append");
        store
            .append(key, vec![user("three"), Turn::model("four")])
            .await
            .expect("append");

        let session = store.get(key).await.expect("get").expect("present");
        let texts: Vec<String> = session.turns().iter().map(Turn::text).collect();
        assert_eq!(texts, vec!["one", "two", "three", "four"]);
    }

    #[tokio::test]
    async fn model_turn_cannot_open_a_session() {
        let store = InMemorySessionStore::new();
        let key = thread_key();
        store.create(key).await.expect("create");

        let result = store.append(key, vec![Turn::model("hello")]).await;
        assert_eq!(result, Err(SessionError::InvalidTurnOrder { key }));

        let session = store.get(key).await.expect("get").expect("present");
        assert!(session.is_empty());
    }

    #[tokio::test]
    async fn model_turn_after_user_turn_is_fine() {
        let store = InMemorySessionStore::new();
        let key = thread_key();
        store.create(key).await.expect("create");
        store.append(key, vec![user("hi")]).await.expect("append");
        store
            .append(key, vec![Turn::model("hello")])
            .await
            .expect("append model");

        let session = store.get(key).await.expect("get").expect("present");
        assert_eq!(session.turns()[0].role, Role::User);
    }

    #[tokio::test]
    async fn append_to_absent_key_fails() {
        let store = InMemorySessionStore::new();
        let key = thread_key();
        let result = store.append(key, vec![user("hi")]).await;
        assert_eq!(result, Err(SessionError::NotFound { key }));
    }

    #[tokio::test]
    async fn delete_removes_session() {
        let store = InMemorySessionStore::new();
        let key = thread_key();
        store.create(key).await.expect("create");
        store.append(key, vec![user("hi")]).await.expect("append");

        store.delete(key).await.expect("delete");
        assert_eq!(store.get(key).await.expect("get"), None);

        let fresh = store.create(key).await.expect("create");
        assert!(fresh.is_empty());

        // Deleting twice is fine.
        store.delete(key).await.expect("delete");
        store.delete(key).await.expect("delete again");
    }

    #[tokio::test]
    async fn routing_by_scope() {
        let store = RoutingSessionStore::new(
            InMemorySessionStore::new(),
            InMemorySessionStore::new(),
        );
        let channel = SessionKey::channel(ChannelId::new(1));
        let thread = SessionKey::thread(ChannelId::new(2));

        store.create(channel).await.expect("create channel");
        store.create(thread).await.expect("create thread");
        store.create(thread).await.expect("create thread again");

        assert_eq!(store.durable.len(), 1);
        assert_eq!(store.ephemeral.len(), 1);
        assert!(store.durable.get(channel).await.expect("get").is_some());
        assert!(store.ephemeral.get(thread).await.expect("get").is_some());
    }

    #[test]
    fn from_turns_validates_first_turn() {
        let key = thread_key();
        assert!(Session::from_turns(key, vec![Turn::model("x")]).is_err());
        let session = Session::from_turns(key, vec![user("a"), Turn::model("b")]).expect("valid");
        assert_eq!(session.len(), 2);
    }
}
