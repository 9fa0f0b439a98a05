//! Per-session serialization of message processing.

use chat_relay_core::SessionKey;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

/// Default interval between cleanup runs (1 hour).
pub const DEFAULT_CLEANUP_INTERVAL: Duration = Duration::from_secs(3600);

/// Default max idle age before a lock is considered stale (2 hours).
pub const DEFAULT_MAX_IDLE_AGE: Duration = Duration::from_secs(7200);

type LockStorage = DashMap<SessionKey, (Arc<Mutex<()>>, Instant)>;

/// Per-key async mutex.
///
/// Messages for the same session are processed one after another so that a
/// cycle always reads the turns committed by the previous one. Different
/// sessions proceed concurrently.
#[derive(Clone, Default)]
pub struct KeyedLocks {
    locks: Arc<LockStorage>,
}

impl KeyedLocks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Gets or creates the lock for a key.
    pub fn get(&self, key: SessionKey) -> Arc<Mutex<()>> {
        let now = Instant::now();
        self.locks
            .entry(key)
            .and_modify(|(_, last_access)| *last_access = now)
            .or_insert_with(|| (Arc::new(Mutex::new(())), now))
            .0
            .clone()
    }

    /// Removes entries idle for longer than `max_age` that nobody holds.
    ///
    /// Returns the number of entries removed.
    pub fn cleanup_stale(&self, max_age: Duration) -> usize {
        let now = Instant::now();
        let before = self.locks.len();
        self.locks.retain(|_, (lock, last_access)| {
            Arc::strong_count(lock) > 1 || now.duration_since(*last_access) <= max_age
        });
        before.saturating_sub(self.locks.len())
    }

    /// Spawns a task that periodically removes stale entries.
    pub fn spawn_cleanup_task(self) {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(DEFAULT_CLEANUP_INTERVAL);
            loop {
                ticker.tick().await;
                let removed = self.cleanup_stale(DEFAULT_MAX_IDLE_AGE);
                if removed > 0 {
                    debug!(removed, remaining = self.len(), "cleaned up session locks");
                }
            }
        });
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chat_relay_core::ChannelId;

    fn key(id: u64) -> SessionKey {
        SessionKey::channel(ChannelId::new(id))
    }

    #[test]
    fn same_key_same_lock() {
        let locks = KeyedLocks::new();
        assert!(Arc::ptr_eq(&locks.get(key(1)), &locks.get(key(1))));
        assert!(!Arc::ptr_eq(&locks.get(key(1)), &locks.get(key(2))));
    }

    #[test]
    fn channel_and_thread_with_same_id_are_distinct() {
        let locks = KeyedLocks::new();
        let channel = locks.get(SessionKey::channel(ChannelId::new(5)));
        let thread = locks.get(SessionKey::thread(ChannelId::new(5)));
        assert!(!Arc::ptr_eq(&channel, &thread));
    }

    #[tokio::test]
    async fn same_key_serializes() {
        let locks = KeyedLocks::new();
        let lock = locks.get(key(1));
        let _guard = lock.try_lock().expect("first lock");

        let other = locks.get(key(1));
        assert!(other.try_lock().is_err());

        let unrelated = locks.get(key(2));
        assert!(unrelated.try_lock().is_ok());
    }

    #[test]
    fn cleanup_keeps_held_and_fresh_locks() {
        let locks = KeyedLocks::new();
        let old = Instant::now() - Duration::from_secs(10);
        locks
            .locks
            .insert(key(1), (Arc::new(Mutex::new(())), old));

        let held = Arc::new(Mutex::new(()));
        locks.locks.insert(key(2), (Arc::clone(&held), old));

        locks.get(key(3));

        let removed = locks.cleanup_stale(Duration::from_secs(5));
        assert_eq!(removed, 1);
        assert!(!locks.locks.contains_key(&key(1)));
        assert!(locks.locks.contains_key(&key(2)));
        assert!(locks.locks.contains_key(&key(3)));
    }
}
