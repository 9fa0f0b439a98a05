//! Which chat contexts the bot acts in.

use chat_relay_core::{ChannelId, SessionKey};

/// Admits contexts filed under the designated category.
#[derive(Debug, Clone)]
pub struct ContextGate {
    category: String,
}

/// Where a message was posted, as seen by the gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedContext {
    /// Session the message belongs to.
    pub key: SessionKey,
    /// Name of the enclosing category, if any. For a thread this is the
    /// parent channel's category.
    pub category: Option<String>,
}

impl ResolvedContext {
    #[must_use]
    pub fn new(channel_id: ChannelId, in_thread: bool, category: Option<String>) -> Self {
        Self {
            key: SessionKey::resolve(channel_id, in_thread),
            category,
        }
    }
}

impl ContextGate {
    #[must_use]
    pub fn new(category: impl Into<String>) -> Self {
        Self {
            category: category.into(),
        }
    }

    /// Returns true if the bot should act in this context.
    #[must_use]
    pub fn admits(&self, context: &ResolvedContext) -> bool {
        context
            .category
            .as_deref()
            .is_some_and(|name| name.trim().eq_ignore_ascii_case(self.category.trim()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admits_matching_category() {
        let gate = ContextGate::new("AI Chat");
        let channel = ResolvedContext::new(ChannelId::new(1), false, Some("AI Chat".into()));
        let thread = ResolvedContext::new(ChannelId::new(2), true, Some("ai chat".into()));

        assert!(gate.admits(&channel));
        assert!(gate.admits(&thread));
        assert!(thread.key.is_thread());
        assert!(!channel.key.is_thread());
    }

    #[test]
    fn rejects_other_or_missing_category() {
        let gate = ContextGate::new("AI Chat");
        assert!(!gate.admits(&ResolvedContext::new(
            ChannelId::new(1),
            false,
            Some("Off Topic".into())
        )));
        assert!(!gate.admits(&ResolvedContext::new(ChannelId::new(1), false, None)));
    }
}
