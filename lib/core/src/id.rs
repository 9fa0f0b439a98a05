//! Strongly-typed ID types for domain entities.
//!
//! Platform entities (channels, users, messages) are identified by the chat
//! platform's 64-bit snowflakes. Processing cycles get a ULID so that log
//! lines from one inbound message can be correlated.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ulid::Ulid;

/// Error returned when parsing an ID from a string fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseIdError {
    /// The type of ID that failed to parse.
    pub id_type: &'static str,
    /// The reason for the parse failure.
    pub reason: String,
}

impl fmt::Display for ParseIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to parse {}: {}", self.id_type, self.reason)
    }
}

impl std::error::Error for ParseIdError {}

/// Macro to generate a strongly-typed wrapper around a platform snowflake.
macro_rules! define_snowflake {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(u64);

        impl $name {
            /// Wraps a raw snowflake.
            #[must_use]
            pub const fn new(raw: u64) -> Self {
                Self(raw)
            }

            /// Returns the raw snowflake.
            #[must_use]
            pub const fn get(&self) -> u64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = ParseIdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.trim()
                    .parse::<u64>()
                    .map(Self)
                    .map_err(|e| ParseIdError {
                        id_type: stringify!($name),
                        reason: e.to_string(),
                    })
            }
        }

        impl From<u64> for $name {
            fn from(raw: u64) -> Self {
                Self(raw)
            }
        }

        impl From<$name> for u64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

define_snowflake!(
    /// Identifier of a channel or thread on the chat platform.
    ChannelId
);

define_snowflake!(
    /// Identifier of a user on the chat platform.
    UserId
);

define_snowflake!(
    /// Identifier of a message on the chat platform.
    MessageId
);

/// Unique identifier for one message-processing cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CycleId(Ulid);

impl CycleId {
    /// Creates a new cycle ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for CycleId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CycleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cyc_{}", self.0)
    }
}

/// Which kind of chat context a session belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextScope {
    /// A top-level channel. Sessions are durable.
    Channel,
    /// A thread. Sessions live in process memory for the thread's lifetime.
    Thread,
}

impl ContextScope {
    /// Returns true for thread contexts.
    #[must_use]
    pub fn is_thread(&self) -> bool {
        matches!(self, Self::Thread)
    }
}

impl fmt::Display for ContextScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Channel => write!(f, "channel"),
            Self::Thread => write!(f, "thread"),
        }
    }
}

/// Key partitioning conversation state.
///
/// Inside a thread the key is the thread's own identifier; everywhere else
/// it is the channel's identifier. A thread keeps the same key for its whole
/// lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionKey {
    id: ChannelId,
    scope: ContextScope,
}

impl SessionKey {
    /// Key for a top-level channel.
    #[must_use]
    pub const fn channel(id: ChannelId) -> Self {
        Self {
            id,
            scope: ContextScope::Channel,
        }
    }

    /// Key for a thread.
    #[must_use]
    pub const fn thread(id: ChannelId) -> Self {
        Self {
            id,
            scope: ContextScope::Thread,
        }
    }

    /// Derives the key for a message posted to `channel_id`.
    ///
    /// On the chat platform a thread is itself a channel, so a message in a
    /// thread carries the thread's identifier as its channel.
    #[must_use]
    pub const fn resolve(channel_id: ChannelId, in_thread: bool) -> Self {
        if in_thread {
            Self::thread(channel_id)
        } else {
            Self::channel(channel_id)
        }
    }

    /// The identifier of the channel or thread.
    #[must_use]
    pub const fn id(&self) -> ChannelId {
        self.id
    }

    /// The scope of the context.
    #[must_use]
    pub const fn scope(&self) -> ContextScope {
        self.scope
    }

    /// Returns true if this key belongs to a thread.
    #[must_use]
    pub fn is_thread(&self) -> bool {
        self.scope.is_thread()
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.scope, self.id)
    }
}
