//! Error types for the conversation crate.
//!
//! Errors are designed for layered context using rootcause:
//! - `SessionError`: Errors from session store operations
//! - `OutputError`: Errors from the chat surface
//! - `StreamError`: Errors while streaming a reply
//! - `ConversationError`: High-level wrapper for a processing cycle

use chat_relay_ai::ModelError;
use chat_relay_core::SessionKey;
use std::fmt;

/// Errors from session store operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// No session exists for the key.
    NotFound { key: SessionKey },
    /// The append would make a model turn the first turn of the session.
    InvalidTurnOrder { key: SessionKey },
    /// The backing store failed.
    Unavailable { reason: String },
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound { key } => write!(f, "session not found: {key}"),
            Self::InvalidTurnOrder { key } => {
                write!(f, "session {key} must start with a user turn")
            }
            Self::Unavailable { reason } => {
                write!(f, "session storage unavailable: {reason}")
            }
        }
    }
}

impl std::error::Error for SessionError {}

/// A send or edit on the chat surface failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputError {
    pub reason: String,
}

impl OutputError {
    /// Creates an output error.
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl fmt::Display for OutputError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "chat output failed: {}", self.reason)
    }
}

impl std::error::Error for OutputError {}

/// Errors while streaming a reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamError {
    /// The fragment source failed. `visible` is false if nothing but the
    /// placeholder had been shown.
    Source { error: ModelError, visible: bool },
    /// Writing to an output slot failed.
    Sink(OutputError),
}

impl fmt::Display for StreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Source { error, .. } => write!(f, "reply stream failed: {error}"),
            Self::Sink(e) => write!(f, "reply delivery failed: {e}"),
        }
    }
}

impl std::error::Error for StreamError {}

impl From<OutputError> for StreamError {
    fn from(e: OutputError) -> Self {
        Self::Sink(e)
    }
}

/// High-level conversation errors.
///
/// Use these to add context when wrapping lower-level errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversationError {
    /// Reading or writing the session failed.
    Session { key: SessionKey, reason: String },
    /// Replying on the chat surface failed.
    Output { key: SessionKey, reason: String },
}

impl ConversationError {
    pub(crate) fn session(key: SessionKey, error: &SessionError) -> Self {
        Self::Session {
            key,
            reason: error.to_string(),
        }
    }

    pub(crate) fn output(key: SessionKey, error: &impl fmt::Display) -> Self {
        Self::Output {
            key,
            reason: error.to_string(),
        }
    }
}

impl fmt::Display for ConversationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Session { key, reason } => {
                write!(f, "session operation failed for {key}: {reason}")
            }
            Self::Output { key, reason } => {
                write!(f, "reply failed for {key}: {reason}")
            }
        }
    }
}

impl std::error::Error for ConversationError {}
