//! Conversation handling for chat-relay.
//!
//! This crate provides:
//!
//! - **Session Store**: ordered turn history per chat context
//! - **Response Streamer**: paces streamed model text into chat messages
//! - **Orchestrator**: one message-processing cycle from inbound message to
//!   committed turns

pub mod error;
pub mod lock;
pub mod message;
pub mod orchestrator;
pub mod session;
pub mod streamer;

pub use error::{ConversationError, OutputError, SessionError, StreamError};
pub use lock::KeyedLocks;
pub use message::InboundMessage;
pub use orchestrator::{ConversationOrchestrator, Outcome, ReplySurface};
pub use session::{InMemorySessionStore, RoutingSessionStore, Session, SessionStore};
pub use streamer::{MESSAGE_CHAR_LIMIT, OutputSink, ResponseStreamer};
