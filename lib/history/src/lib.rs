//! Client for the history persistence service.
//!
//! This crate provides:
//!
//! - **History Client**: REST access to stored chats and the bot personality
//! - **Remote Session Store**: durable [`SessionStore`] for channel contexts
//!
//! [`SessionStore`]: chat_relay_conversation::SessionStore

pub mod client;
pub mod error;
pub mod store;
pub mod wire;

#[cfg(test)]
mod fake;

pub use client::{HistoryClient, HistoryConfig};
pub use error::HistoryError;
pub use store::RemoteSessionStore;
