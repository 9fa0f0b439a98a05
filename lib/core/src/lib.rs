//! Core domain types and utilities for chat-relay.
//!
//! This crate provides the identifiers and error handling shared by the
//! conversation, attachment, model and history crates.

pub mod error;
pub mod id;

pub use error::Result;
pub use id::{ChannelId, ContextScope, CycleId, MessageId, ParseIdError, SessionKey, UserId};
