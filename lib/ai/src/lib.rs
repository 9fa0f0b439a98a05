//! Generative model primitives for chat-relay.
//!
//! This crate provides:
//!
//! - **Content model**: role-tagged turns made of text, inline and remote parts
//! - **Backends**: the `ModelBackend` and `FileUploader` traits and a Gemini
//!   implementation of both
//! - **Error classification**: mapping model failures onto the fixed set of
//!   user-facing categories

pub mod backend;
pub mod classify;
pub mod content;
pub mod error;
pub mod gemini;
pub mod sse;

pub use backend::{FileUploader, ModelBackend, ModelRequest, TextStream, UploadedFile};
pub use classify::{ErrorCategory, FALLBACK_REPLY};
pub use content::{FileData, InlineData, Part, Role, Turn};
pub use error::ModelError;
pub use gemini::{GeminiBackend, GeminiConfig};
