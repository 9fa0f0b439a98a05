//! Model backend abstraction.
//!
//! Provides a unified interface over the generative model and its file store
//! so that the conversation layer can be driven by in-memory fakes in tests.

use crate::content::{Part, Turn};
use crate::error::ModelError;
use async_trait::async_trait;
use futures::Stream;
use std::path::Path;
use std::pin::Pin;

/// A lazy, finite sequence of text fragments produced by a streaming call.
pub type TextStream = Pin<Box<dyn Stream<Item = Result<String, ModelError>> + Send>>;

/// A request to the model.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModelRequest {
    /// System instruction (the bot personality), if any.
    pub system_instruction: Option<String>,
    /// Prior turns of the conversation, oldest first.
    pub history: Vec<Turn>,
    /// Parts of the new user turn.
    pub parts: Vec<Part>,
}

impl ModelRequest {
    /// Creates a request for the given user parts.
    #[must_use]
    pub fn new(parts: Vec<Part>) -> Self {
        Self {
            system_instruction: None,
            history: Vec::new(),
            parts,
        }
    }

    /// Adds a system instruction.
    #[must_use]
    pub fn with_system_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.system_instruction = Some(instruction.into());
        self
    }

    /// Adds prior turns.
    #[must_use]
    pub fn with_history(mut self, history: Vec<Turn>) -> Self {
        self.history = history;
        self
    }

    /// The full content list: prior turns followed by the new user turn.
    #[must_use]
    pub fn contents(&self) -> Vec<Turn> {
        let mut contents = self.history.clone();
        contents.push(Turn::user(self.parts.clone()));
        contents
    }
}

/// Trait for model backends.
#[async_trait]
pub trait ModelBackend: Send + Sync {
    /// Generates a complete response for the request.
    ///
    /// # Errors
    ///
    /// Returns an error if the call fails or the response is blocked.
    async fn generate(&self, request: &ModelRequest) -> Result<String, ModelError>;

    /// Starts a streaming response.
    ///
    /// Errors raised after the stream has started are yielded by the stream.
    ///
    /// # Errors
    ///
    /// Returns an error if the request is rejected before streaming begins.
    async fn generate_stream(&self, request: &ModelRequest) -> Result<TextStream, ModelError>;

    /// Returns the model name.
    fn model(&self) -> &str;
}

/// A file accepted by the model's file store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    /// URI to reference the file in requests.
    pub uri: String,
    /// Media type confirmed by the store.
    pub mime_type: String,
}

/// Trait for uploading local files to the model's file store.
#[async_trait]
pub trait FileUploader: Send + Sync {
    /// Uploads the file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or the store rejects it.
    async fn upload(
        &self,
        path: &Path,
        mime_type: &str,
        display_name: &str,
    ) -> Result<UploadedFile, ModelError>;
}
