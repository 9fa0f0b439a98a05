//! Inbound chat messages.

use chat_relay_attachment::AttachmentDescriptor;
use chat_relay_core::{MessageId, SessionKey, UserId};

/// A user message accepted for processing.
///
/// Bot-authored and out-of-scope messages are filtered before one of these
/// is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    /// Platform identifier of the message.
    pub id: MessageId,
    /// Who posted it.
    pub author: UserId,
    /// Conversation the message belongs to.
    pub key: SessionKey,
    /// Message text with mentions resolved to readable names.
    pub text: String,
    /// Attachments, in the order they were posted.
    pub attachments: Vec<AttachmentDescriptor>,
}

impl InboundMessage {
    /// Creates a text-only message.
    #[must_use]
    pub fn new(id: MessageId, author: UserId, key: SessionKey, text: impl Into<String>) -> Self {
        Self {
            id,
            author,
            key,
            text: text.into(),
            attachments: Vec::new(),
        }
    }

    /// Adds an attachment.
    #[must_use]
    pub fn with_attachment(mut self, attachment: AttachmentDescriptor) -> Self {
        self.attachments.push(attachment);
        self
    }

    /// Returns true if there is neither text nor any attachment.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty() && self.attachments.is_empty()
    }
}
