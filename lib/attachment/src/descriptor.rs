//! Attachment descriptors as received from the chat platform.

/// An attachment on an inbound message.
///
/// Descriptors are transient: they live for one message-processing cycle and
/// are never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentDescriptor {
    /// Where the attachment can be downloaded.
    pub url: String,
    /// Content type declared by the platform, if any.
    pub content_type: Option<String>,
    /// Original filename.
    pub filename: String,
}

impl AttachmentDescriptor {
    /// Creates a descriptor without a declared content type.
    #[must_use]
    pub fn new(url: impl Into<String>, filename: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            content_type: None,
            filename: filename.into(),
        }
    }

    /// Sets the declared content type.
    #[must_use]
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// The lowercase extension of the filename, if any.
    #[must_use]
    pub fn extension(&self) -> Option<String> {
        let name = self.filename.rsplit(['/', '\\']).next()?;
        let (stem, ext) = name.rsplit_once('.')?;
        if stem.is_empty() || ext.is_empty() {
            return None;
        }
        Some(ext.to_ascii_lowercase())
    }
}
