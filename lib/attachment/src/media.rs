//! Media type classification.

use crate::descriptor::AttachmentDescriptor;
use std::fmt;

/// Extensions listed to users when a format is rejected.
pub const ACCEPTED_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "webp", "heic", "heif", "pdf"];

/// A media type the model accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaType {
    Png,
    Jpeg,
    Webp,
    Heic,
    Heif,
    Pdf,
}

/// How an accepted media type is delivered to the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    /// Embedded inline in the request.
    Image,
    /// Uploaded to the file store and referenced by URI.
    Document,
}

impl MediaKind {
    /// Name of the temporary subfolder for this kind.
    #[must_use]
    pub fn dir_name(&self) -> &'static str {
        match self {
            Self::Image => "images",
            Self::Document => "documents",
        }
    }
}

impl MediaType {
    /// Classifies an attachment.
    ///
    /// The declared content type decides when present; otherwise the
    /// filename's extension does.
    #[must_use]
    pub fn classify(descriptor: &AttachmentDescriptor) -> Option<Self> {
        match descriptor.content_type.as_deref() {
            Some(declared) if !declared.trim().is_empty() => Self::from_mime(declared),
            _ => descriptor.extension().and_then(|ext| Self::from_extension(&ext)),
        }
    }

    /// Parses a content type, ignoring parameters such as `; charset=`.
    #[must_use]
    pub fn from_mime(content_type: &str) -> Option<Self> {
        let essence = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        match essence.as_str() {
            "image/png" => Some(Self::Png),
            "image/jpeg" | "image/jpg" => Some(Self::Jpeg),
            "image/webp" => Some(Self::Webp),
            "image/heic" => Some(Self::Heic),
            "image/heif" => Some(Self::Heif),
            "application/pdf" => Some(Self::Pdf),
            _ => None,
        }
    }

    /// Maps a lowercase file extension.
    #[must_use]
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "png" => Some(Self::Png),
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "webp" => Some(Self::Webp),
            "heic" => Some(Self::Heic),
            "heif" => Some(Self::Heif),
            "pdf" => Some(Self::Pdf),
            _ => None,
        }
    }

    /// The canonical media type string.
    #[must_use]
    pub fn mime(&self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::Webp => "image/webp",
            Self::Heic => "image/heic",
            Self::Heif => "image/heif",
            Self::Pdf => "application/pdf",
        }
    }

    /// How the media reaches the model.
    #[must_use]
    pub fn kind(&self) -> MediaKind {
        match self {
            Self::Pdf => MediaKind::Document,
            _ => MediaKind::Image,
        }
    }

    /// PDFs are only accepted inside threads.
    #[must_use]
    pub fn requires_thread(&self) -> bool {
        matches!(self.kind(), MediaKind::Document)
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mime())
    }
}
