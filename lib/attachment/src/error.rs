//! Error types for the attachment crate.
//!
//! - `Rejection`: why an attachment was not turned into a model part
//! - `FetchError`: failures retrieving attachment bytes

use crate::media::ACCEPTED_EXTENSIONS;
use std::fmt;

/// Why an attachment was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    /// The media type is not accepted. Nothing was downloaded.
    UnsupportedFormat { filename: String },
    /// The attachment is only accepted inside a thread. Nothing was downloaded.
    RequiresThread { filename: String },
    /// Download, storage or upload failed.
    Io { filename: String, reason: String },
}

impl Rejection {
    /// The reply shown to the user.
    #[must_use]
    pub fn reply(&self) -> String {
        match self {
            Self::UnsupportedFormat { filename } => format!(
                "`{filename}` isn't a format I can read. Please send one of the following: {}.",
                ACCEPTED_EXTENSIONS.join(", ")
            ),
            Self::RequiresThread { filename } => format!(
                "PDF files like `{filename}` can only be discussed inside a thread. \
                 Please start a thread and send it there."
            ),
            Self::Io { filename, .. } => {
                format!("I couldn't process `{filename}`. Please try sending it again.")
            }
        }
    }

    /// Returns true if the rejection stops processing of the whole message.
    #[must_use]
    pub fn aborts_message(&self) -> bool {
        matches!(self, Self::RequiresThread { .. })
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnsupportedFormat { filename } => {
                write!(f, "unsupported attachment format: {filename}")
            }
            Self::RequiresThread { filename } => {
                write!(f, "attachment requires a thread: {filename}")
            }
            Self::Io { filename, reason } => {
                write!(f, "attachment '{filename}' failed: {reason}")
            }
        }
    }
}

impl std::error::Error for Rejection {}

/// Errors from retrieving attachment bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// The request could not be completed.
    Request { reason: String },
    /// The source answered with a non-success status.
    Status { status: u16 },
    /// Writing the local copy failed.
    Storage { reason: String },
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Request { reason } => write!(f, "download failed: {reason}"),
            Self::Status { status } => write!(f, "download returned status {status}"),
            Self::Storage { reason } => write!(f, "failed to store download: {reason}"),
        }
    }
}

impl std::error::Error for FetchError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_reply_lists_formats() {
        let rejection = Rejection::UnsupportedFormat {
            filename: "setup.exe".to_string(),
        };
        let reply = rejection.reply();
        assert!(reply.contains("setup.exe"));
        assert!(reply.contains("png, jpg, jpeg, webp, heic, heif, pdf"));
        assert!(!rejection.aborts_message());
    }

    #[test]
    fn thread_rejection_aborts() {
        let rejection = Rejection::RequiresThread {
            filename: "paper.pdf".to_string(),
        };
        assert!(rejection.aborts_message());
        assert!(rejection.reply().contains("thread"));
    }

    #[test]
    fn io_display_includes_reason() {
        let rejection = Rejection::Io {
            filename: "a.png".to_string(),
            reason: "download returned status 404".to_string(),
        };
        assert!(rejection.to_string().contains("404"));
        assert!(!rejection.reply().contains("404"));
    }
}
