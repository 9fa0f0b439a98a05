//! Error types for the AI crate.
//!
//! Errors are designed for layered context using rootcause:
//! - `ModelError`: failures raised by a model backend or the file store

use std::fmt;

/// Errors from model backend operations.
///
/// Failures the model API reports structurally (HTTP status, block reasons)
/// keep that structure so they can be classified without string matching.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    /// The API answered with a non-success status.
    Api { status: u16, message: String },
    /// The prompt or the response was blocked by the model's policy.
    Blocked { reason: String },
    /// The request could not be sent or the response body could not be read.
    Transport { reason: String },
    /// A response body could not be decoded.
    Decode { reason: String },
    /// Uploading a file to the file store failed.
    Upload { reason: String },
    /// Invalid backend configuration.
    InvalidConfig { reason: String },
}

impl ModelError {
    /// The HTTP status carried by the error, if any.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// The block reason reported by the model, if any.
    #[must_use]
    pub fn block_reason(&self) -> Option<&str> {
        match self {
            Self::Blocked { reason } => Some(reason),
            _ => None,
        }
    }
}

impl fmt::Display for ModelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Api { status, message } => {
                write!(f, "model API returned {status}: {message}")
            }
            Self::Blocked { reason } => write!(f, "response blocked: {reason}"),
            Self::Transport { reason } => write!(f, "model request failed: {reason}"),
            Self::Decode { reason } => {
                write!(f, "failed to decode model response: {reason}")
            }
            Self::Upload { reason } => write!(f, "file upload failed: {reason}"),
            Self::InvalidConfig { reason } => {
                write!(f, "invalid model configuration: {reason}")
            }
        }
    }
}

impl std::error::Error for ModelError {}

impl From<reqwest::Error> for ModelError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => Self::Api {
                status: status.as_u16(),
                message: err.to_string(),
            },
            None => Self::Transport {
                reason: err.to_string(),
            },
        }
    }
}
