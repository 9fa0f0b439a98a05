//! Error types for the history client.

use std::fmt;

/// Errors from the history service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HistoryError {
    /// The request could not be completed.
    Request { reason: String },
    /// The service answered with an unexpected status.
    Status { status: u16, body: String },
    /// The response body could not be decoded.
    Decode { reason: String },
}

impl fmt::Display for HistoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Request { reason } => write!(f, "history request failed: {reason}"),
            Self::Status { status, body } => {
                write!(f, "history service returned {status}: {body}")
            }
            Self::Decode { reason } => {
                write!(f, "failed to decode history response: {reason}")
            }
        }
    }
}

impl std::error::Error for HistoryError {}

impl From<reqwest::Error> for HistoryError {
    fn from(e: reqwest::Error) -> Self {
        Self::Request {
            reason: e.to_string(),
        }
    }
}
