//! Classification of model failures into user-facing categories.

use crate::error::ModelError;
use std::fmt;

/// Reply sent when a failure matches no known category.
pub const FALLBACK_REPLY: &str =
    "Something went wrong while I was generating a reply. Please try again.";

/// User-facing category of a model failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// The model is overloaded (HTTP 503).
    RateLimited,
    /// The API quota is exhausted (HTTP 429).
    QuotaExceeded,
    /// The reply was stopped for reciting existing material.
    ContentBlockedRecitation,
    /// The prompt or reply was stopped by the safety filter.
    ContentBlockedSafety,
    /// Anything else.
    Unclassified,
}

impl ErrorCategory {
    /// Classifies a model error.
    ///
    /// The HTTP status wins, then the structured block reason. Matching on the
    /// message text is the fallback for failures the API does not expose
    /// structurally.
    #[must_use]
    pub fn classify(error: &ModelError) -> Self {
        match error.status() {
            Some(503) => return Self::RateLimited,
            Some(429) => return Self::QuotaExceeded,
            _ => {}
        }

        if let Some(category) = error.block_reason().and_then(Self::from_marker) {
            return category;
        }

        Self::from_marker(&error.to_string()).unwrap_or(Self::Unclassified)
    }

    fn from_marker(text: &str) -> Option<Self> {
        if text.contains("RECITATION") {
            Some(Self::ContentBlockedRecitation)
        } else if text.contains("SAFETY") {
            Some(Self::ContentBlockedSafety)
        } else {
            None
        }
    }

    /// The fixed reply for this category. `Unclassified` has none.
    #[must_use]
    pub fn reply(&self) -> Option<&'static str> {
        match self {
            Self::RateLimited => Some(
                "The model is overloaded right now. Please wait a moment and try again.",
            ),
            Self::QuotaExceeded => Some(
                "I've used up my request quota for now. Please try again later.",
            ),
            Self::ContentBlockedRecitation => Some(
                "I can't answer that because my reply would recite existing material too closely.",
            ),
            Self::ContentBlockedSafety => Some(
                "I can't respond to that because it was flagged by the safety filter.",
            ),
            Self::Unclassified => None,
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::RateLimited => "rate_limited",
            Self::QuotaExceeded => "quota_exceeded",
            Self::ContentBlockedRecitation => "content_blocked_recitation",
            Self::ContentBlockedSafety => "content_blocked_safety",
            Self::Unclassified => "unclassified",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api(status: u16, message: &str) -> ModelError {
        ModelError::Api {
            status,
            message: message.to_string(),
        }
    }

    #[test]
    fn status_503_is_rate_limited() {
        assert_eq!(
            ErrorCategory::classify(&api(503, "Service Unavailable")),
            ErrorCategory::RateLimited
        );
    }

    #[test]
    fn status_429_is_quota_exceeded() {
        assert_eq!(
            ErrorCategory::classify(&api(429, "Resource has been exhausted")),
            ErrorCategory::QuotaExceeded
        );
    }

    #[test]
    fn status_takes_precedence_over_message() {
        assert_eq!(
            ErrorCategory::classify(&api(429, "SAFETY")),
            ErrorCategory::QuotaExceeded
        );
    }

    #[test]
    fn structured_block_reasons() {
        let recitation = ModelError::Blocked {
            reason: "RECITATION".to_string(),
        };
        let safety = ModelError::Blocked {
            reason: "SAFETY".to_string(),
        };
        assert_eq!(
            ErrorCategory::classify(&recitation),
            ErrorCategory::ContentBlockedRecitation
        );
        assert_eq!(
            ErrorCategory::classify(&safety),
            ErrorCategory::ContentBlockedSafety
        );
    }

    #[test]
    fn message_text_is_the_fallback() {
        let err = ModelError::Transport {
            reason: "candidate was blocked due to SAFETY".to_string(),
        };
        assert_eq!(
            ErrorCategory::classify(&err),
            ErrorCategory::ContentBlockedSafety
        );

        let err = api(400, "[GoogleGenerativeAI Error]: RECITATION");
        assert_eq!(
            ErrorCategory::classify(&err),
            ErrorCategory::ContentBlockedRecitation
        );
    }

    #[test]
    fn unknown_errors_are_unclassified() {
        let err = api(500, "internal error");
        let category = ErrorCategory::classify(&err);
        assert_eq!(category, ErrorCategory::Unclassified);
        assert!(category.reply().is_none());
    }

    #[test]
    fn every_known_category_has_a_distinct_reply() {
        let replies: std::collections::HashSet<_> = [
            ErrorCategory::RateLimited,
            ErrorCategory::QuotaExceeded,
            ErrorCategory::ContentBlockedRecitation,
            ErrorCategory::ContentBlockedSafety,
        ]
        .iter()
        .map(|c| c.reply().expect("known category has a reply"))
        .collect();
        assert_eq!(replies.len(), 4);
    }
}
