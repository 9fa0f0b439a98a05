//! Domain error types for the bot binary.

use std::fmt;

/// Errors that stop the bot.
#[derive(Debug)]
pub enum BotError {
    /// Configuration is missing or invalid.
    Config { reason: String },
    /// The model backend could not be created.
    Model { reason: String },
    /// The Discord gateway failed.
    Gateway { reason: String },
}

impl fmt::Display for BotError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config { reason } => write!(f, "invalid configuration: {reason}"),
            Self::Model { reason } => write!(f, "model backend unavailable: {reason}"),
            Self::Gateway { reason } => write!(f, "discord gateway failed: {reason}"),
        }
    }
}

impl std::error::Error for BotError {}
