//! Centralized bot configuration.
//!
//! Loaded via the `config` crate from environment variables, with `__`
//! separating nested keys (e.g. `DISCORD__TOKEN`, `GEMINI__API_KEY`,
//! `HISTORY__BASE_URL`, `ATTACHMENTS__TEMP_DIR`).

use chat_relay_ai::GeminiConfig;
use chat_relay_attachment::AttachmentConfig;
use chat_relay_history::HistoryConfig;
use serde::Deserialize;

/// Bot configuration composed from library configs.
#[derive(Debug, Deserialize)]
pub struct BotConfig {
    /// Discord connection and behavior.
    pub discord: DiscordConfig,

    /// Model backend.
    pub gemini: GeminiConfig,

    /// History service.
    pub history: HistoryConfig,

    /// Attachment handling.
    #[serde(default)]
    pub attachments: AttachmentConfig,
}

/// Discord-related configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DiscordConfig {
    /// Bot token.
    pub token: String,

    /// The bot only acts in channels under a category with this name.
    #[serde(default = "default_category")]
    pub category: String,

    /// Channel receiving welcome messages for new members.
    #[serde(default = "default_welcome_channel")]
    pub welcome_channel: String,

    /// Welcome text. `{user}` is replaced with the member's name.
    #[serde(default = "default_welcome_message")]
    pub welcome_message: String,

    /// Edit replies in place as the model streams them. When false, each
    /// reply is generated in one call and posted once complete.
    #[serde(default = "default_stream_replies")]
    pub stream_replies: bool,
}

fn default_category() -> String {
    "AI Chat".to_string()
}

fn default_welcome_channel() -> String {
    "general".to_string()
}

fn default_stream_replies() -> bool {
    true
}

fn default_welcome_message() -> String {
    "Hello, {user}!\nWelcome to the server! If you have any questions or need assistance, \
     feel free to ask me anything 🙂."
        .to_string()
}

impl BotConfig {
    /// Loads configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if required configuration is missing or invalid.
    pub fn from_env() -> Result<Self, config::ConfigError> {
        Self::from_environment(config::Environment::default())
    }

    fn from_environment(environment: config::Environment) -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(environment.separator("__").try_parsing(true))
            .build()?
            .try_deserialize()
    }
}
