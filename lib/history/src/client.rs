//! REST client for the history service.
//!
//! Routes:
//! - `GET /chats/{id}`, `POST /chats/`, `PATCH /chats/{id}`, `DELETE /chats/{id}`
//! - `GET /bots`, `POST /bots/` for the global personality

use crate::error::HistoryError;
use crate::wire::{BotRecord, ChatRecord, ChatUpdate, strip_metadata};
use chat_relay_ai::Turn;
use reqwest::StatusCode;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};

/// Configuration for the history client.
#[derive(Debug, Clone, Deserialize)]
pub struct HistoryConfig {
    /// Base URL of the service, e.g. `http://localhost:3000`.
    pub base_url: String,
    /// Personality stored when the service has none.
    #[serde(default)]
    pub default_personality: Option<String>,
}

impl HistoryConfig {
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            default_personality: None,
        }
    }
}

/// Client for the history service.
#[derive(Debug, Clone)]
pub struct HistoryClient {
    http: reqwest::Client,
    base_url: String,
}

impl HistoryClient {
    /// Creates a client.
    #[must_use]
    pub fn new(http: reqwest::Client, config: &HistoryConfig) -> Self {
        Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.base_url)
    }

    /// Fetches a chat. Returns `None` if the service has no such chat.
    #[instrument(skip(self))]
    pub async fn get_chat(&self, id: &str) -> Result<Option<ChatRecord>, HistoryError> {
        let response = self.http.get(self.url(&format!("chats/{id}"))).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = check_status(response).await?;
        decode(response).await.map(Some)
    }

    /// Creates a chat with the given history.
    #[instrument(skip(self, history), fields(turns = history.len()))]
    pub async fn create_chat(&self, id: &str, history: &[Turn]) -> Result<(), HistoryError> {
        let body = ChatRecord {
            id: id.to_string(),
            history: history.to_vec(),
        };
        let response = self.http.post(self.url("chats/")).json(&body).send().await?;
        check_status(response).await?;
        debug!("chat created");
        Ok(())
    }

    /// Replaces the stored history of a chat.
    #[instrument(skip(self, history), fields(turns = history.len()))]
    pub async fn update_chat(&self, id: &str, history: &[Turn]) -> Result<(), HistoryError> {
        let response = self
            .http
            .patch(self.url(&format!("chats/{id}")))
            .json(&ChatUpdate { history })
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }

    /// Deletes a chat. Deleting an absent chat succeeds.
    #[instrument(skip(self))]
    pub async fn delete_chat(&self, id: &str) -> Result<(), HistoryError> {
        let response = self
            .http
            .delete(self.url(&format!("chats/{id}")))
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }
        check_status(response).await?;
        Ok(())
    }

    /// Reads the stored personality, if any.
    #[instrument(skip(self))]
    pub async fn get_personality(&self) -> Result<Option<String>, HistoryError> {
        let response = self.http.get(self.url("bots")).send().await?;
        let response = check_status(response).await?;
        let bots: Vec<BotRecord> = decode(response).await?;
        Ok(bots.into_iter().next().map(|bot| bot.personality))
    }

    /// Stores the personality.
    #[instrument(skip(self, personality))]
    pub async fn create_personality(&self, personality: &str) -> Result<(), HistoryError> {
        let body = BotRecord {
            personality: personality.to_string(),
        };
        let response = self.http.post(self.url("bots/")).json(&body).send().await?;
        check_status(response).await?;
        Ok(())
    }

    /// Loads the personality, storing `default` first if none exists.
    ///
    /// Returns `None` if the service has none and no default is given.
    pub async fn bootstrap_personality(
        &self,
        default: Option<&str>,
    ) -> Result<Option<String>, HistoryError> {
        if let Some(personality) = self.get_personality().await? {
            return Ok(Some(personality));
        }
        let Some(default) = default else {
            return Ok(None);
        };
        self.create_personality(default).await?;
        debug!("stored default personality");
        Ok(Some(default.to_string()))
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, HistoryError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(HistoryError::Status {
        status: status.as_u16(),
        body,
    })
}

async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, HistoryError> {
    let mut value: serde_json::Value = response.json().await.map_err(|e| HistoryError::Decode {
        reason: e.to_string(),
    })?;
    strip_metadata(&mut value);
    serde_json::from_value(value).map_err(|e| HistoryError::Decode {
        reason: e.to_string(),
    })
}
