//! Discord front end for chat-relay.
//!
//! Wires the Discord gateway to the conversation orchestrator, the Gemini
//! backend and the history service.

pub mod config;
pub mod discord;
pub mod error;
pub mod gate;
pub mod welcome;

use crate::config::BotConfig;
use crate::discord::{BotOrchestrator, Handler};
use crate::error::BotError;
use chat_relay_ai::GeminiBackend;
use chat_relay_attachment::{AttachmentIngestor, HttpFetcher};
use chat_relay_conversation::{ConversationOrchestrator, InMemorySessionStore, RoutingSessionStore};
use chat_relay_history::{HistoryClient, RemoteSessionStore};
use rootcause::Report;
use serenity::all::GatewayIntents;
use serenity::Client;
use std::sync::Arc;
use tracing::{info, warn};

/// Builds the bot from configuration and runs it until shutdown.
///
/// # Errors
///
/// Returns an error if a backend cannot be constructed or the gateway
/// connection fails.
pub async fn run(config: BotConfig) -> Result<(), Report<BotError>> {
    let http = reqwest::Client::new();

    let gemini = GeminiBackend::new(http.clone(), config.gemini.clone()).map_err(|e| {
        BotError::Model {
            reason: e.to_string(),
        }
    })?;
    info!(model = %config.gemini.model, "model backend ready");

    let history = HistoryClient::new(http.clone(), &config.history);
    let personality = match history
        .bootstrap_personality(config.history.default_personality.as_deref())
        .await
    {
        Ok(personality) => personality,
        Err(e) => {
            warn!(error = %e, "failed to load personality; continuing without one");
            None
        }
    };

    let store = RoutingSessionStore::new(
        RemoteSessionStore::new(history),
        InMemorySessionStore::new(),
    );
    let ingestor = AttachmentIngestor::new(
        HttpFetcher::new(http),
        gemini.clone(),
        config.attachments.clone(),
    );

    let mut orchestrator: BotOrchestrator = ConversationOrchestrator::new(store, gemini, ingestor)
        .with_streaming(config.discord.stream_replies);
    if let Some(personality) = personality {
        info!("personality loaded");
        orchestrator = orchestrator.with_system_instruction(personality);
    }
    orchestrator.locks().clone().spawn_cleanup_task();

    let handler = Handler::new(Arc::new(orchestrator), &config.discord);
    let intents = GatewayIntents::GUILDS
        | GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::GUILD_MEMBERS
        | GatewayIntents::MESSAGE_CONTENT;

    let mut client = Client::builder(&config.discord.token, intents)
        .event_handler(handler)
        .await
        .map_err(|e| BotError::Gateway {
            reason: e.to_string(),
        })?;

    let shard_manager = client.shard_manager.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutting down");
            shard_manager.shutdown_all().await;
        }
    });

    client.start().await.map_err(|e| BotError::Gateway {
        reason: e.to_string(),
    })?;
    Ok(())
}
