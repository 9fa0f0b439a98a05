use chat_relay_bot::config::BotConfig;
use chat_relay_bot::error::BotError;
use rootcause::Report;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Report<BotError>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,chat_relay=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = BotConfig::from_env().map_err(|e| BotError::Config {
        reason: e.to_string(),
    })?;
    tracing::info!("Loaded configuration");

    chat_relay_bot::run(config).await
}
