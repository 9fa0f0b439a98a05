//! Discord gateway wiring using serenity.

use crate::config::DiscordConfig;
use crate::gate::{ContextGate, ResolvedContext};
use crate::welcome;
use async_trait::async_trait;
use chat_relay_ai::GeminiBackend;
use chat_relay_attachment::{AttachmentDescriptor, AttachmentIngestor, HttpFetcher};
use chat_relay_conversation::{
    ConversationOrchestrator, InMemorySessionStore, InboundMessage, OutputError, OutputSink,
    ReplySurface, RoutingSessionStore,
};
use chat_relay_core::{ChannelId, MessageId, SessionKey, UserId};
use chat_relay_history::RemoteSessionStore;
use serenity::all::{
    Attachment, Channel, ChannelType, Context, CreateMessage, EditMessage, EventHandler,
    GuildChannel, Member, Message, PartialGuildChannel, Ready,
};
use serenity::http::{Http, Typing};
use serenity::model::id::{ChannelId as DiscordChannelId, MessageId as DiscordMessageId};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// The orchestrator as wired for production.
pub type BotOrchestrator = ConversationOrchestrator<
    RoutingSessionStore<RemoteSessionStore, InMemorySessionStore>,
    GeminiBackend,
    AttachmentIngestor<HttpFetcher, GeminiBackend>,
>;

/// Serenity event handler.
pub struct Handler {
    orchestrator: Arc<BotOrchestrator>,
    gate: ContextGate,
    welcome_channel: String,
    welcome_message: String,
}

impl Handler {
    #[must_use]
    pub fn new(orchestrator: Arc<BotOrchestrator>, config: &DiscordConfig) -> Self {
        Self {
            orchestrator,
            gate: ContextGate::new(config.category.clone()),
            welcome_channel: config.welcome_channel.clone(),
            welcome_message: config.welcome_message.clone(),
        }
    }

    async fn forget(&self, key: SessionKey) {
        if let Err(report) = self.orchestrator.forget(key).await {
            error!(%key, error = %report, "failed to forget session");
        }
    }
}

#[async_trait]
impl EventHandler for Handler {
    async fn ready(&self, _ctx: Context, ready: Ready) {
        info!(
            user = %ready.user.name,
            user_id = %ready.user.id,
            "Discord bot connected"
        );
    }

    async fn message(&self, ctx: Context, msg: Message) {
        // Skip bot messages to avoid loops
        if msg.author.bot || msg.guild_id.is_none() {
            return;
        }

        let Some(context) = resolve_context(&ctx, msg.channel_id).await else {
            debug!(channel = %msg.channel_id, "could not resolve channel");
            return;
        };
        if !self.gate.admits(&context) {
            return;
        }

        let inbound = InboundMessage {
            id: MessageId::new(msg.id.get()),
            author: UserId::new(msg.author.id.get()),
            key: context.key,
            text: msg.content_safe(&ctx.cache),
            attachments: msg.attachments.iter().map(descriptor).collect(),
        };
        if inbound.is_empty() {
            return;
        }

        let mut surface = DiscordSurface::new(ctx.http.clone(), msg.channel_id, msg.id);
        match self.orchestrator.handle(inbound, &mut surface).await {
            Ok(outcome) => debug!(?outcome, "message handled"),
            Err(report) => error!(error = %report, "message handling failed"),
        }
    }

    async fn channel_delete(
        &self,
        _ctx: Context,
        channel: GuildChannel,
        _messages: Option<Vec<Message>>,
    ) {
        if matches!(channel.kind, ChannelType::Text | ChannelType::News) {
            self.forget(SessionKey::channel(ChannelId::new(channel.id.get())))
                .await;
        }
    }

    async fn thread_delete(
        &self,
        _ctx: Context,
        thread: PartialGuildChannel,
        _full_thread_data: Option<GuildChannel>,
    ) {
        self.forget(SessionKey::thread(ChannelId::new(thread.id.get())))
            .await;
    }

    async fn guild_member_addition(&self, ctx: Context, new_member: Member) {
        let channels = match new_member.guild_id.channels(&ctx.http).await {
            Ok(channels) => channels,
            Err(e) => {
                warn!(error = %e, "failed to list guild channels");
                return;
            }
        };

        let Some(channel) = channels.values().find(|c| {
            c.kind == ChannelType::Text && welcome::is_welcome_channel(&c.name, &self.welcome_channel)
        }) else {
            debug!(channel = %self.welcome_channel, "no welcome channel");
            return;
        };

        let content = welcome::render(&self.welcome_message, &new_member.user.name);
        if let Err(e) = channel
            .id
            .send_message(&ctx.http, CreateMessage::new().content(content))
            .await
        {
            warn!(error = %e, "failed to send welcome message");
        }
    }
}

fn is_thread(kind: ChannelType) -> bool {
    matches!(
        kind,
        ChannelType::PublicThread | ChannelType::PrivateThread | ChannelType::NewsThread
    )
}

async fn guild_channel(ctx: &Context, id: DiscordChannelId) -> Option<GuildChannel> {
    id.to_channel(ctx).await.ok().and_then(Channel::guild)
}

/// Finds the session key and enclosing category of a channel or thread.
async fn resolve_context(ctx: &Context, channel_id: DiscordChannelId) -> Option<ResolvedContext> {
    let channel = guild_channel(ctx, channel_id).await?;
    let in_thread = is_thread(channel.kind);

    let holder = if in_thread {
        guild_channel(ctx, channel.parent_id?).await?
    } else {
        channel
    };

    let category = match holder.parent_id {
        Some(id) => guild_channel(ctx, id).await.map(|c| c.name),
        None => None,
    };

    Some(ResolvedContext::new(
        ChannelId::new(channel_id.get()),
        in_thread,
        category,
    ))
}

fn descriptor(attachment: &Attachment) -> AttachmentDescriptor {
    AttachmentDescriptor {
        url: attachment.url.clone(),
        content_type: attachment.content_type.clone(),
        filename: attachment.filename.clone(),
    }
}

/// Reply surface for one inbound Discord message.
///
/// The first slot is sent as a reply to the inbound message; later slots
/// are posted to the same channel. The typing indicator runs until the first
/// slot is opened, so standalone replies such as attachment rejections do
/// not end it.
pub struct DiscordSurface {
    http: Arc<Http>,
    channel: DiscordChannelId,
    origin: DiscordMessageId,
    slot: Option<DiscordMessageId>,
    typing: Option<Typing>,
}

impl DiscordSurface {
    #[must_use]
    pub fn new(http: Arc<Http>, channel: DiscordChannelId, origin: DiscordMessageId) -> Self {
        Self {
            http,
            channel,
            origin,
            slot: None,
            typing: None,
        }
    }

    fn stop_typing(&mut self) {
        if let Some(typing) = self.typing.take() {
            typing.stop();
        }
    }

    async fn send(&self, content: &str, as_reply: bool) -> Result<DiscordMessageId, OutputError> {
        let mut builder = CreateMessage::new().content(content);
        if as_reply {
            builder = builder.reference_message((self.channel, self.origin));
        }
        let message = self
            .channel
            .send_message(&self.http, builder)
            .await
            .map_err(|e| OutputError::new(e.to_string()))?;
        Ok(message.id)
    }
}

#[async_trait]
impl OutputSink for DiscordSurface {
    async fn create_slot(&mut self, content: &str) -> Result<(), OutputError> {
        let first = self.slot.is_none();
        if first {
            self.stop_typing();
        }
        let id = self.send(content, first).await?;
        self.slot = Some(id);
        Ok(())
    }

    async fn update_slot(&mut self, content: &str) -> Result<(), OutputError> {
        let Some(id) = self.slot else {
            return self.create_slot(content).await;
        };
        self.channel
            .edit_message(&self.http, id, EditMessage::new().content(content))
            .await
            .map_err(|e| OutputError::new(e.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl ReplySurface for DiscordSurface {
    async fn reply(&mut self, content: &str) -> Result<(), OutputError> {
        self.send(content, true).await?;
        Ok(())
    }

    async fn start_typing(&mut self) {
        self.typing = Some(self.channel.start_typing(&self.http));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn surface() -> DiscordSurface {
        DiscordSurface::new(
            Arc::new(Http::new("")),
            DiscordChannelId::new(1),
            DiscordMessageId::new(2),
        )
    }

    // Serenity rejects over-long content before any request is made, which
    // lets these run without a gateway.
    fn too_long() -> String {
        "x".repeat(2001)
    }

    #[tokio::test]
    async fn standalone_reply_keeps_typing() {
        let mut surface = surface();
        surface.start_typing().await;

        assert!(surface.reply(&too_long()).await.is_err());
        assert!(surface.typing.is_some());
    }

    #[tokio::test]
    async fn first_slot_ends_typing() {
        let mut surface = surface();
        surface.start_typing().await;

        assert!(surface.create_slot(&too_long()).await.is_err());
        assert!(surface.typing.is_none());
    }

    #[test]
    fn thread_kinds() {
        assert!(is_thread(ChannelType::PublicThread));
        assert!(is_thread(ChannelType::PrivateThread));
        assert!(is_thread(ChannelType::NewsThread));
        assert!(!is_thread(ChannelType::Text));
        assert!(!is_thread(ChannelType::Category));
    }
}
