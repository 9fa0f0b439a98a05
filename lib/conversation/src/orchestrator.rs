//! One message-processing cycle.
//!
//! Resolve the session, ingest attachments, stream the model's reply to the
//! chat surface and commit the new turns. Model failures are classified and
//! answered with a single reply.

use crate::error::{ConversationError, OutputError, StreamError};
use crate::lock::KeyedLocks;
use crate::message::InboundMessage;
use crate::session::SessionStore;
use crate::streamer::{OutputSink, ResponseStreamer};
use async_trait::async_trait;
use chat_relay_ai::{
    ErrorCategory, FALLBACK_REPLY, ModelBackend, ModelError, ModelRequest, Part, TextStream, Turn,
};
use chat_relay_attachment::Ingest;
use chat_relay_core::{CycleId, SessionKey};
use futures::stream;
use tracing::{Instrument, debug, error, info, info_span, warn};

/// The chat surface a cycle replies on.
#[async_trait]
pub trait ReplySurface: OutputSink {
    /// Sends a standalone reply to the inbound message.
    async fn reply(&mut self, content: &str) -> Result<(), OutputError>;

    /// Shows a typing indicator while the reply is produced.
    async fn start_typing(&mut self);
}

/// How a cycle ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The reply was streamed and both turns committed.
    Replied { chars: usize },
    /// An attachment needs a thread; nothing was sent to the model.
    Rejected,
    /// Nothing usable remained after attachment checks.
    Empty,
    /// The model call failed and the user was told.
    Failed(ErrorCategory),
}

/// Drives a message through session, attachments, model and surface.
pub struct ConversationOrchestrator<S, M, I> {
    store: S,
    model: M,
    ingestor: I,
    system_instruction: Option<String>,
    streaming: bool,
    streamer: ResponseStreamer,
    locks: KeyedLocks,
}

impl<S, M, I> ConversationOrchestrator<S, M, I>
where
    S: SessionStore,
    M: ModelBackend,
    I: Ingest,
{
    /// Creates an orchestrator.
    pub fn new(store: S, model: M, ingestor: I) -> Self {
        Self {
            store,
            model,
            ingestor,
            system_instruction: None,
            streaming: true,
            streamer: ResponseStreamer::default(),
            locks: KeyedLocks::new(),
        }
    }

    /// Sets the personality sent as the model's system instruction.
    #[must_use]
    pub fn with_system_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.system_instruction = Some(instruction.into());
        self
    }

    /// Chooses between streamed replies (the default) and replies generated
    /// in one call and posted once complete.
    #[must_use]
    pub fn with_streaming(mut self, streaming: bool) -> Self {
        self.streaming = streaming;
        self
    }

    /// The per-session locks, for scheduling cleanup.
    #[must_use]
    pub fn locks(&self) -> &KeyedLocks {
        &self.locks
    }

    /// Processes one inbound message.
    ///
    /// Messages for the same session are handled one at a time.
    ///
    /// # Errors
    ///
    /// Returns an error if the session store fails or the surface cannot be
    /// written. Model failures are not errors: they are classified, answered
    /// and reported as [`Outcome::Failed`].
    pub async fn handle<R>(
        &self,
        message: InboundMessage,
        surface: &mut R,
    ) -> chat_relay_core::Result<Outcome, ConversationError>
    where
        R: ReplySurface + ?Sized,
    {
        let cycle = CycleId::new();
        let span = info_span!(
            "cycle",
            %cycle,
            key = %message.key,
            message = %message.id,
            author = %message.author,
        );
        self.process(message, surface).instrument(span).await
    }

    async fn process<R>(
        &self,
        message: InboundMessage,
        surface: &mut R,
    ) -> chat_relay_core::Result<Outcome, ConversationError>
    where
        R: ReplySurface + ?Sized,
    {
        let key = message.key;
        let lock = self.locks.get(key);
        let _guard = lock.lock().await;

        surface.start_typing().await;

        let Some(parts) = self.collect_parts(&message, surface).await? else {
            return Ok(Outcome::Rejected);
        };
        if parts.is_empty() {
            debug!("nothing to send");
            return Ok(Outcome::Empty);
        }

        let history = self.history(key).await?;
        let mut request = ModelRequest::new(parts.clone()).with_history(history);
        if let Some(instruction) = &self.system_instruction {
            request = request.with_system_instruction(instruction.clone());
        }

        let fragments = match self.open_reply(&request).await {
            Ok(fragments) => fragments,
            Err(e) => return self.report_failure(key, &e, false, surface).await,
        };

        match self.streamer.stream(fragments, surface).await {
            Ok(text) => self.commit(key, parts, text).await,
            // Only the placeholder is showing; it becomes the one reply.
            Err(StreamError::Source { error, visible }) => {
                self.report_failure(key, &error, !visible, surface).await
            }
            Err(StreamError::Sink(e)) => Err(ConversationError::output(key, &e).into()),
        }
    }

    async fn open_reply(&self, request: &ModelRequest) -> Result<TextStream, ModelError> {
        if self.streaming {
            return self.model.generate_stream(request).await;
        }
        let text = self.model.generate(request).await?;
        Ok(Box::pin(stream::once(async move { Ok(text) })))
    }

    /// Answers a model failure with its category's reply, either as a new
    /// message or by rewriting the placeholder slot.
    async fn report_failure<R>(
        &self,
        key: SessionKey,
        failure: &ModelError,
        replace_placeholder: bool,
        surface: &mut R,
    ) -> chat_relay_core::Result<Outcome, ConversationError>
    where
        R: ReplySurface + ?Sized,
    {
        let category = ErrorCategory::classify(failure);
        let reply = match category.reply() {
            Some(reply) => {
                warn!(%category, error = %failure, "model call failed");
                reply
            }
            None => {
                error!(error = %failure, "unclassified model failure");
                FALLBACK_REPLY
            }
        };

        let sent = if replace_placeholder {
            surface.update_slot(reply).await
        } else {
            surface.reply(reply).await
        };
        sent.map_err(|e| ConversationError::output(key, &e))?;
        Ok(Outcome::Failed(category))
    }

    /// Ingests attachments in order. Returns `None` if the message must be
    /// abandoned.
    async fn collect_parts<R>(
        &self,
        message: &InboundMessage,
        surface: &mut R,
    ) -> chat_relay_core::Result<Option<Vec<Part>>, ConversationError>
    where
        R: ReplySurface + ?Sized,
    {
        let key = message.key;
        let mut parts = Vec::with_capacity(message.attachments.len() + 1);
        if !message.text.trim().is_empty() {
            parts.push(Part::text(message.text.clone()));
        }

        for descriptor in &message.attachments {
            match self.ingestor.ingest(descriptor, key.scope()).await {
                Ok(part) => parts.push(part),
                Err(rejection) => {
                    info!(%rejection, "attachment rejected");
                    surface
                        .reply(&rejection.reply())
                        .await
                        .map_err(|e| ConversationError::output(key, &e))?;
                    if rejection.aborts_message() {
                        return Ok(None);
                    }
                }
            }
        }

        Ok(Some(parts))
    }

    async fn history(&self, key: SessionKey) -> chat_relay_core::Result<Vec<Turn>, ConversationError> {
        let existing = self
            .store
            .get(key)
            .await
            .map_err(|e| ConversationError::session(key, &e))?;
        let session = match existing {
            Some(session) => session,
            None => self
                .store
                .create(key)
                .await
                .map_err(|e| ConversationError::session(key, &e))?,
        };
        debug!(turns = session.len(), "session resolved");
        Ok(session.into_turns())
    }

    async fn commit(
        &self,
        key: SessionKey,
        parts: Vec<Part>,
        text: String,
    ) -> chat_relay_core::Result<Outcome, ConversationError> {
        let chars = text.chars().count();
        if text.trim().is_empty() {
            warn!("model returned no text; turns not committed");
            return Ok(Outcome::Replied { chars });
        }

        self.store
            .append(key, vec![Turn::user(parts), Turn::model(text)])
            .await
            .map_err(|e| {
                error!(error = %e, "failed to commit turns");
                ConversationError::session(key, &e)
            })?;

        info!(chars, "reply committed");
        Ok(Outcome::Replied { chars })
    }

    /// Drops the session for a deleted channel or thread.
    ///
    /// # Errors
    ///
    /// Returns an error if the session store fails.
    pub async fn forget(&self, key: SessionKey) -> chat_relay_core::Result<(), ConversationError> {
        let lock = self.locks.get(key);
        let _guard = lock.lock().await;

        self.store
            .delete(key)
            .await
            .map_err(|e| ConversationError::session(key, &e))?;
        info!(%key, "session forgotten");
        Ok(())
    }
}
