//! Paces a streamed model reply into chat messages.
//!
//! The reply is rendered into output slots, each one chat message. The
//! current slot is edited to show everything accumulated so far; once the
//! accumulated text would reach the platform limit, a new slot is opened
//! starting at the fragment that did not fit. Reading all slots in creation
//! order gives back the streamed text, short only of leading whitespace too
//! long to share a slot with the text that follows it.

use crate::error::{OutputError, StreamError};
use async_trait::async_trait;
use chat_relay_ai::ModelError;
use futures::{Stream, StreamExt};
use tracing::{debug, instrument};

/// Maximum characters in one chat message.
pub const MESSAGE_CHAR_LIMIT: usize = 2000;

/// Content of the slot created before the first fragment arrives.
pub const PLACEHOLDER: &str = "…";

/// Destination for streamed reply text.
#[async_trait]
pub trait OutputSink: Send {
    /// Opens a new slot showing `content`. Later updates target it.
    async fn create_slot(&mut self, content: &str) -> Result<(), OutputError>;

    /// Replaces the content of the most recently opened slot.
    async fn update_slot(&mut self, content: &str) -> Result<(), OutputError>;
}

/// An action against the sink.
#[derive(Debug, Clone, PartialEq, Eq)]
enum SlotAction {
    Create(String),
    Update(String),
}

/// Slot bookkeeping, kept free of I/O.
#[derive(Debug)]
struct Assembler {
    limit: usize,
    /// Text of the current slot.
    acc: String,
    acc_chars: usize,
    /// The current slot shows visible text.
    visible: bool,
    /// The current slot has not been sent yet.
    pending: bool,
    /// Some slot has shown visible text.
    shown: bool,
    full: String,
}

impl Assembler {
    fn new(limit: usize) -> Self {
        Self {
            limit,
            acc: String::new(),
            acc_chars: 0,
            visible: false,
            pending: false,
            shown: false,
            full: String::new(),
        }
    }

    fn push(&mut self, fragment: &str) -> Vec<SlotAction> {
        self.full.push_str(fragment);

        let mut actions = Vec::new();
        let mut rest = fragment;

        loop {
            let rest_chars = rest.chars().count();
            if self.acc_chars + rest_chars < self.limit {
                self.acc.push_str(rest);
                self.acc_chars += rest_chars;
                actions.extend(self.flush());
                break;
            }

            if self.visible {
                self.roll_over();
                continue;
            }

            // Nothing visible yet, so fill the current slot with as much of
            // the fragment as fits.
            let room = self.limit - 1 - self.acc_chars;
            if room == 0 {
                // A slot cannot be blank, and this whitespace leaves no room
                // for visible text. Shed one leading character and stay in
                // the current slot.
                self.shed_leading_char();
                continue;
            }
            let split = rest
                .char_indices()
                .nth(room)
                .map_or(rest.len(), |(idx, _)| idx);
            let (head, tail) = rest.split_at(split);
            self.acc.push_str(head);
            self.acc_chars += room.min(rest_chars);
            actions.extend(self.flush());
            rest = tail;
            if rest.is_empty() {
                break;
            }
        }

        actions
    }

    fn flush(&mut self) -> Option<SlotAction> {
        if self.acc.trim().is_empty() {
            debug!(chars = self.acc_chars, "skipping blank update");
            return None;
        }
        self.visible = true;
        self.shown = true;
        if self.pending {
            self.pending = false;
            Some(SlotAction::Create(self.acc.clone()))
        } else {
            Some(SlotAction::Update(self.acc.clone()))
        }
    }

    fn roll_over(&mut self) {
        self.acc.clear();
        self.acc_chars = 0;
        self.visible = false;
        self.pending = true;
    }

    fn shed_leading_char(&mut self) {
        if let Some(c) = self.acc.chars().next() {
            self.acc.drain(..c.len_utf8());
            self.acc_chars -= 1;
            debug!(chars = self.acc_chars, "shed whitespace that cannot share a slot");
        }
    }

    fn into_text(self) -> String {
        self.full
    }
}

/// Renders a fragment stream into output slots under a character limit.
#[derive(Debug, Clone, Copy)]
pub struct ResponseStreamer {
    limit: usize,
}

impl Default for ResponseStreamer {
    fn default() -> Self {
        Self::new(MESSAGE_CHAR_LIMIT)
    }
}

impl ResponseStreamer {
    /// Creates a streamer for slots holding fewer than `limit` characters.
    ///
    /// # Panics
    ///
    /// Panics if `limit` is below 2.
    #[must_use]
    pub fn new(limit: usize) -> Self {
        assert!(limit >= 2, "slot limit must allow at least one character");
        Self { limit }
    }

    /// Streams `fragments` into `sink`, returning the full reply text.
    ///
    /// A placeholder slot is opened before the first fragment. Each fragment
    /// that produces visible text causes exactly one sink call, except a
    /// fragment too long for any slot, which is split across new slots on
    /// character boundaries.
    ///
    /// A whitespace run too long to share a slot with the text after it is
    /// shortened from the front until one visible character fits, since no
    /// slot may be blank.
    ///
    /// # Errors
    ///
    /// Returns `Source` if the stream yields an error and `Sink` if a slot
    /// cannot be written. Slots already written stay as they are; `Source`
    /// records whether any of them shows text or only the placeholder.
    #[instrument(skip_all, fields(limit = self.limit))]
    pub async fn stream<S, O>(&self, mut fragments: S, sink: &mut O) -> Result<String, StreamError>
    where
        S: Stream<Item = Result<String, ModelError>> + Unpin + Send,
        O: OutputSink + ?Sized,
    {
        sink.create_slot(PLACEHOLDER).await?;

        let mut assembler = Assembler::new(self.limit);
        let mut slots = 1usize;

        while let Some(fragment) = fragments.next().await {
            let fragment = fragment.map_err(|error| StreamError::Source {
                error,
                visible: assembler.shown,
            })?;
            for action in assembler.push(&fragment) {
                match action {
                    SlotAction::Create(content) => {
                        slots += 1;
                        sink.create_slot(&content).await?;
                    }
                    SlotAction::Update(content) => sink.update_slot(&content).await?,
                }
            }
        }

        let text = assembler.into_text();
        debug!(slots, chars = text.chars().count(), "reply streamed");
        Ok(text)
    }
}
