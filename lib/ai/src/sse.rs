//! Server-Sent Events decoding for streaming model responses.
//!
//! Only `data:` fields matter to the model API; consecutive `data:` lines are
//! joined with `\n` and emitted when a blank line ends the event. Other
//! fields and comments are skipped.

use bytes::Bytes;
use futures::Stream;
use std::pin::Pin;
use std::task::{Context, Poll};

/// A stream adapter yielding the `data` payload of each SSE event.
pub struct SseDataStream<S> {
    inner: S,
    buffer: Vec<u8>,
    data: Vec<String>,
    done: bool,
}

impl<S> SseDataStream<S> {
    #[must_use]
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            buffer: Vec::new(),
            data: Vec::new(),
            done: false,
        }
    }

    /// Consumes one buffered line, returning a finished event if the line
    /// closed one.
    fn take_line(&mut self) -> Option<Option<String>> {
        let end = self.buffer.iter().position(|b| *b == b'\n')?;
        let raw: Vec<u8> = self.buffer.drain(..=end).collect();
        Some(self.process_line(&raw[..end]))
    }

    fn process_line(&mut self, raw: &[u8]) -> Option<String> {
        // Lines are split on raw bytes so multi-byte characters spanning
        // chunk boundaries decode intact.
        let line = String::from_utf8_lossy(raw);
        let line = line.strip_suffix('\r').unwrap_or(&line);

        if line.is_empty() {
            return self.finish_event();
        }

        if let Some(data) = line.strip_prefix("data:") {
            let data = data.strip_prefix(' ').unwrap_or(data);
            self.data.push(data.to_string());
        }
        None
    }

    fn finish_event(&mut self) -> Option<String> {
        if self.data.is_empty() {
            return None;
        }
        let event = self.data.join("\n");
        self.data.clear();
        Some(event)
    }
}

impl<S, E> Stream for SseDataStream<S>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
{
    type Item = Result<String, E>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            while let Some(line) = self.take_line() {
                if let Some(event) = line {
                    return Poll::Ready(Some(Ok(event)));
                }
            }

            if self.done {
                // Flush an unterminated last line and event.
                if !self.buffer.is_empty() {
                    let rest = std::mem::take(&mut self.buffer);
                    if let Some(event) = self.process_line(&rest) {
                        return Poll::Ready(Some(Ok(event)));
                    }
                }
                return Poll::Ready(self.finish_event().map(Ok));
            }

            match Pin::new(&mut self.inner).poll_next(cx) {
                Poll::Ready(Some(Ok(chunk))) => self.buffer.extend_from_slice(&chunk),
                Poll::Ready(Some(Err(e))) => return Poll::Ready(Some(Err(e))),
                Poll::Ready(None) => self.done = true,
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}
