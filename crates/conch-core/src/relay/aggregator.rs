//! Streaming reply aggregation.
//!
//! `ReplyAggregator` is a plain state machine: feed it fragments, it tells you
//! which transport operation (if any) to perform. `stream_reply` drives it from
//! an engine event stream and performs those operations.

use futures_util::StreamExt;
use tracing::{debug, warn};

use conch_types::llm::{StopReason, StreamEvent, Usage};
use conch_types::transport::{ChatId, MessageHandle};

use crate::llm::provider::EventStream;
use crate::transport::box_transport::BoxChatTransport;

/// Fragments between forced mid-stream edits.
pub const BATCH_SIZE: usize = 30;

/// A transport operation requested by the aggregator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    /// Post a new message with this text.
    Send(String),
    /// Replace the text of the previously sent message.
    Edit(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyState {
    NoMessageSent,
    MessageSent,
}

/// Accumulates fragments and decides send vs. edit.
#[derive(Debug)]
pub struct ReplyAggregator {
    text: String,
    state: ReplyState,
    counter: usize,
    batch_size: usize,
    fragments: usize,
    skipped: usize,
    usage: Option<Usage>,
    stop_reason: Option<StopReason>,
}

impl ReplyAggregator {
    pub fn new(batch_size: usize) -> Self {
        Self {
            text: String::new(),
            state: ReplyState::NoMessageSent,
            counter: 0,
            batch_size: batch_size.max(1),
            fragments: 0,
            skipped: 0,
            usage: None,
            stop_reason: None,
        }
    }

    pub fn state(&self) -> ReplyState {
        self.state
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Feed one fragment (possibly empty).
    ///
    /// The first fragment that makes the text non-empty yields a send. Every
    /// other fragment advances the counter; reaching the batch size yields an
    /// edit once a message exists, and resets the counter either way.
    pub fn push(&mut self, delta: &str) -> Option<Outbound> {
        self.fragments += 1;
        self.text.push_str(delta);

        if self.state == ReplyState::NoMessageSent && !self.text.is_empty() {
            self.state = ReplyState::MessageSent;
            return Some(Outbound::Send(self.text.clone()));
        }

        self.counter += 1;
        if self.counter < self.batch_size {
            return None;
        }
        self.counter = 0;
        match self.state {
            ReplyState::MessageSent => Some(Outbound::Edit(self.text.clone())),
            ReplyState::NoMessageSent => None,
        }
    }

    /// A fragment that could not be read. Text and counter are untouched.
    pub fn skip(&mut self) {
        self.skipped += 1;
    }

    pub fn record_usage(&mut self, usage: Usage) {
        self.usage = Some(usage);
    }

    pub fn record_stop(&mut self, reason: StopReason) {
        self.stop_reason = Some(reason);
    }

    /// End of stream: the flush that always happens, plus the committed text.
    pub fn finish(self) -> (Outbound, ReplyOutcome) {
        let last = match self.state {
            ReplyState::MessageSent => Outbound::Edit(self.text.clone()),
            ReplyState::NoMessageSent => Outbound::Send(self.text.clone()),
        };
        let outcome = ReplyOutcome {
            text: self.text,
            sends: 0,
            edits: 0,
            fragments: self.fragments,
            skipped: self.skipped,
            usage: self.usage,
            stop_reason: self.stop_reason,
        };
        (last, outcome)
    }
}

/// Result of one response cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyOutcome {
    /// Text committed as the assistant turn.
    pub text: String,
    /// Send operations attempted.
    pub sends: usize,
    /// Edit operations attempted.
    pub edits: usize,
    /// Fragments received (empty ones included).
    pub fragments: usize,
    /// Fragments dropped because they failed to read.
    pub skipped: usize,
    pub usage: Option<Usage>,
    pub stop_reason: Option<StopReason>,
}

impl ReplyOutcome {
    /// Outcome of a non-streaming cycle: one send of the full text.
    pub fn single(text: String, usage: Usage, stop_reason: StopReason) -> Self {
        Self {
            text,
            sends: 1,
            edits: 0,
            fragments: 0,
            skipped: 0,
            usage: Some(usage),
            stop_reason: Some(stop_reason),
        }
    }
}

/// Performs outbound operations against one chat, tracking the live message.
struct Delivery<'a> {
    transport: &'a BoxChatTransport,
    chat_id: ChatId,
    handle: Option<MessageHandle>,
    sends: usize,
    edits: usize,
}

impl<'a> Delivery<'a> {
    fn new(transport: &'a BoxChatTransport, chat_id: ChatId) -> Self {
        Self {
            transport,
            chat_id,
            handle: None,
            sends: 0,
            edits: 0,
        }
    }

    async fn apply(&mut self, op: Outbound) {
        match op {
            Outbound::Send(text) => self.send(&text).await,
            Outbound::Edit(text) => match self.handle {
                Some(handle) => self.edit(handle, &text).await,
                // The initial send failed; there is nothing to edit.
                None => self.send(&text).await,
            },
        }
    }

    async fn send(&mut self, text: &str) {
        self.sends += 1;
        match self.transport.send(self.chat_id, text).await {
            Ok(handle) => self.handle = Some(handle),
            Err(e) => warn!(chat_id = self.chat_id, error = %e, "Send failed"),
        }
    }

    async fn edit(&mut self, handle: MessageHandle, text: &str) {
        self.edits += 1;
        match self.transport.edit(self.chat_id, handle, text).await {
            Ok(updated) => self.handle = Some(updated),
            Err(e) => warn!(chat_id = self.chat_id, error = %e, "Edit failed"),
        }
    }
}

/// Drive `events` to completion, pushing the growing reply to `chat_id`.
///
/// Never fails: unreadable fragments are skipped and transport failures are
/// logged. The stream ends at `Done` or when the engine closes it.
pub async fn stream_reply(
    transport: &BoxChatTransport,
    chat_id: ChatId,
    mut events: EventStream,
    batch_size: usize,
) -> ReplyOutcome {
    let mut aggregator = ReplyAggregator::new(batch_size);
    let mut delivery = Delivery::new(transport, chat_id);

    while let Some(item) = events.next().await {
        match item {
            Ok(StreamEvent::TextDelta { text }) => {
                if let Some(op) = aggregator.push(&text) {
                    delivery.apply(op).await;
                }
            }
            Ok(StreamEvent::Usage(usage)) => aggregator.record_usage(usage),
            Ok(StreamEvent::MessageDelta { stop_reason }) => aggregator.record_stop(stop_reason),
            Ok(StreamEvent::Connected) => debug!(chat_id, "Engine stream connected"),
            Ok(StreamEvent::Done) => break,
            Err(e) => {
                warn!(chat_id, error = %e, "Skipping unreadable fragment");
                aggregator.skip();
            }
        }
    }

    let (last, mut outcome) = aggregator.finish();
    delivery.apply(last).await;
    outcome.sends = delivery.sends;
    outcome.edits = delivery.edits;
    outcome
}
