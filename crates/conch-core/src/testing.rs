//! In-memory transport and provider doubles for unit tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::stream;
use tokio_util::sync::CancellationToken;

use conch_types::error::TransportError;
use conch_types::llm::{
    CompletionRequest, CompletionResponse, LlmError, StopReason, StreamEvent, Usage,
};
use conch_types::transport::{ChatId, ChatKind, InboundUpdate, MessageHandle, UpdateBatch};

use crate::llm::provider::{EventStream, LlmProvider};
use crate::transport::channel::ChatTransport;

/// One recorded outbound transport operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Send { chat_id: ChatId, text: String },
    Edit {
        chat_id: ChatId,
        handle: MessageHandle,
        text: String,
    },
    Photo { chat_id: ChatId, url: String },
}

impl Call {
    /// Message text, or the URL of a photo.
    pub fn text(&self) -> &str {
        match self {
            Call::Send { text, .. } | Call::Edit { text, .. } => text,
            Call::Photo { url, .. } => url,
        }
    }

    pub fn is_send(&self) -> bool {
        matches!(self, Call::Send { .. })
    }
}

pub type CallLog = Arc<Mutex<Vec<Call>>>;

/// Transport that records every send/edit and replays scripted update batches.
pub struct RecordingTransport {
    calls: CallLog,
    next_id: AtomicI64,
    fail_sends: bool,
    batches: Mutex<VecDeque<UpdateBatch>>,
    on_drained: Option<CancellationToken>,
    poll_delay: Duration,
    offsets: Arc<Mutex<Vec<Option<i64>>>>,
}

impl RecordingTransport {
    pub fn new() -> (Self, CallLog) {
        let calls: CallLog = Arc::new(Mutex::new(Vec::new()));
        let transport = Self {
            calls: calls.clone(),
            next_id: AtomicI64::new(100),
            fail_sends: false,
            batches: Mutex::new(VecDeque::new()),
            on_drained: None,
            poll_delay: Duration::ZERO,
            offsets: Arc::new(Mutex::new(Vec::new())),
        };
        (transport, calls)
    }

    /// Every `send` returns an API error (the call is still recorded).
    pub fn failing_sends(mut self) -> Self {
        self.fail_sends = true;
        self
    }

    /// Serve `batches` from `poll_updates`, then cancel `token`.
    pub fn with_batches<B: Into<UpdateBatch>>(
        mut self,
        batches: Vec<B>,
        token: CancellationToken,
    ) -> Self {
        self.batches = Mutex::new(batches.into_iter().map(Into::into).collect());
        self.on_drained = Some(token);
        self
    }

    /// Wait this long before answering each poll after the first.
    pub fn with_poll_delay(mut self, delay: Duration) -> Self {
        self.poll_delay = delay;
        self
    }

    /// Offsets passed to each `poll_updates` call.
    pub fn offset_log(&self) -> Arc<Mutex<Vec<Option<i64>>>> {
        self.offsets.clone()
    }
}

impl ChatTransport for RecordingTransport {
    fn name(&self) -> &str {
        "recording"
    }

    async fn send(&self, chat_id: ChatId, text: &str) -> Result<MessageHandle, TransportError> {
        self.calls.lock().unwrap().push(Call::Send {
            chat_id,
            text: text.to_string(),
        });
        if self.fail_sends {
            return Err(TransportError::Api {
                code: 400,
                description: "Bad Request: message text is empty".to_string(),
            });
        }
        Ok(MessageHandle(self.next_id.fetch_add(1, Ordering::SeqCst)))
    }

    async fn edit(
        &self,
        chat_id: ChatId,
        handle: MessageHandle,
        text: &str,
    ) -> Result<MessageHandle, TransportError> {
        self.calls.lock().unwrap().push(Call::Edit {
            chat_id,
            handle,
            text: text.to_string(),
        });
        Ok(handle)
    }

    async fn send_photo(
        &self,
        chat_id: ChatId,
        url: &str,
    ) -> Result<MessageHandle, TransportError> {
        self.calls.lock().unwrap().push(Call::Photo {
            chat_id,
            url: url.to_string(),
        });
        Ok(MessageHandle(self.next_id.fetch_add(1, Ordering::SeqCst)))
    }

    async fn poll_updates(&self, offset: Option<i64>) -> Result<UpdateBatch, TransportError> {
        let first = {
            let mut offsets = self.offsets.lock().unwrap();
            offsets.push(offset);
            offsets.len() == 1
        };
        if !first && !self.poll_delay.is_zero() {
            tokio::time::sleep(self.poll_delay).await;
        }
        let next = self.batches.lock().unwrap().pop_front();
        match next {
            Some(batch) => Ok(batch),
            None => {
                if let Some(token) = &self.on_drained {
                    token.cancel();
                }
                Ok(UpdateBatch::default())
            }
        }
    }
}

/// What a [`ScriptedProvider`] does when called.
#[derive(Debug, Clone)]
pub enum Script {
    /// Stream these items; `Err` entries become fragment-read failures.
    Events(Vec<Result<StreamEvent, String>>),
    /// Fail the engine call before any fragment.
    FailCall(String),
}

/// Provider that replays a fixed script and records the requests it saw.
pub struct ScriptedProvider {
    script: Script,
    images: Result<Vec<String>, String>,
    requests: Arc<Mutex<Vec<CompletionRequest>>>,
}

impl ScriptedProvider {
    pub fn new(script: Script) -> (Self, Arc<Mutex<Vec<CompletionRequest>>>) {
        let requests = Arc::new(Mutex::new(Vec::new()));
        (
            Self {
                script,
                images: Ok(vec!["https://images.example/1.png".to_string()]),
                requests: requests.clone(),
            },
            requests,
        )
    }

    /// What `generate_image` returns; `Err` fails the call.
    pub fn with_images(mut self, images: Result<Vec<String>, String>) -> Self {
        self.images = images;
        self
    }
}

impl LlmProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, LlmError> {
        self.requests.lock().unwrap().push(request.clone());
        match &self.script {
            Script::FailCall(message) => Err(LlmError::Provider {
                message: message.clone(),
            }),
            Script::Events(events) => {
                let content: String = events
                    .iter()
                    .filter_map(|ev| match ev {
                        Ok(StreamEvent::TextDelta { text }) => Some(text.as_str()),
                        _ => None,
                    })
                    .collect();
                Ok(CompletionResponse {
                    id: "resp-1".to_string(),
                    content,
                    model: request.model.clone(),
                    stop_reason: StopReason::EndTurn,
                    usage: Usage::default(),
                })
            }
        }
    }

    async fn stream(&self, request: CompletionRequest) -> Result<EventStream, LlmError> {
        self.requests.lock().unwrap().push(request);
        match &self.script {
            Script::FailCall(message) => Err(LlmError::Provider {
                message: message.clone(),
            }),
            Script::Events(events) => {
                let items: Vec<Result<StreamEvent, LlmError>> = events
                    .iter()
                    .cloned()
                    .map(|item| item.map_err(LlmError::Stream))
                    .collect();
                Ok(Box::pin(stream::iter(items)))
            }
        }
    }

    async fn generate_image(&self, _prompt: &str) -> Result<Vec<String>, LlmError> {
        self.images
            .clone()
            .map_err(|message| LlmError::Provider { message })
    }
}

/// `Connected`, one `TextDelta` per fragment, `Done`.
pub fn text_events(fragments: &[&str]) -> Vec<Result<StreamEvent, String>> {
    let mut events = vec![Ok(StreamEvent::Connected)];
    events.extend(fragments.iter().map(|f| {
        Ok(StreamEvent::TextDelta {
            text: (*f).to_string(),
        })
    }));
    events.push(Ok(StreamEvent::Done));
    events
}

pub fn private_update(update_id: i64, chat_id: ChatId, text: &str) -> InboundUpdate {
    InboundUpdate {
        update_id,
        chat_id,
        chat_kind: ChatKind::Private,
        text: Some(text.to_string()),
    }
}

pub fn group_update(update_id: i64, chat_id: ChatId, text: &str) -> InboundUpdate {
    InboundUpdate {
        update_id,
        chat_id,
        chat_kind: ChatKind::Group,
        text: Some(text.to_string()),
    }
}
