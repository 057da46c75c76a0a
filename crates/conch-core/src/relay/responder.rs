//! One response cycle for one chat.
//!
//! `append_user` -> engine call -> aggregation -> `append_assistant`. An
//! engine-call failure ends the cycle before any transport operation and
//! leaves the user turn as the last entry of the conversation.
//!
//! `/draw` runs a separate, stateless cycle: image generation followed by one
//! photo per returned URL. It never touches the conversation.

use std::sync::Arc;

use tracing::{Instrument, info, info_span, warn};

use conch_types::config::{ConversationConfig, LlmConfig};
use conch_types::error::RelayError;
use conch_types::llm::CompletionRequest;
use conch_types::transport::ChatId;

use crate::llm::box_provider::BoxLlmProvider;
use crate::session::conversation::Conversation;
use crate::session::store::SessionStore;
use crate::transport::box_transport::BoxChatTransport;

use super::aggregator::{BATCH_SIZE, ReplyOutcome, stream_reply};

/// Per-request generation parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationSettings {
    /// Model name or deployment id; empty lets the provider decide.
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub stream: bool,
}

impl GenerationSettings {
    pub fn from_config(llm: &LlmConfig, conversation: &ConversationConfig) -> Self {
        Self {
            model: llm.deployment_id.clone(),
            max_tokens: conversation.max_tokens,
            temperature: conversation.temperature,
            stream: llm.stream,
        }
    }
}

/// Runs response cycles against shared store, engine, and transport.
pub struct Responder {
    store: Arc<SessionStore>,
    provider: Arc<BoxLlmProvider>,
    transport: Arc<BoxChatTransport>,
    settings: GenerationSettings,
    batch_size: usize,
}

impl Responder {
    pub fn new(
        store: Arc<SessionStore>,
        provider: Arc<BoxLlmProvider>,
        transport: Arc<BoxChatTransport>,
        settings: GenerationSettings,
    ) -> Self {
        Self {
            store,
            provider,
            transport,
            settings,
            batch_size: BATCH_SIZE,
        }
    }

    /// Override the fragment batch size.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    pub fn transport(&self) -> &Arc<BoxChatTransport> {
        &self.transport
    }

    /// Answer `query` in `chat_id` and commit the reply.
    pub async fn respond(&self, chat_id: ChatId, query: &str) -> Result<ReplyOutcome, RelayError> {
        let conversation = self.store.append_user(chat_id, query);
        let request = self.build_request(&conversation);

        let span = info_span!(
            "gen_ai.chat",
            chat_id,
            gen_ai.system = self.provider.name(),
            gen_ai.request.model = %request.model,
            gen_ai.request.max_tokens = request.max_tokens,
            gen_ai.request.temperature = ?request.temperature,
            gen_ai.request.stream = request.stream,
            turns = request.messages.len(),
        );

        async move {
            let outcome = if request.stream {
                let events = self.provider.stream(request).await?;
                stream_reply(&self.transport, chat_id, events, self.batch_size).await
            } else {
                let response = self.provider.complete(&request).await?;
                if let Err(e) = self.transport.send(chat_id, &response.content).await {
                    warn!(chat_id, error = %e, "Send failed");
                }
                ReplyOutcome::single(response.content, response.usage, response.stop_reason)
            };

            self.store.append_assistant(chat_id, outcome.text.clone());

            info!(
                gen_ai.usage.input_tokens = outcome.usage.map(|u| u.input_tokens),
                gen_ai.usage.output_tokens = outcome.usage.map(|u| u.output_tokens),
                gen_ai.response.finish_reason = ?outcome.stop_reason,
                fragments = outcome.fragments,
                skipped = outcome.skipped,
                sends = outcome.sends,
                edits = outcome.edits,
                "Reply committed"
            );
            Ok::<_, RelayError>(outcome)
        }
        .instrument(span)
        .await
    }

    /// Generate images for `prompt` and post them to `chat_id`.
    ///
    /// Returns the number of photos delivered. Photo delivery failures are
    /// logged and skipped; only the engine call itself can fail the cycle.
    pub async fn draw(&self, chat_id: ChatId, prompt: &str) -> Result<usize, RelayError> {
        let span = info_span!(
            "gen_ai.image",
            chat_id,
            gen_ai.system = self.provider.name(),
            prompt_chars = prompt.chars().count(),
        );

        async move {
            let urls = self.provider.generate_image(prompt).await?;
            let mut delivered = 0;
            for url in &urls {
                match self.transport.send_photo(chat_id, url).await {
                    Ok(_) => delivered += 1,
                    Err(e) => warn!(chat_id, error = %e, "Photo send failed"),
                }
            }
            info!(generated = urls.len(), delivered, "Images posted");
            Ok::<_, RelayError>(delivered)
        }
        .instrument(span)
        .await
    }

    fn build_request(&self, conversation: &Conversation) -> CompletionRequest {
        CompletionRequest {
            model: self.settings.model.clone(),
            messages: conversation.messages().to_vec(),
            max_tokens: self.settings.max_tokens,
            temperature: Some(self.settings.temperature),
            stream: self.settings.stream,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Call, RecordingTransport, Script, ScriptedProvider, text_events};
    use conch_types::config::DEFAULT_SYSTEM_PROMPT;
    use conch_types::llm::{Message, MessageRole};

    fn settings(stream: bool) -> GenerationSettings {
        GenerationSettings {
            model: "gpt-4o".to_string(),
            max_tokens: 256,
            temperature: 0.5,
            stream,
        }
    }

    struct Harness {
        responder: Responder,
        calls: crate::testing::CallLog,
        requests: Arc<std::sync::Mutex<Vec<CompletionRequest>>>,
    }

    fn harness(script: Script, stream: bool) -> Harness {
        harness_with(ScriptedProvider::new(script), stream)
    }

    fn harness_with(
        (provider, requests): (ScriptedProvider, Arc<std::sync::Mutex<Vec<CompletionRequest>>>),
        stream: bool,
    ) -> Harness {
        let (transport, calls) = RecordingTransport::new();
        let responder = Responder::new(
            Arc::new(SessionStore::new(10, DEFAULT_SYSTEM_PROMPT)),
            Arc::new(BoxLlmProvider::new(provider)),
            Arc::new(BoxChatTransport::new(transport)),
            settings(stream),
        );
        Harness {
            responder,
            calls,
            requests,
        }
    }

    #[tokio::test]
    async fn streaming_cycle_commits_reply() {
        let h = harness(Script::Events(text_events(&["Hel", "lo"])), true);

        let outcome = h.responder.respond(1, "hi").await.unwrap();

        assert_eq!(outcome.text, "Hello");
        let conv = h.responder.store().get_or_create(1);
        assert_eq!(conv.len(), 3);
        assert_eq!(conv.last().unwrap(), &Message::assistant("Hello"));
    }

    #[tokio::test]
    async fn request_carries_conversation_and_settings() {
        let h = harness(Script::Events(text_events(&["ok"])), true);
        h.responder.respond(1, "first").await.unwrap();
        h.responder.respond(1, "second").await.unwrap();

        let requests = h.requests.lock().unwrap().clone();
        assert_eq!(requests.len(), 2);
        let second = &requests[1];
        assert_eq!(second.model, "gpt-4o");
        assert_eq!(second.max_tokens, 256);
        assert_eq!(second.temperature, Some(0.5));
        assert!(second.stream);
        let roles: Vec<MessageRole> = second.messages.iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![
                MessageRole::System,
                MessageRole::User,
                MessageRole::Assistant,
                MessageRole::User
            ]
        );
        assert_eq!(second.messages[3].content, "second");
    }

    #[tokio::test]
    async fn engine_failure_leaves_user_turn_last() {
        let h = harness(Script::FailCall("deployment not found".to_string()), true);

        let err = h.responder.respond(1, "hello?").await.unwrap_err();

        assert!(err.to_string().contains("deployment not found"));
        assert!(h.calls.lock().unwrap().is_empty());
        let conv = h.responder.store().get_or_create(1);
        assert_eq!(conv.len(), 2);
        assert_eq!(conv.last().unwrap(), &Message::user("hello?"));
    }

    #[tokio::test]
    async fn empty_stream_commits_empty_turn() {
        let h = harness(Script::Events(text_events(&[])), true);

        let outcome = h.responder.respond(1, "say nothing").await.unwrap();

        assert_eq!(outcome.text, "");
        assert_eq!(h.calls.lock().unwrap().len(), 1);
        let conv = h.responder.store().get_or_create(1);
        assert_eq!(conv.last().unwrap(), &Message::assistant(""));
    }

    #[tokio::test]
    async fn non_streaming_cycle_sends_once() {
        let h = harness(Script::Events(text_events(&["one ", "shot"])), false);

        let outcome = h.responder.respond(3, "q").await.unwrap();

        assert_eq!(outcome.sends, 1);
        assert_eq!(outcome.edits, 0);
        let calls = h.calls.lock().unwrap().clone();
        assert_eq!(
            calls,
            vec![Call::Send {
                chat_id: 3,
                text: "one shot".to_string()
            }]
        );
        assert!(!h.requests.lock().unwrap()[0].stream);
        assert_eq!(
            h.responder.store().get_or_create(3).last().unwrap(),
            &Message::assistant("one shot")
        );
    }

    #[tokio::test]
    async fn custom_batch_size_changes_cadence() {
        let h = harness(Script::Events(text_events(&["a", "b", "c", "d", "e"])), true);
        let responder = h.responder.with_batch_size(2);

        let outcome = responder.respond(1, "q").await.unwrap();

        // send@a, edit@c, edit@e, final edit
        assert_eq!((outcome.sends, outcome.edits), (1, 3));
        assert_eq!(h.calls.lock().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn draw_posts_each_image_without_touching_history() {
        let (provider, requests) = ScriptedProvider::new(Script::Events(text_events(&["x"])));
        let provider = provider.with_images(Ok(vec![
            "https://images.example/a.png".to_string(),
            "https://images.example/b.png".to_string(),
        ]));
        let h = harness_with((provider, requests), true);

        let delivered = h.responder.draw(4, "a lighthouse at dusk").await.unwrap();

        assert_eq!(delivered, 2);
        let calls = h.calls.lock().unwrap().clone();
        assert_eq!(
            calls,
            vec![
                Call::Photo {
                    chat_id: 4,
                    url: "https://images.example/a.png".to_string()
                },
                Call::Photo {
                    chat_id: 4,
                    url: "https://images.example/b.png".to_string()
                },
            ]
        );
        assert!(h.requests.lock().unwrap().is_empty());
        assert!(h.responder.store().is_empty());
    }

    #[tokio::test]
    async fn draw_failure_sends_nothing() {
        let (provider, requests) = ScriptedProvider::new(Script::Events(text_events(&["x"])));
        let provider = provider.with_images(Err("content policy violation".to_string()));
        let h = harness_with((provider, requests), true);

        let err = h.responder.draw(4, "something").await.unwrap_err();

        assert!(err.to_string().contains("content policy violation"));
        assert!(h.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn settings_from_config() {
        let conversation = ConversationConfig {
            max_tokens: 99,
            temperature: 0.1,
            ..ConversationConfig::default()
        };
        let llm: LlmConfig = toml::from_str(
            r#"
            base_url = "https://example.openai.azure.com"
            api_key = "k"
            deployment_id = "chat"
            stream = false
            "#,
        )
        .unwrap();
        let settings = GenerationSettings::from_config(&llm, &conversation);
        assert_eq!(settings.model, "chat");
        assert_eq!(settings.max_tokens, 99);
        assert!(!settings.stream);
    }
}
