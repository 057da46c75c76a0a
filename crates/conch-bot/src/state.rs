//! Application state wiring the relay together.
//!
//! AppState pins the core relay to the concrete infra implementations:
//! the OpenAI-compatible engine and the Telegram transport.

use std::sync::Arc;

use anyhow::Context;

use conch_core::access::AccessPolicy;
use conch_core::llm::box_provider::BoxLlmProvider;
use conch_core::relay::dispatcher::Dispatcher;
use conch_core::relay::handler::UpdateHandler;
use conch_core::relay::responder::{GenerationSettings, Responder};
use conch_core::session::store::SessionStore;
use conch_core::transport::box_transport::BoxChatTransport;
use conch_infra::llm::create_provider;
use conch_infra::telegram::TelegramTransport;
use conch_types::config::BotConfig;

/// Shared application state.
pub struct AppState {
    pub store: Arc<SessionStore>,
    pub handler: Arc<UpdateHandler>,
    pub parallel_chats: bool,
}

impl AppState {
    /// Build store, engine, transport, and handler from the config.
    pub fn init(config: &BotConfig) -> anyhow::Result<Self> {
        let store = Arc::new(SessionStore::from_config(&config.conversation));
        let provider: Arc<BoxLlmProvider> = Arc::new(create_provider(&config.llm));
        let transport = TelegramTransport::new(&config.telegram)
            .context("failed to build the Telegram client")?;
        let transport = Arc::new(BoxChatTransport::new(transport));

        let settings = GenerationSettings::from_config(&config.llm, &config.conversation);
        let responder = Responder::new(store.clone(), provider, transport, settings);
        let access = AccessPolicy::new(config.allowed_chat_ids.iter().copied());
        let handler = Arc::new(UpdateHandler::new(responder, access, config.debug));

        Ok(Self {
            store,
            handler,
            parallel_chats: config.parallel_chats,
        })
    }

    pub fn dispatcher(&self) -> Dispatcher {
        Dispatcher::new(self.handler.clone(), self.parallel_chats)
    }
}
