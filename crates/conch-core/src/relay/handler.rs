//! Routing for a single inbound update.
//!
//! Order of checks: no text -> ignored; chat not allowed -> refused; slash
//! command -> store operation plus acknowledgement, or an image cycle for
//! `/draw`; group chat without `/chat` -> ignored; anything else -> a response
//! cycle. `/chat` is only a command in groups; private chats send the whole
//! text, prefix included.

use tracing::{debug, error, warn};

use conch_types::transport::{ChatId, InboundUpdate};

use crate::access::AccessPolicy;
use crate::command::{self, ChatCommand};

use super::aggregator::ReplyOutcome;
use super::responder::Responder;

const UNAUTHORIZED: &str = "Unauthorized Access";

/// What happened to an update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandleOutcome {
    /// No text, or group chatter not addressed with `/chat`.
    Ignored,
    Unauthorized,
    Command(ChatCommand),
    Replied(ReplyOutcome),
    /// `/draw` posted this many photos.
    Drew(usize),
    /// The engine call failed; carries the error message.
    Failed(String),
}

/// Applies access control and commands, then delegates to the [`Responder`].
pub struct UpdateHandler {
    responder: Responder,
    access: AccessPolicy,
    debug: bool,
}

impl UpdateHandler {
    pub fn new(responder: Responder, access: AccessPolicy, debug: bool) -> Self {
        Self {
            responder,
            access,
            debug,
        }
    }

    pub fn responder(&self) -> &Responder {
        &self.responder
    }

    pub async fn handle(&self, update: InboundUpdate) -> HandleOutcome {
        let Some(text) = update.text.as_deref() else {
            debug!(update_id = update.update_id, "Update without text ignored");
            return HandleOutcome::Ignored;
        };
        let chat_id = update.chat_id;

        if !self.access.is_allowed(chat_id) {
            warn!(chat_id, "Unauthorized chat");
            let reply = if self.debug {
                format!("{UNAUTHORIZED} (chatId: {chat_id})")
            } else {
                UNAUTHORIZED.to_string()
            };
            self.notify(chat_id, &reply).await;
            return HandleOutcome::Unauthorized;
        }

        let store = self.responder.store();
        match command::parse(text) {
            Some(ChatCommand::ResetAll) => {
                store.reset_all(chat_id);
                self.notify(chat_id, "Alright! Conversation and role are reset")
                    .await;
                HandleOutcome::Command(ChatCommand::ResetAll)
            }
            Some(ChatCommand::Reset) => {
                store.reset(chat_id);
                self.notify(chat_id, "Alright! Conversation is reset").await;
                HandleOutcome::Command(ChatCommand::Reset)
            }
            Some(ChatCommand::Role(persona)) => {
                store.set_persona(chat_id, persona.clone());
                self.notify(
                    chat_id,
                    &format!("Alright! System prompt updated to: {persona}"),
                )
                .await;
                HandleOutcome::Command(ChatCommand::Role(persona))
            }
            Some(ChatCommand::Draw(prompt)) => match self.responder.draw(chat_id, &prompt).await {
                Ok(delivered) => HandleOutcome::Drew(delivered),
                Err(e) => self.report(chat_id, "Image cycle failed", e.to_string()).await,
            },
            Some(ChatCommand::Chat(query)) if update.chat_kind.is_group() => {
                self.answer(chat_id, &query).await
            }
            _ if update.chat_kind.is_group() => HandleOutcome::Ignored,
            _ => self.answer(chat_id, text).await,
        }
    }

    async fn answer(&self, chat_id: ChatId, query: &str) -> HandleOutcome {
        match self.responder.respond(chat_id, query).await {
            Ok(outcome) => HandleOutcome::Replied(outcome),
            Err(e) => self.report(chat_id, "Response cycle failed", e.to_string()).await,
        }
    }

    /// Log an engine failure; echo it to the chat in debug mode.
    async fn report(&self, chat_id: ChatId, context: &str, message: String) -> HandleOutcome {
        error!(chat_id, error = %message, "{context}");
        if self.debug {
            self.notify(chat_id, &message).await;
        }
        HandleOutcome::Failed(message)
    }

    /// Best-effort plain message to the chat.
    async fn notify(&self, chat_id: ChatId, text: &str) {
        if let Err(e) = self.responder.transport().send(chat_id, text).await {
            warn!(chat_id, error = %e, "Notification failed");
        }
    }
}
