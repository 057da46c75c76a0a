//! Session store: the identity -> conversation table.
//!
//! Backed by `DashMap`, so every operation on one identity runs under that
//! key's shard lock. Snapshots are cloned out immediately; no guard is held
//! across `.await`. Serializing whole response cycles for one identity is the
//! dispatcher's job.

use dashmap::DashMap;
use tracing::{debug, info};

use conch_types::config::ConversationConfig;
use conch_types::llm::Message;
use conch_types::transport::ChatId;

use super::conversation::Conversation;

/// Result of a persona change.
///
/// Changing the persona resets the conversation; `discarded_turns` reports
/// how many user/assistant turns were dropped by that reset.
#[derive(Debug, Clone)]
pub struct PersonaUpdate {
    pub conversation: Conversation,
    pub discarded_turns: usize,
}

/// Owns every conversation, keyed by chat identity.
///
/// All operations are total: an unknown identity is first contact.
#[derive(Debug)]
pub struct SessionStore {
    conversations: DashMap<ChatId, Conversation>,
    /// Persona overrides, tracked apart from conversations so that `reset`
    /// keeps them.
    personas: DashMap<ChatId, String>,
    retention: usize,
    default_persona: String,
}

impl SessionStore {
    /// Create a store with retention window `retention` (turns, system turn
    /// included) and the persona used for chats that never set one.
    pub fn new(retention: usize, default_persona: impl Into<String>) -> Self {
        Self {
            conversations: DashMap::new(),
            personas: DashMap::new(),
            retention,
            default_persona: default_persona.into(),
        }
    }

    pub fn from_config(config: &ConversationConfig) -> Self {
        Self::new(
            config.past_messages_included,
            config.system_prompt_default.clone(),
        )
    }

    /// The retention window `K`.
    pub fn retention(&self) -> usize {
        self.retention
    }

    /// Number of live conversations.
    pub fn len(&self) -> usize {
        self.conversations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conversations.is_empty()
    }

    /// Effective persona for `id`: its override, or the default.
    pub fn persona(&self, id: ChatId) -> String {
        self.personas
            .get(&id)
            .map(|p| p.value().clone())
            .unwrap_or_else(|| self.default_persona.clone())
    }

    fn fresh(&self, id: ChatId) -> Conversation {
        Conversation::new(id, self.persona(id))
    }

    /// Existing conversation for `id`, or a new one seeded with its persona.
    pub fn get_or_create(&self, id: ChatId) -> Conversation {
        self.conversations
            .entry(id)
            .or_insert_with(|| self.fresh(id))
            .value()
            .clone()
    }

    /// Discard the conversation (keeping any persona override) and start over.
    pub fn reset(&self, id: ChatId) -> Conversation {
        let conversation = self.fresh(id);
        self.conversations.insert(id, conversation.clone());
        debug!(chat_id = id, "Conversation reset");
        conversation
    }

    /// Clear the persona override, then reset.
    pub fn reset_all(&self, id: ChatId) -> Conversation {
        self.personas.remove(&id);
        debug!(chat_id = id, "Persona override cleared");
        self.reset(id)
    }

    /// Store `text` verbatim as the persona for `id` and reset the
    /// conversation so the new system turn applies immediately.
    pub fn set_persona(&self, id: ChatId, text: impl Into<String>) -> PersonaUpdate {
        self.personas.insert(id, text.into());
        let discarded_turns = self
            .conversations
            .get(&id)
            .map(|c| c.history_len())
            .unwrap_or(0);
        let conversation = self.reset(id);
        info!(chat_id = id, discarded_turns, "Persona updated");
        PersonaUpdate {
            conversation,
            discarded_turns,
        }
    }

    /// Append a user turn and return the snapshot to send to the engine.
    ///
    /// No trimming here; the window is enforced after the assistant reply.
    pub fn append_user(&self, id: ChatId, text: impl Into<String>) -> Conversation {
        let mut entry = self.conversations.entry(id).or_insert_with(|| self.fresh(id));
        entry.push(Message::user(text));
        entry.value().clone()
    }

    /// Append an assistant turn, then apply one retention trim step.
    pub fn append_assistant(&self, id: ChatId, text: impl Into<String>) {
        let mut entry = self.conversations.entry(id).or_insert_with(|| self.fresh(id));
        entry.push(Message::assistant(text));
        if entry.trim(self.retention) {
            debug!(chat_id = id, len = entry.len(), "Oldest exchange trimmed");
        }
    }
}
