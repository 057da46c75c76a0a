//! A single chat's role-tagged history.

use conch_types::llm::{Message, MessageRole};
use conch_types::transport::ChatId;

/// The ordered history for one chat identity.
///
/// Only the session store mutates a `Conversation`; everything handed out
/// by the store is an owned snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conversation {
    id: ChatId,
    system_prompt: String,
    messages: Vec<Message>,
}

impl Conversation {
    /// Start a conversation seeded with its system turn.
    pub(crate) fn new(id: ChatId, system_prompt: String) -> Self {
        Self {
            id,
            messages: vec![Message::system(system_prompt.clone())],
            system_prompt,
        }
    }

    pub fn id(&self) -> ChatId {
        self.id
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    /// All turns, system turn first.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Number of user/assistant turns after the system turn.
    pub fn history_len(&self) -> usize {
        self.messages.len().saturating_sub(1)
    }

    /// The most recent turn.
    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub(crate) fn push(&mut self, message: Message) {
        debug_assert_ne!(message.role, MessageRole::System);
        self.messages.push(message);
    }

    /// Drop the oldest user/assistant pair when over the retention window.
    ///
    /// Applied once per assistant append: at most one pair is removed, and
    /// never when three or fewer turns remain. Returns whether a pair was
    /// dropped.
    pub(crate) fn trim(&mut self, retention: usize) -> bool {
        let len = self.messages.len();
        if len > retention && len > 3 {
            self.messages.drain(1..3);
            true
        } else {
            false
        }
    }
}
