//! Chat allow-list.

use std::collections::HashSet;

use conch_types::transport::ChatId;

/// Which chats may talk to the bot.
///
/// An empty allow-list admits every chat.
#[derive(Debug, Clone, Default)]
pub struct AccessPolicy {
    allowed: HashSet<ChatId>,
}

impl AccessPolicy {
    pub fn new(allowed: impl IntoIterator<Item = ChatId>) -> Self {
        Self {
            allowed: allowed.into_iter().collect(),
        }
    }

    /// Admit every chat.
    pub fn open() -> Self {
        Self::default()
    }

    pub fn is_allowed(&self, chat_id: ChatId) -> bool {
        self.allowed.is_empty() || self.allowed.contains(&chat_id)
    }
}
