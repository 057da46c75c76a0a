//! Chat-transport types: chat identities, outbound message handles, and
//! inbound updates.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Chat identity. Stable for the lifetime of a conversation.
pub type ChatId = i64;

/// Handle to a message previously sent by the bot, used for edits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageHandle(pub i64);

impl fmt::Display for MessageHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Kind of chat an update arrived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatKind {
    Private,
    Group,
    Supergroup,
    Channel,
}

impl ChatKind {
    /// Whether the chat is shared by several users.
    pub fn is_group(&self) -> bool {
        matches!(self, ChatKind::Group | ChatKind::Supergroup)
    }
}

/// One inbound transport event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundUpdate {
    /// Monotonic update id assigned by the transport.
    pub update_id: i64,
    pub chat_id: ChatId,
    pub chat_kind: ChatKind,
    /// Message text; `None` for updates without a text message.
    pub text: Option<String>,
}

/// Result of one poll.
///
/// `last_update_id` covers every update the transport saw, including ones it
/// did not surface (edits, callbacks), so the next poll can acknowledge them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateBatch {
    pub updates: Vec<InboundUpdate>,
    pub last_update_id: Option<i64>,
}

impl UpdateBatch {
    /// Offset for the next poll, or `None` when nothing was seen.
    pub fn next_offset(&self) -> Option<i64> {
        self.last_update_id.map(|id| id + 1)
    }
}

impl From<Vec<InboundUpdate>> for UpdateBatch {
    fn from(updates: Vec<InboundUpdate>) -> Self {
        let last_update_id = updates.iter().map(|u| u.update_id).max();
        Self {
            updates,
            last_update_id,
        }
    }
}
