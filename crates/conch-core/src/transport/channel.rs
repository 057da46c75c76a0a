//! ChatTransport trait definition.

use std::future::Future;

use conch_types::error::TransportError;
use conch_types::transport::{ChatId, MessageHandle, UpdateBatch};

/// Trait for chat transports.
///
/// `send` and `edit` are fallible; callers in the reply path treat failures
/// as best-effort and keep going.
pub trait ChatTransport: Send + Sync {
    /// Human-readable transport name (e.g., "telegram").
    fn name(&self) -> &str;

    /// Send a new text message to a chat.
    fn send(
        &self,
        chat_id: ChatId,
        text: &str,
    ) -> impl Future<Output = Result<MessageHandle, TransportError>> + Send;

    /// Replace the text of a message previously sent by the bot.
    fn edit(
        &self,
        chat_id: ChatId,
        handle: MessageHandle,
        text: &str,
    ) -> impl Future<Output = Result<MessageHandle, TransportError>> + Send;

    /// Send a photo by URL.
    fn send_photo(
        &self,
        chat_id: ChatId,
        url: &str,
    ) -> impl Future<Output = Result<MessageHandle, TransportError>> + Send;

    /// Fetch the next batch of inbound updates, starting at `offset`.
    ///
    /// May block for the transport's long-polling window when nothing is
    /// pending.
    fn poll_updates(
        &self,
        offset: Option<i64>,
    ) -> impl Future<Output = Result<UpdateBatch, TransportError>> + Send;
}
