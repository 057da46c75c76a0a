//! BoxChatTransport -- object-safe dynamic dispatch wrapper for ChatTransport.
//!
//! Same blanket-impl pattern as `BoxLlmProvider`.

use std::future::Future;
use std::pin::Pin;

use conch_types::error::TransportError;
use conch_types::transport::{ChatId, MessageHandle, UpdateBatch};

use super::channel::ChatTransport;

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Object-safe version of [`ChatTransport`] with boxed futures.
pub trait ChatTransportDyn: Send + Sync {
    fn name(&self) -> &str;

    fn send_boxed<'a>(
        &'a self,
        chat_id: ChatId,
        text: &'a str,
    ) -> BoxFuture<'a, Result<MessageHandle, TransportError>>;

    fn edit_boxed<'a>(
        &'a self,
        chat_id: ChatId,
        handle: MessageHandle,
        text: &'a str,
    ) -> BoxFuture<'a, Result<MessageHandle, TransportError>>;

    fn send_photo_boxed<'a>(
        &'a self,
        chat_id: ChatId,
        url: &'a str,
    ) -> BoxFuture<'a, Result<MessageHandle, TransportError>>;

    fn poll_updates_boxed(
        &self,
        offset: Option<i64>,
    ) -> BoxFuture<'_, Result<UpdateBatch, TransportError>>;
}

impl<T: ChatTransport> ChatTransportDyn for T {
    fn name(&self) -> &str {
        ChatTransport::name(self)
    }

    fn send_boxed<'a>(
        &'a self,
        chat_id: ChatId,
        text: &'a str,
    ) -> BoxFuture<'a, Result<MessageHandle, TransportError>> {
        Box::pin(self.send(chat_id, text))
    }

    fn edit_boxed<'a>(
        &'a self,
        chat_id: ChatId,
        handle: MessageHandle,
        text: &'a str,
    ) -> BoxFuture<'a, Result<MessageHandle, TransportError>> {
        Box::pin(self.edit(chat_id, handle, text))
    }

    fn send_photo_boxed<'a>(
        &'a self,
        chat_id: ChatId,
        url: &'a str,
    ) -> BoxFuture<'a, Result<MessageHandle, TransportError>> {
        Box::pin(self.send_photo(chat_id, url))
    }

    fn poll_updates_boxed(
        &self,
        offset: Option<i64>,
    ) -> BoxFuture<'_, Result<UpdateBatch, TransportError>> {
        Box::pin(self.poll_updates(offset))
    }
}

/// Type-erased chat transport.
pub struct BoxChatTransport {
    inner: Box<dyn ChatTransportDyn + Send + Sync>,
}

impl BoxChatTransport {
    /// Wrap a concrete `ChatTransport` in a type-erased box.
    pub fn new<T: ChatTransport + 'static>(transport: T) -> Self {
        Self {
            inner: Box::new(transport),
        }
    }

    pub fn name(&self) -> &str {
        self.inner.name()
    }

    pub async fn send(&self, chat_id: ChatId, text: &str) -> Result<MessageHandle, TransportError> {
        self.inner.send_boxed(chat_id, text).await
    }

    pub async fn edit(
        &self,
        chat_id: ChatId,
        handle: MessageHandle,
        text: &str,
    ) -> Result<MessageHandle, TransportError> {
        self.inner.edit_boxed(chat_id, handle, text).await
    }

    pub async fn send_photo(
        &self,
        chat_id: ChatId,
        url: &str,
    ) -> Result<MessageHandle, TransportError> {
        self.inner.send_photo_boxed(chat_id, url).await
    }

    pub async fn poll_updates(&self, offset: Option<i64>) -> Result<UpdateBatch, TransportError> {
        self.inner.poll_updates_boxed(offset).await
    }
}
