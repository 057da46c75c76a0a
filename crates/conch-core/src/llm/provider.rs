//! LlmProvider trait definition.
//!
//! This is the completion-engine port. Uses RPITIT for every method; the
//! stream itself is a boxed `'static` stream so it can outlive the request
//! borrow and cross the `BoxLlmProvider` wrapper.

use std::pin::Pin;

use futures_util::Stream;

use conch_types::llm::{CompletionRequest, CompletionResponse, LlmError, StreamEvent};

/// A finite, non-restartable sequence of stream events.
///
/// Items that are `Err` are fragment-read failures; consumers skip them.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<StreamEvent, LlmError>> + Send + 'static>>;

/// Trait for completion-engine backends (OpenAI, Azure OpenAI, ...).
///
/// Implementations live in conch-infra (e.g., `OpenAiCompatibleProvider`).
pub trait LlmProvider: Send + Sync {
    /// Human-readable provider name (e.g., "azure", "openai").
    fn name(&self) -> &str;

    /// Send a completion request and receive the full response.
    fn complete(
        &self,
        request: &CompletionRequest,
    ) -> impl std::future::Future<Output = Result<CompletionResponse, LlmError>> + Send;

    /// Open a streaming completion.
    ///
    /// The outer `Err` is an engine-call failure: nothing was generated and
    /// no fragment will follow. Once `Ok`, the stream ends with
    /// `StreamEvent::Done` (or simply ends).
    fn stream(
        &self,
        request: CompletionRequest,
    ) -> impl std::future::Future<Output = Result<EventStream, LlmError>> + Send;

    /// Generate images for `prompt` and return their URLs.
    fn generate_image(
        &self,
        prompt: &str,
    ) -> impl std::future::Future<Output = Result<Vec<String>, LlmError>> + Send;
}
