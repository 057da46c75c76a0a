//! OpenAI SSE stream to [`StreamEvent`] adapter.
//!
//! Maps `async-openai`'s [`ChatCompletionResponseStream`] to the
//! provider-agnostic [`StreamEvent`] enum. Every chunk becomes exactly one
//! `TextDelta` (the concatenated content of its choices, possibly empty) so
//! the reply aggregator can count fragments. Chunk read errors are yielded
//! as `Err` items and the stream keeps going.

use async_openai::error::OpenAIError;
use async_openai::types::chat::{
    ChatCompletionResponseStream, CreateChatCompletionStreamResponse, FinishReason,
};
use futures_util::StreamExt;

use conch_core::llm::provider::EventStream;
use conch_types::llm::{LlmError, StopReason, StreamEvent, Usage};

pub(crate) fn map_finish_reason(reason: &FinishReason) -> StopReason {
    match reason {
        FinishReason::Stop => StopReason::EndTurn,
        FinishReason::Length => StopReason::MaxTokens,
        FinishReason::ToolCalls | FinishReason::FunctionCall => StopReason::ToolUse,
        FinishReason::ContentFilter => StopReason::ContentFilter,
    }
}

/// Events for one chunk: the text delta first, then stop reason and usage
/// when the chunk carries them.
fn chunk_events(chunk: &CreateChatCompletionStreamResponse) -> Vec<StreamEvent> {
    let text: String = chunk
        .choices
        .iter()
        .filter_map(|choice| choice.delta.content.as_deref())
        .collect();

    let mut events = vec![StreamEvent::TextDelta { text }];

    if let Some(reason) = chunk.choices.iter().find_map(|c| c.finish_reason.as_ref()) {
        events.push(StreamEvent::MessageDelta {
            stop_reason: map_finish_reason(reason),
        });
    }

    // Only present on the final chunk, and only with `include_usage`.
    if let Some(usage) = &chunk.usage {
        events.push(StreamEvent::Usage(Usage {
            input_tokens: usage.prompt_tokens,
            output_tokens: usage.completion_tokens,
        }));
    }

    events
}

/// Map an async-openai stream to a stream of [`StreamEvent`]s.
///
/// `first` is a chunk already pulled off `stream` (to detect a failed call
/// before committing to the stream); it is replayed ahead of the rest.
///
/// Order: `Connected`, then per chunk `TextDelta` [+ `MessageDelta`]
/// [+ `Usage`], then `Done`.
pub fn map_openai_stream(
    first: Option<Result<CreateChatCompletionStreamResponse, OpenAIError>>,
    stream: ChatCompletionResponseStream,
) -> EventStream {
    Box::pin(async_stream::stream! {
        yield Ok(StreamEvent::Connected);

        let mut chunks = futures_util::stream::iter(first).chain(stream);
        while let Some(result) = chunks.next().await {
            match result {
                Ok(chunk) => {
                    for event in chunk_events(&chunk) {
                        yield Ok(event);
                    }
                }
                Err(e) => {
                    yield Err(LlmError::Stream(e.to_string()));
                }
            }
        }

        yield Ok(StreamEvent::Done);
    })
}
