//! OpenAI-compatible completion engine.
//!
//! A single [`OpenAiCompatibleProvider`] serves OpenAI (and any server that
//! speaks its chat completions protocol) and Azure OpenAI deployments. The two
//! differ only in the `async-openai` [`Config`] driving the client. Image
//! generation (`/draw`) goes through a second client because Azure scopes
//! every URL to one deployment.

pub mod config;
pub mod streaming;

use async_openai::Client;
use async_openai::config::{AzureConfig, Config, OpenAIConfig};
use async_openai::types::chat::{
    ChatCompletionRequestAssistantMessage, ChatCompletionRequestAssistantMessageContent,
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessage,
    ChatCompletionRequestSystemMessageContent, ChatCompletionRequestUserMessage,
    ChatCompletionRequestUserMessageContent, ChatCompletionStreamOptions,
    CreateChatCompletionRequest,
};
use async_openai::error::OpenAIError;
use async_openai::types::images::{
    CreateImageRequest, Image, ImageModel, ImageResponseFormat, ImageSize, ImagesResponse,
};
use futures_util::StreamExt;

use conch_core::llm::provider::{EventStream, LlmProvider};
use conch_types::llm::{
    CompletionRequest, CompletionResponse, LlmError, Message, MessageRole, StopReason, Usage,
};

use self::config::OpenAiCompatConfig;
use self::streaming::{map_finish_reason, map_openai_stream};

/// Completion engine for any OpenAI-compatible API.
///
/// # API Key Security
///
/// Does NOT derive Debug: the `async_openai::Client` holds the API key.
pub struct OpenAiCompatibleProvider<C: Config> {
    client: Client<C>,
    image_client: Client<C>,
    provider_name: String,
    model: String,
    image_model: String,
}

impl OpenAiCompatibleProvider<OpenAIConfig> {
    /// OpenAI, or any OpenAI-protocol server at `config.base_url`.
    pub fn openai(config: &OpenAiCompatConfig) -> Self {
        Self {
            client: Client::with_config(config.openai_config()),
            image_client: Client::with_config(config.openai_config()),
            provider_name: "openai".to_string(),
            model: config.model.clone(),
            image_model: config.image_model.clone(),
        }
    }
}

impl OpenAiCompatibleProvider<AzureConfig> {
    /// Azure OpenAI deployment `config.model` at resource `config.base_url`.
    pub fn azure(config: &OpenAiCompatConfig) -> Self {
        Self {
            client: Client::with_config(config.azure_config()),
            image_client: Client::with_config(config.azure_image_config()),
            provider_name: "azure".to_string(),
            model: config.model.clone(),
            image_model: config.image_model.clone(),
        }
    }
}

impl<C: Config> OpenAiCompatibleProvider<C> {
    /// Build a [`CreateChatCompletionRequest`] from a generic [`CompletionRequest`].
    fn build_request(&self, request: &CompletionRequest, stream: bool) -> CreateChatCompletionRequest {
        let messages = request.messages.iter().map(to_openai_message).collect();

        // Use the model from the request if set, otherwise fall back to config default
        let model = if request.model.is_empty() {
            self.model.clone()
        } else {
            request.model.clone()
        };

        let mut req = CreateChatCompletionRequest {
            model,
            messages,
            max_completion_tokens: Some(request.max_tokens),
            temperature: request.temperature,
            ..Default::default()
        };

        if stream {
            req.stream = Some(true);
            req.stream_options = Some(ChatCompletionStreamOptions {
                include_usage: Some(true),
                include_obfuscation: None,
            });
        }

        req
    }

    /// One 1024x1024 image, returned by URL.
    fn build_image_request(&self, prompt: &str) -> CreateImageRequest {
        CreateImageRequest {
            prompt: prompt.to_string(),
            model: Some(ImageModel::Other(self.image_model.clone())),
            n: Some(1),
            response_format: Some(ImageResponseFormat::Url),
            size: Some(ImageSize::S1024x1024),
            ..Default::default()
        }
    }
}

/// URLs of the generated images; inline base64 images are skipped.
fn image_urls(response: &ImagesResponse) -> Vec<String> {
    response
        .data
        .iter()
        .filter_map(|image| match image.as_ref() {
            Image::Url { url, .. } => Some(url.clone()),
            Image::B64Json { .. } => None,
        })
        .collect()
}

fn to_openai_message(msg: &Message) -> ChatCompletionRequestMessage {
    match msg.role {
        MessageRole::System => {
            ChatCompletionRequestMessage::System(ChatCompletionRequestSystemMessage {
                content: ChatCompletionRequestSystemMessageContent::Text(msg.content.clone()),
                name: None,
            })
        }
        MessageRole::User => ChatCompletionRequestMessage::User(ChatCompletionRequestUserMessage {
            content: ChatCompletionRequestUserMessageContent::Text(msg.content.clone()),
            name: None,
        }),
        MessageRole::Assistant => {
            #[allow(deprecated)]
            ChatCompletionRequestMessage::Assistant(ChatCompletionRequestAssistantMessage {
                content: Some(ChatCompletionRequestAssistantMessageContent::Text(
                    msg.content.clone(),
                )),
                refusal: None,
                name: None,
                audio: None,
                tool_calls: None,
                function_call: None,
            })
        }
    }
}

impl<C> LlmProvider for OpenAiCompatibleProvider<C>
where
    C: Config + Clone + Send + Sync + 'static,
{
    fn name(&self) -> &str {
        &self.provider_name
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let oai_request = self.build_request(request, false);

        let response = self
            .client
            .chat()
            .create(oai_request)
            .await
            .map_err(map_openai_error)?;

        let first = response.choices.first();
        let content = first
            .and_then(|c| c.message.content.clone())
            .unwrap_or_default();
        let stop_reason = first
            .and_then(|c| c.finish_reason.as_ref())
            .map(map_finish_reason)
            .unwrap_or(StopReason::EndTurn);

        let usage = response
            .usage
            .map(|u| Usage {
                input_tokens: u.prompt_tokens,
                output_tokens: u.completion_tokens,
            })
            .unwrap_or_default();

        Ok(CompletionResponse {
            id: response.id,
            content,
            model: response.model,
            stop_reason,
            usage,
        })
    }

    async fn stream(&self, request: CompletionRequest) -> Result<EventStream, LlmError> {
        let oai_request = self.build_request(&request, true);

        let mut oai_stream = self
            .client
            .chat()
            .create_stream(oai_request)
            .await
            .map_err(map_openai_error)?;

        // HTTP-level failures (bad key, unknown deployment) surface as the
        // first stream item; report those as a failed call. A malformed first
        // chunk is only a fragment error and is replayed into the stream.
        let first = match oai_stream.next().await {
            Some(Err(e)) if is_call_failure(&e) => return Err(map_openai_error(e)),
            first => first,
        };

        Ok(map_openai_stream(first, oai_stream))
    }

    async fn generate_image(&self, prompt: &str) -> Result<Vec<String>, LlmError> {
        let response = self
            .image_client
            .images()
            .generate(self.build_image_request(prompt))
            .await
            .map_err(map_openai_error)?;

        let urls = image_urls(&response);
        tracing::debug!(
            model = %self.image_model,
            returned = response.data.len(),
            urls = urls.len(),
            "Image generation finished"
        );
        Ok(urls)
    }
}

/// Whether an error read as the first stream item means the call itself
/// failed rather than one chunk.
fn is_call_failure(err: &OpenAIError) -> bool {
    matches!(
        err,
        OpenAIError::StreamError(_) | OpenAIError::Reqwest(_) | OpenAIError::ApiError(_)
    )
}

/// Map an `async_openai::error::OpenAIError` to an [`LlmError`].
fn map_openai_error(err: OpenAIError) -> LlmError {
    match &err {
        OpenAIError::ApiError(api_err) => {
            let code = api_err.code.as_deref().unwrap_or("");
            let error_type = api_err.r#type.as_deref().unwrap_or("");

            if code == "authentication_error"
                || code == "401"
                || error_type == "authentication_error"
                || api_err.message.contains("Incorrect API key")
                || api_err.message.contains("Invalid API key")
                || api_err.message.contains("Access denied due to invalid subscription key")
            {
                LlmError::AuthenticationFailed
            } else if code == "rate_limit_exceeded"
                || code == "429"
                || error_type == "rate_limit_error"
            {
                LlmError::RateLimited {
                    retry_after_ms: None,
                }
            } else if code == "context_length_exceeded"
                || api_err.message.contains("maximum context length")
            {
                LlmError::ContextLengthExceeded
            } else if code == "server_error" || error_type == "overloaded_error" {
                LlmError::Overloaded(api_err.message.clone())
            } else {
                LlmError::Provider {
                    message: err.to_string(),
                }
            }
        }
        OpenAIError::Reqwest(reqwest_err) => match reqwest_err.status().map(|s| s.as_u16()) {
            Some(401) => LlmError::AuthenticationFailed,
            Some(429) => LlmError::RateLimited {
                retry_after_ms: None,
            },
            Some(503) | Some(529) => LlmError::Overloaded(err.to_string()),
            _ => LlmError::Provider {
                message: err.to_string(),
            },
        },
        OpenAIError::JSONDeserialize(_, content) => {
            LlmError::Deserialization(format!("failed to parse response: {content}"))
        }
        OpenAIError::StreamError(stream_err) => LlmError::Stream(stream_err.to_string()),
        OpenAIError::InvalidArgument(msg) => LlmError::InvalidRequest(msg.clone()),
        _ => LlmError::Provider {
            message: err.to_string(),
        },
    }
}
