//! Configuration types for Conch.
//!
//! `BotConfig` represents the top-level `config.toml`. Every value is a
//! pass-through for the collaborators (transport, completion engine, session
//! store); only the presence of the credentials is required.

use secrecy::SecretString;
use serde::{Deserialize, Deserializer};

use crate::llm::ProviderKind;
use crate::transport::ChatId;

/// Persona used when a chat never set one.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant.";

/// Top-level configuration for the relay.
#[derive(Debug, Deserialize)]
pub struct BotConfig {
    /// Debug mode: engine errors are echoed to the chat and unauthorized
    /// replies include the chat id.
    #[serde(default)]
    pub debug: bool,

    /// Process distinct chats concurrently (one ordered worker per chat).
    #[serde(default)]
    pub parallel_chats: bool,

    /// Chats allowed to talk to the bot. Empty means everyone.
    #[serde(default)]
    pub allowed_chat_ids: Vec<ChatId>,

    pub telegram: TelegramConfig,

    pub llm: LlmConfig,

    #[serde(default)]
    pub conversation: ConversationConfig,
}

/// Telegram Bot API settings.
#[derive(Debug, Deserialize)]
pub struct TelegramConfig {
    #[serde(deserialize_with = "deserialize_secret")]
    pub api_key: SecretString,

    #[serde(default = "default_telegram_api_base")]
    pub api_base: String,

    /// Long-polling timeout passed to `getUpdates`.
    #[serde(default = "default_poll_timeout_secs")]
    pub poll_timeout_secs: u32,
}

/// Completion-engine settings.
#[derive(Debug, Deserialize)]
pub struct LlmConfig {
    #[serde(default)]
    pub provider: ProviderKind,

    /// Resource endpoint (Azure) or API base URL (OpenAI).
    pub base_url: String,

    #[serde(deserialize_with = "deserialize_secret")]
    pub api_key: SecretString,

    /// Azure `api-version` query value. Ignored for OpenAI.
    #[serde(default = "default_api_version")]
    pub api_version: String,

    /// Azure deployment id, or the model name for OpenAI.
    pub deployment_id: String,

    /// Stream the answer as incremental edits instead of one final message.
    #[serde(default = "default_stream")]
    pub stream: bool,

    /// Image model (OpenAI) or deployment (Azure) used by `/draw`.
    #[serde(default = "default_image_deployment_id")]
    pub image_deployment_id: String,
}

/// Session-store and generation settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ConversationConfig {
    /// Retention window `K`: maximum number of stored turns, system turn included.
    #[serde(default = "default_past_messages_included")]
    pub past_messages_included: usize,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_system_prompt")]
    pub system_prompt_default: String,
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            past_messages_included: default_past_messages_included(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            system_prompt_default: default_system_prompt(),
        }
    }
}

fn deserialize_secret<'de, D>(deserializer: D) -> Result<SecretString, D::Error>
where
    D: Deserializer<'de>,
{
    String::deserialize(deserializer).map(SecretString::from)
}

fn default_telegram_api_base() -> String {
    "https://api.telegram.org".to_string()
}

fn default_poll_timeout_secs() -> u32 {
    30
}

fn default_api_version() -> String {
    "2024-10-21".to_string()
}

fn default_stream() -> bool {
    true
}

fn default_image_deployment_id() -> String {
    "dall-e-3".to_string()
}

fn default_past_messages_included() -> usize {
    10
}

fn default_max_tokens() -> u32 {
    1024
}

fn default_temperature() -> f32 {
    0.7
}

fn default_system_prompt() -> String {
    DEFAULT_SYSTEM_PROMPT.to_string()
}
