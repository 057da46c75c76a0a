//! Connection settings for OpenAI-compatible engines.
//!
//! One [`OpenAiCompatConfig`] describes either an OpenAI-style endpoint or an
//! Azure OpenAI deployment; it produces the matching `async-openai` config.

use async_openai::config::{AzureConfig, OpenAIConfig};
use secrecy::{ExposeSecret, SecretString};

use conch_types::config::LlmConfig;
use conch_types::llm::ProviderKind;

/// Used when an OpenAI provider is configured without a base URL.
pub const OPENAI_DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Configuration for an OpenAI-compatible completion engine.
///
/// Used to construct an [`super::OpenAiCompatibleProvider`].
pub struct OpenAiCompatConfig {
    pub kind: ProviderKind,
    /// Resource endpoint (Azure) or API base URL (OpenAI).
    pub base_url: String,
    pub api_key: SecretString,
    /// Deployment id (Azure) or model name (OpenAI).
    pub model: String,
    /// Azure `api-version`; unused for OpenAI.
    pub api_version: String,
    /// Image deployment (Azure) or image model (OpenAI).
    pub image_model: String,
}

impl OpenAiCompatConfig {
    pub fn from_llm_config(config: &LlmConfig) -> Self {
        Self {
            kind: config.provider,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: SecretString::from(config.api_key.expose_secret().to_string()),
            model: config.deployment_id.clone(),
            api_version: config.api_version.clone(),
            image_model: config.image_deployment_id.clone(),
        }
    }

    pub fn openai_config(&self) -> OpenAIConfig {
        let base_url = if self.base_url.is_empty() {
            OPENAI_DEFAULT_BASE_URL
        } else {
            self.base_url.as_str()
        };
        OpenAIConfig::new()
            .with_api_key(self.api_key.expose_secret())
            .with_api_base(base_url)
    }

    pub fn azure_config(&self) -> AzureConfig {
        self.azure_deployment(&self.model)
    }

    /// Azure URLs are deployment-scoped, so images need their own config.
    pub fn azure_image_config(&self) -> AzureConfig {
        self.azure_deployment(&self.image_model)
    }

    fn azure_deployment(&self, deployment: &str) -> AzureConfig {
        AzureConfig::new()
            .with_api_base(&self.base_url)
            .with_api_key(self.api_key.expose_secret())
            .with_deployment_id(deployment)
            .with_api_version(&self.api_version)
    }
}
