//! Completion-engine implementations.
//!
//! Provides the provider factory ([`create_provider`]) that picks the
//! OpenAI-compatible backend flavour from the `[llm]` config section.

pub mod openai_compat;

use conch_core::llm::box_provider::BoxLlmProvider;
use conch_types::config::LlmConfig;
use conch_types::llm::ProviderKind;

use self::openai_compat::OpenAiCompatibleProvider;
use self::openai_compat::config::OpenAiCompatConfig;

/// Create a [`BoxLlmProvider`] from the `[llm]` section.
pub fn create_provider(config: &LlmConfig) -> BoxLlmProvider {
    let compat = OpenAiCompatConfig::from_llm_config(config);
    tracing::info!(
        provider = %compat.kind,
        base_url = %compat.base_url,
        model = %compat.model,
        stream = config.stream,
        "Completion engine configured"
    );
    match compat.kind {
        ProviderKind::Azure => BoxLlmProvider::new(OpenAiCompatibleProvider::azure(&compat)),
        ProviderKind::OpenAi => BoxLlmProvider::new(OpenAiCompatibleProvider::openai(&compat)),
    }
}
