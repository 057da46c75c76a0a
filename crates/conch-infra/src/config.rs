//! Configuration loader for Conch.
//!
//! Reads `config.toml` and deserializes it into [`BotConfig`]. Unlike most
//! settings files, a missing or malformed config is an error: the relay cannot
//! run without its credentials.

use std::path::{Path, PathBuf};

use conch_types::config::BotConfig;
use conch_types::error::ConfigError;

const CONFIG_FILE: &str = "config.toml";

/// Where to look for the config when none is given on the command line.
///
/// `./config.toml` if it exists, otherwise `<config dir>/conch/config.toml`.
pub fn default_config_path() -> PathBuf {
    let local = PathBuf::from(CONFIG_FILE);
    if local.exists() {
        return local;
    }
    match dirs::config_dir() {
        Some(dir) => dir.join("conch").join(CONFIG_FILE),
        None => local,
    }
}

/// Load and parse the configuration at `path`.
pub async fn load_config(path: &Path) -> Result<BotConfig, ConfigError> {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        Err(source) => {
            return Err(ConfigError::Read {
                path: path.to_path_buf(),
                source,
            });
        }
    };

    let config = toml::from_str::<BotConfig>(&content).map_err(|err| ConfigError::Parse {
        path: path.to_path_buf(),
        message: err.to_string(),
    })?;

    tracing::debug!(
        path = %path.display(),
        provider = %config.llm.provider,
        allowed_chats = config.allowed_chat_ids.len(),
        "Configuration loaded"
    );
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use tempfile::TempDir;

    const MINIMAL: &str = r#"
[telegram]
api_key = "123:ABC"

[llm]
base_url = "https://conch.openai.azure.com"
api_key = "azure-key"
deployment_id = "gpt-4o"
"#;

    #[tokio::test]
    async fn load_config_missing_file_is_not_found() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        let err = load_config(&path).await.unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(p) if p == path));
    }

    #[tokio::test]
    async fn load_config_minimal_uses_defaults() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        tokio::fs::write(&path, MINIMAL).await.unwrap();

        let config = load_config(&path).await.unwrap();
        assert!(!config.debug);
        assert!(!config.parallel_chats);
        assert!(config.allowed_chat_ids.is_empty());
        assert_eq!(config.telegram.api_key.expose_secret(), "123:ABC");
        assert_eq!(config.telegram.poll_timeout_secs, 30);
        assert_eq!(config.llm.deployment_id, "gpt-4o");
        assert!(config.llm.stream);
        assert_eq!(config.conversation.past_messages_included, 10);
    }

    #[tokio::test]
    async fn load_config_full_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        tokio::fs::write(
            &path,
            r#"
debug = true
parallel_chats = true
allowed_chat_ids = [42, -1001234]

[telegram]
api_key = "123:ABC"

[llm]
provider = "openai"
base_url = "https://api.openai.com/v1"
api_key = "sk-test"
deployment_id = "gpt-4o-mini"
stream = false

[conversation]
past_messages_included = 6
max_tokens = 300
temperature = 0.2
system_prompt_default = "You are the magic conch."
"#,
        )
        .await
        .unwrap();

        let config = load_config(&path).await.unwrap();
        assert!(config.debug);
        assert!(config.parallel_chats);
        assert_eq!(config.allowed_chat_ids, vec![42, -1001234]);
        assert_eq!(config.llm.provider.to_string(), "openai");
        assert!(!config.llm.stream);
        assert_eq!(config.conversation.max_tokens, 300);
        assert_eq!(
            config.conversation.system_prompt_default,
            "You are the magic conch."
        );
    }

    #[tokio::test]
    async fn load_config_invalid_toml_is_parse_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        tokio::fs::write(&path, "this is not [valid toml {{{")
            .await
            .unwrap();

        let err = load_config(&path).await.unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[tokio::test]
    async fn load_config_missing_credentials_is_parse_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        tokio::fs::write(&path, "debug = true\n").await.unwrap();

        let err = load_config(&path).await.unwrap_err();
        assert!(err.to_string().contains("failed to parse"));
    }

    #[test]
    fn default_config_path_ends_with_file_name() {
        assert!(default_config_path().ends_with(CONFIG_FILE));
    }
}
