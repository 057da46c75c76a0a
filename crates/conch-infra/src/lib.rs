//! Infrastructure layer for Conch.
//!
//! Implements the ports defined in `conch-core`: the OpenAI-compatible
//! completion engine (OpenAI and Azure OpenAI), the Telegram Bot API
//! transport, and the `config.toml` loader.

pub mod config;
pub mod llm;
pub mod telegram;
