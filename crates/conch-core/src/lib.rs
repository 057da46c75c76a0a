//! Conversation state and reply streaming for Conch.
//!
//! This crate defines the session store, the streaming reply aggregator, the
//! per-update handler and dispatcher, and the "ports" (`LlmProvider`,
//! `ChatTransport`) that the infrastructure layer implements. It depends only
//! on `conch-types` -- never on `conch-infra` or any HTTP crate.

pub mod access;
pub mod command;
pub mod llm;
pub mod relay;
pub mod session;
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;
