//! Shared domain types for Conch.
//!
//! This crate contains the types shared by every layer of the relay:
//! conversation turns, completion requests and stream events, transport
//! updates, configuration, and the error enums that cross crate boundaries.
//!
//! Zero infrastructure dependencies -- only serde, secrecy, thiserror.

pub mod config;
pub mod error;
pub mod llm;
pub mod transport;
