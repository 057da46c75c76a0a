//! Completion-engine abstractions for Conch.
//!
//! - `LlmProvider`: RPITIT trait for concrete engine implementations
//! - `BoxLlmProvider`: Object-safe wrapper for dynamic dispatch

pub mod box_provider;
pub mod provider;
