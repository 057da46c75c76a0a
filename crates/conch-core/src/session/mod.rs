//! Per-chat conversation state.
//!
//! `SessionStore` owns one `Conversation` per chat identity, keeps the system
//! turn pinned at index 0, and enforces the retention window.

pub mod conversation;
pub mod store;
