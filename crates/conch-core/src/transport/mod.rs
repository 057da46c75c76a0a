//! Chat-transport abstractions for Conch.
//!
//! - `ChatTransport`: RPITIT trait for concrete transports (Telegram, ...)
//! - `BoxChatTransport`: Object-safe wrapper for dynamic dispatch

pub mod box_transport;
pub mod channel;
