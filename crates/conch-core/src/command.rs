//! Slash command parsing for inbound chat text.
//!
//! Commands are matched by prefix, longest first, so `/resetall` is never
//! mistaken for `/reset`. A Telegram `@botname` suffix is tolerated because
//! only the prefix is inspected.

/// Commands understood by the relay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatCommand {
    /// Reset the conversation and clear the persona override.
    ResetAll,
    /// Reset the conversation, keeping the persona.
    Reset,
    /// Set the persona (system prompt).
    Role(String),
    /// Explicit question; the only way to talk to the bot in group chats.
    Chat(String),
    /// Generate an image from the prompt.
    Draw(String),
}

/// Parse chat text as a command.
///
/// Returns `None` for plain text.
pub fn parse(text: &str) -> Option<ChatCommand> {
    if text.starts_with("/resetall") {
        Some(ChatCommand::ResetAll)
    } else if text.starts_with("/reset") {
        Some(ChatCommand::Reset)
    } else if let Some(rest) = text.strip_prefix("/role") {
        Some(ChatCommand::Role(argument(rest)))
    } else if let Some(rest) = text.strip_prefix("/draw") {
        Some(ChatCommand::Draw(argument(rest)))
    } else if let Some(rest) = text.strip_prefix("/chat") {
        Some(ChatCommand::Chat(argument(rest)))
    } else {
        None
    }
}

/// Strip surrounding spaces from a command argument.
fn argument(rest: &str) -> String {
    rest.trim_matches(' ').to_string()
}
