//! Error types for command execution.

use std::fmt;

/// Errors from running a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    /// The reply could not be sent.
    ReplyFailed { chat: String, reason: String },
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReplyFailed { chat, reason } => {
                write!(f, "failed to reply to '{chat}': {reason}")
            }
        }
    }
}

impl std::error::Error for CommandError {}
