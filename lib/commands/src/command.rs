//! The command contract and prefix parsing.

use crate::error::CommandError;
use async_trait::async_trait;
use rootcause::Report;
use satu_core::Payload;
use satu_session::{InboundMessage, SessionError, SessionHandle};

/// Marks a message as a command.
pub const PREFIX: char = '#';

/// Where command replies go.
#[async_trait]
pub trait Replier: Send + Sync {
    /// Sends `payload` to `chat`.
    ///
    /// # Errors
    ///
    /// Returns an error if the message could not be delivered.
    async fn reply(&self, chat: &str, payload: Payload) -> Result<(), Report<SessionError>>;
}

#[async_trait]
impl Replier for SessionHandle {
    async fn reply(&self, chat: &str, payload: Payload) -> Result<(), Report<SessionError>> {
        self.send_message(chat, payload).await?;
        Ok(())
    }
}

/// Name and description of a registered command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandInfo {
    pub name: String,
    pub description: String,
}

/// One parsed command call.
#[derive(Debug)]
pub struct Invocation<'a> {
    /// Lowercased command name.
    pub name: String,
    /// Whitespace-separated arguments after the name.
    pub args: Vec<&'a str>,
    pub message: &'a InboundMessage,
    /// Every registered command, sorted by name.
    pub commands: &'a [CommandInfo],
}

impl Invocation<'_> {
    /// Replies in the chat the command came from.
    ///
    /// # Errors
    ///
    /// Returns an error if the reply could not be delivered.
    pub async fn reply(
        &self,
        replier: &dyn Replier,
        text: impl Into<String>,
    ) -> Result<(), Report<CommandError>> {
        let chat = &self.message.chat;
        replier
            .reply(chat, Payload::text(text))
            .await
            .map_err(|e| CommandError::ReplyFailed {
                chat: chat.clone(),
                reason: e.to_string(),
            })?;
        Ok(())
    }
}

/// A chat command.
#[async_trait]
pub trait Command: Send + Sync {
    /// The name typed after the prefix. Matched case-insensitively.
    fn name(&self) -> &str;

    /// One line for the command list.
    fn description(&self) -> &str;

    /// Runs the command.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails; the registry logs it.
    async fn execute(
        &self,
        replier: &dyn Replier,
        invocation: &Invocation<'_>,
    ) -> Result<(), Report<CommandError>>;
}

/// Splits command text into its lowercased name and arguments.
///
/// Returns `None` for text without the prefix or with nothing after it.
#[must_use]
pub fn parse(text: &str) -> Option<(String, Vec<&str>)> {
    let rest = text.strip_prefix(PREFIX)?;
    let mut words = rest.split_whitespace();
    let name = words.next()?.to_lowercase();
    Some((name, words.collect()))
}
