//! Commands every installation has.

use crate::command::{Command, Invocation, PREFIX, Replier};
use crate::error::CommandError;
use async_trait::async_trait;
use rootcause::Report;
use std::fmt::Write as _;

/// `#ping`: confirms the bot is alive.
#[derive(Debug, Clone, Copy, Default)]
pub struct PingCommand;

#[async_trait]
impl Command for PingCommand {
    fn name(&self) -> &str {
        "ping"
    }

    fn description(&self) -> &str {
        "Check bot status"
    }

    async fn execute(
        &self,
        replier: &dyn Replier,
        invocation: &Invocation<'_>,
    ) -> Result<(), Report<CommandError>> {
        invocation.reply(replier, "Pong! Bot is running!").await
    }
}

/// `#start`: greets and lists the available commands.
#[derive(Debug, Clone, Copy, Default)]
pub struct StartCommand;

#[async_trait]
impl Command for StartCommand {
    fn name(&self) -> &str {
        "start"
    }

    fn description(&self) -> &str {
        "Show this message"
    }

    async fn execute(
        &self,
        replier: &dyn Replier,
        invocation: &Invocation<'_>,
    ) -> Result<(), Report<CommandError>> {
        let mut text = String::from("Bot is now active!\n\nAvailable commands:");
        for command in invocation.commands {
            let _ = write!(text, "\n{PREFIX}{} - {}", command.name, command.description);
        }
        invocation.reply(replier, text).await
    }
}
