//! The command registry.

use crate::builtin::{PingCommand, StartCommand};
use crate::command::{Command, CommandInfo, Invocation, PREFIX, Replier, parse};
use async_trait::async_trait;
use satu_session::{Dispatcher, InboundMessage, SessionHandle};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, error, info, instrument};

/// Maps command names to handlers.
#[derive(Default, Clone)]
pub struct CommandRegistry {
    commands: BTreeMap<String, Arc<dyn Command>>,
}

impl std::fmt::Debug for CommandRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandRegistry")
            .field("commands", &self.commands.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl CommandRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with `#ping` and `#start`.
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(PingCommand);
        registry.register(StartCommand);
        info!(
            prefix = %PREFIX,
            commands = ?registry.commands.keys().collect::<Vec<_>>(),
            "registered commands"
        );
        registry
    }

    /// Adds a command, replacing any with the same name.
    pub fn register(&mut self, command: impl Command + 'static) -> &mut Self {
        let name = command.name().to_lowercase();
        debug!(%name, "registering command");
        self.commands.insert(name, Arc::new(command));
        self
    }

    /// Looks up a command by name, ignoring case.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<dyn Command>> {
        self.commands.get(&name.to_lowercase()).cloned()
    }

    /// Every registered command, sorted by name.
    #[must_use]
    pub fn list(&self) -> Vec<CommandInfo> {
        self.commands
            .iter()
            .map(|(name, command)| CommandInfo {
                name: name.clone(),
                description: command.description().to_string(),
            })
            .collect()
    }

    /// Runs the command in `message`, if there is one.
    ///
    /// Returns the name of the command that ran. Unknown commands and
    /// ordinary text are ignored; command failures are logged.
    #[instrument(skip_all, fields(chat = %message.chat))]
    pub async fn handle(&self, replier: &dyn Replier, message: &InboundMessage) -> Option<String> {
        let (name, args) = parse(message.text()?)?;
        let Some(command) = self.commands.get(&name) else {
            debug!(%name, "unknown command");
            return None;
        };

        let commands = self.list();
        let invocation = Invocation {
            name,
            args,
            message,
            commands: &commands,
        };

        info!(command = %invocation.name, "executing command");
        if let Err(e) = command.execute(replier, &invocation).await {
            error!(command = %invocation.name, error = %e, "command failed");
        }
        Some(invocation.name)
    }
}

#[async_trait]
impl Dispatcher for CommandRegistry {
    async fn dispatch(&self, session: SessionHandle, message: InboundMessage) {
        self.handle(&session, &message).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CommandError;
    use rootcause::Report;
    use satu_core::{ConnectionStatus, Payload};
    use satu_session::SessionError;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingReplier {
        replies: Mutex<Vec<(String, Payload)>>,
        fail: bool,
    }

    #[async_trait]
    impl Replier for RecordingReplier {
        async fn reply(&self, chat: &str, payload: Payload) -> Result<(), Report<SessionError>> {
            if self.fail {
                return Err(SessionError::NotReady {
                    status: ConnectionStatus::Disconnected,
                }
                .into());
            }
            self.replies
                .lock()
                .unwrap()
                .push((chat.to_string(), payload));
            Ok(())
        }
    }

    impl RecordingReplier {
        fn texts(&self) -> Vec<String> {
            self.replies
                .lock()
                .unwrap()
                .iter()
                .filter_map(|(_, p)| p.as_text().map(str::to_string))
                .collect()
        }
    }

    struct EchoCommand;

    #[async_trait]
    impl Command for EchoCommand {
        fn name(&self) -> &str {
            "Echo"
        }

        fn description(&self) -> &str {
            "Repeat the arguments"
        }

        async fn execute(
            &self,
            replier: &dyn Replier,
            invocation: &Invocation<'_>,
        ) -> Result<(), Report<CommandError>> {
            invocation.reply(replier, invocation.args.join(" ")).await
        }
    }

    fn message(text: &str) -> InboundMessage {
        InboundMessage {
            id: "3EB0C767D26A".to_string(),
            chat: "628111@s.whatsapp.net".to_string(),
            sender: None,
            from_me: false,
            live: true,
            payload: Payload::text(text),
        }
    }

    #[tokio::test]
    async fn ping_replies_in_the_same_chat() {
        let registry = CommandRegistry::with_defaults();
        let replier = RecordingReplier::default();

        let ran = registry.handle(&replier, &message("#PING")).await;

        assert_eq!(ran.as_deref(), Some("ping"));
        let replies = replier.replies.lock().unwrap().clone();
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].0, "628111@s.whatsapp.net");
        assert_eq!(replies[0].1.as_text(), Some("Pong! Bot is running!"));
    }

    #[tokio::test]
    async fn start_lists_registered_commands() {
        let mut registry = CommandRegistry::with_defaults();
        registry.register(EchoCommand);
        let replier = RecordingReplier::default();

        registry.handle(&replier, &message("#start")).await;

        assert_eq!(
            replier.texts(),
            vec![
                "Bot is now active!\n\nAvailable commands:\n\
                 #echo - Repeat the arguments\n\
                 #ping - Check bot status\n\
                 #start - Show this message"
                    .to_string()
            ]
        );
    }

    #[tokio::test]
    async fn arguments_reach_the_command() {
        let mut registry = CommandRegistry::new();
        registry.register(EchoCommand);
        let replier = RecordingReplier::default();

        registry.handle(&replier, &message("#echo  a  b")).await;

        assert_eq!(replier.texts(), vec!["a b".to_string()]);
    }

    #[tokio::test]
    async fn ignores_plain_text_and_unknown_commands() {
        let registry = CommandRegistry::with_defaults();
        let replier = RecordingReplier::default();

        assert_eq!(registry.handle(&replier, &message("ping")).await, None);
        assert_eq!(registry.handle(&replier, &message("#nope")).await, None);
        assert!(replier.texts().is_empty());
    }

    #[tokio::test]
    async fn ignores_non_text_payloads() {
        let registry = CommandRegistry::with_defaults();
        let replier = RecordingReplier::default();
        let mut image = message("");
        image.payload = Payload::default();

        assert_eq!(registry.handle(&replier, &image).await, None);
    }

    #[tokio::test]
    async fn reply_failures_are_contained() {
        let registry = CommandRegistry::with_defaults();
        let replier = RecordingReplier {
            fail: true,
            ..RecordingReplier::default()
        };

        let ran = registry.handle(&replier, &message("#ping")).await;
        assert_eq!(ran.as_deref(), Some("ping"));
    }

    #[test]
    fn lookup_ignores_case() {
        let registry = CommandRegistry::with_defaults();
        assert!(registry.get("PiNg").is_some());
        assert!(registry.get("echo").is_none());
        assert_eq!(registry.list().len(), 2);
    }
}
