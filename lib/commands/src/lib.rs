//! Chat commands for satu.
//!
//! Commands are registered explicitly at startup. The registry implements
//! the session's `Dispatcher`, so it can be handed straight to the
//! `SessionManager`.

pub mod builtin;
pub mod command;
pub mod error;
pub mod registry;

pub use builtin::{PingCommand, StartCommand};
pub use command::{Command, CommandInfo, Invocation, PREFIX, Replier, parse};
pub use error::CommandError;
pub use registry::CommandRegistry;
