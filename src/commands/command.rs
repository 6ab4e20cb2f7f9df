//! The Command Contract
//!
//! A command is one named remote procedure. It is built once from a
//! [`CommandDefinition`], bound to the registry's shared connection, and
//! reused for every call. Executing a command locks the connection for the
//! whole request/response exchange, which is what keeps the protocol
//! half-duplex when a registry is shared between tasks.

use crate::connection::{ConnectionError, FramedConnection};
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;

/// The single connection every command of a registry talks through.
pub type SharedConnection = Arc<Mutex<FramedConnection>>;

/// A named remote procedure bound to a shared connection.
#[async_trait]
pub trait Command: Send + Sync {
    /// The name the command is registered under.
    fn name(&self) -> &'static str;

    /// Runs one exchange with the agent and returns the decoded reply.
    async fn execute(&self, args: &[&str]) -> Result<String, CommandError>;
}

/// What a factory gets to bind a new command instance.
#[derive(Debug, Clone)]
pub struct CommandContext {
    /// The registry's connection
    pub connection: SharedConnection,
    /// Where file-fetching commands stage received files
    pub staging_root: PathBuf,
}

/// One entry of a static command table: a name and how to build it.
#[derive(Debug, Clone, Copy)]
pub struct CommandDefinition {
    pub name: &'static str,
    pub factory: fn(CommandContext) -> Box<dyn Command>,
}

/// Errors surfaced by the command layer.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    /// No command is registered under this name
    #[error("unknown command '{0}'")]
    UnknownCommand(String),

    /// Two definitions share a name
    #[error("command '{0}' is defined more than once")]
    DuplicateCommand(String),

    /// The arguments were rejected before anything was sent
    #[error("invalid arguments for '{command}': {reason}")]
    InvalidArguments {
        command: &'static str,
        reason: String,
    },

    /// The exchange failed on the connection
    #[error(transparent)]
    Connection(#[from] ConnectionError),
}

impl CommandError {
    /// Returns true if the connection can no longer be trusted.
    ///
    /// Timeouts, peer closes and desyncs all leave the stream at an unknown
    /// frame position; the caller has to reconnect.
    pub fn is_fatal(&self) -> bool {
        matches!(self, CommandError::Connection(_))
    }
}

/// Checks the argument count for `command`.
pub(crate) fn expect_args(
    command: &'static str,
    args: &[&str],
    expected: usize,
) -> Result<(), CommandError> {
    if args.len() == expected {
        Ok(())
    } else {
        Err(CommandError::InvalidArguments {
            command,
            reason: format!("expected {} argument(s), got {}", expected, args.len()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expect_args() {
        assert!(expect_args("ping", &[], 0).is_ok());
        assert!(expect_args("get_dependencies", &["bash"], 1).is_ok());

        let err = expect_args("get_dependencies", &[], 1).unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid arguments for 'get_dependencies': expected 1 argument(s), got 0"
        );
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_connection_errors_are_fatal() {
        let err = CommandError::from(ConnectionError::PeerClosed);
        assert!(err.is_fatal());
        assert_eq!(err.to_string(), "connection closed by peer");

        assert!(!CommandError::UnknownCommand("nope".into()).is_fatal());
    }
}
