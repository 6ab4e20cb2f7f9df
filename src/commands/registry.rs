//! Command Registry
//!
//! The registry owns the agent connection and a fixed table of commands
//! bound to it. The table is built once, from a static list of
//! [`CommandDefinition`]s, and never changes afterwards.
//!
//! ## Lifecycle
//!
//! ```text
//! connect(address, port)
//!        │
//!        ▼
//! ┌──────────────────────────────┐
//! │ FramedConnection (shared)    │
//! │ name ──> Box<dyn Command>    │
//! └──────────────┬───────────────┘
//!                │ invoke(name, args)   (any number of times)
//!                ▼
//!             close()  ──> sends "exit", shuts the stream down
//! ```
//!
//! Commands serialize on the connection, so a registry behind an `Arc` can
//! be invoked from several tasks; the exchanges simply take turns.

use crate::commands::builtin::{ExitCommand, BUILTIN_COMMANDS, EXIT};
use crate::commands::command::{
    Command, CommandContext, CommandDefinition, CommandError, SharedConnection,
};
use crate::config::ClientConfig;
use crate::connection::{FramedConnection, TransferStats};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Named remote procedures bound to one agent connection.
pub struct CommandRegistry {
    /// The connection every command talks through
    connection: SharedConnection,

    /// Command table, fixed at construction
    commands: HashMap<&'static str, Box<dyn Command>>,

    /// Peer description (for logging)
    peer: String,

    /// Traffic counters of the connection
    stats: Arc<TransferStats>,
}

impl CommandRegistry {
    /// Connects to the agent at `address:port` with default settings.
    pub async fn connect(address: &str, port: u16) -> Result<Self, CommandError> {
        Self::connect_with(&ClientConfig::new(address, port)).await
    }

    /// Connects to the agent named in `config` and binds the built-in commands.
    pub async fn connect_with(config: &ClientConfig) -> Result<Self, CommandError> {
        let connection = FramedConnection::connect(config).await?;
        Self::from_definitions(connection, BUILTIN_COMMANDS, config)
    }

    /// Builds a registry over an open connection from an explicit table.
    ///
    /// Fails with [`CommandError::DuplicateCommand`] if two definitions share
    /// a name.
    pub fn from_definitions(
        connection: FramedConnection,
        definitions: &[CommandDefinition],
        config: &ClientConfig,
    ) -> Result<Self, CommandError> {
        let peer = connection.peer().to_string();
        let stats = Arc::clone(connection.stats());
        let connection: SharedConnection = Arc::new(Mutex::new(connection));

        let mut commands: HashMap<&'static str, Box<dyn Command>> =
            HashMap::with_capacity(definitions.len());

        for definition in definitions {
            if commands.contains_key(definition.name) {
                return Err(CommandError::DuplicateCommand(definition.name.to_string()));
            }

            let command = (definition.factory)(CommandContext {
                connection: Arc::clone(&connection),
                staging_root: config.staging_root.clone(),
            });
            commands.insert(definition.name, command);
        }

        debug!(peer = %peer, commands = commands.len(), "Command table built");

        Ok(Self {
            connection,
            commands,
            peer,
            stats,
        })
    }

    /// Invokes the command registered under `name`.
    ///
    /// An unknown name fails before anything touches the connection.
    pub async fn invoke(&self, name: &str, args: &[&str]) -> Result<String, CommandError> {
        let command = self
            .commands
            .get(name)
            .ok_or_else(|| CommandError::UnknownCommand(name.to_string()))?;

        self.stats.command_invoked();
        debug!(peer = %self.peer, command = name, args = args.len(), "Invoking command");

        let result = command.execute(args).await;
        if let Err(ref e) = result {
            if e.is_fatal() {
                warn!(peer = %self.peer, command = name, error = %e, "Command failed, connection is unusable");
            }
        }
        result
    }

    /// Returns true if a command is registered under `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.commands.contains_key(name)
    }

    /// Registered command names, sorted.
    pub fn command_names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.commands.keys().copied().collect();
        names.sort_unstable();
        names
    }

    pub fn peer(&self) -> &str {
        &self.peer
    }

    pub fn stats(&self) -> &Arc<TransferStats> {
        &self.stats
    }

    /// Tells the agent to end its session, then releases the connection.
    ///
    /// The connection is shut down and dropped even if sending `exit` fails;
    /// the first error is returned.
    pub async fn close(self) -> Result<(), CommandError> {
        let exit = match self.commands.get(EXIT) {
            Some(command) => command.execute(&[]).await,
            None => {
                ExitCommand::new(Arc::clone(&self.connection))
                    .execute(&[])
                    .await
            }
        };

        let shutdown = self.connection.lock().await.shutdown().await;
        info!(peer = %self.peer, "Closed agent session");

        exit?;
        shutdown?;
        Ok(())
    }
}

impl std::fmt::Debug for CommandRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandRegistry")
            .field("peer", &self.peer)
            .field("commands", &self.command_names())
            .finish()
    }
}
