//! Built-in Commands
//!
//! The closed set of commands every agent understands:
//!
//! | Command            | Args        | Reply                      |
//! |--------------------|-------------|----------------------------|
//! | `ping`             | none        | text                       |
//! | `get_installed`    | none        | text, one package per line |
//! | `get_dependencies` | `<package>` | text, one entry per line   |
//! | `get_file`         | `<path>`    | file transfer              |
//! | `exit`             | none        | none, the agent hangs up   |
//!
//! The table is static so the full command surface can be read off
//! [`BUILTIN_COMMANDS`] without running anything.

use crate::commands::command::{
    expect_args, Command, CommandContext, CommandDefinition, CommandError, SharedConnection,
};
use crate::connection::StagingDirSink;
use crate::protocol::encode_request;
use async_trait::async_trait;
use bytes::Bytes;
use std::path::PathBuf;
use tracing::debug;

pub const PING: &str = "ping";
pub const GET_INSTALLED: &str = "get_installed";
pub const GET_DEPENDENCIES: &str = "get_dependencies";
pub const GET_FILE: &str = "get_file";

/// The reserved shutdown command; ends the agent's session loop
pub const EXIT: &str = "exit";

/// Every command a registry built by `connect` knows about.
pub static BUILTIN_COMMANDS: &[CommandDefinition] = &[
    CommandDefinition {
        name: PING,
        factory: ping,
    },
    CommandDefinition {
        name: GET_INSTALLED,
        factory: get_installed,
    },
    CommandDefinition {
        name: GET_DEPENDENCIES,
        factory: get_dependencies,
    },
    CommandDefinition {
        name: GET_FILE,
        factory: get_file,
    },
    CommandDefinition {
        name: EXIT,
        factory: exit,
    },
];

fn ping(ctx: CommandContext) -> Box<dyn Command> {
    Box::new(TextCommand::new(PING, 0, ctx.connection))
}

fn get_installed(ctx: CommandContext) -> Box<dyn Command> {
    Box::new(TextCommand::new(GET_INSTALLED, 0, ctx.connection))
}

fn get_dependencies(ctx: CommandContext) -> Box<dyn Command> {
    Box::new(TextCommand::new(GET_DEPENDENCIES, 1, ctx.connection))
}

fn get_file(ctx: CommandContext) -> Box<dyn Command> {
    Box::new(FileCommand::new(GET_FILE, ctx.connection, ctx.staging_root))
}

fn exit(ctx: CommandContext) -> Box<dyn Command> {
    Box::new(ExitCommand::new(ctx.connection))
}

/// Encodes a request, mapping framing problems to argument errors.
fn request(command: &'static str, args: &[&str], delimiter: u8) -> Result<Bytes, CommandError> {
    encode_request(command, args, delimiter).map_err(|e| CommandError::InvalidArguments {
        command,
        reason: e.to_string(),
    })
}

/// A command answered by a single text message.
pub struct TextCommand {
    name: &'static str,
    arity: usize,
    connection: SharedConnection,
}

impl TextCommand {
    pub fn new(name: &'static str, arity: usize, connection: SharedConnection) -> Self {
        Self {
            name,
            arity,
            connection,
        }
    }
}

#[async_trait]
impl Command for TextCommand {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn execute(&self, args: &[&str]) -> Result<String, CommandError> {
        expect_args(self.name, args, self.arity)?;

        let mut conn = self.connection.lock().await;
        let message = request(self.name, args, conn.delimiter())?;
        conn.send(&message).await?;
        Ok(conn.recv().await?)
    }
}

/// A command answered by a file transfer.
///
/// Each call stages the file in a fresh directory under `staging_root` and
/// returns the receipt text, e.g. `"812 bytes saved to /tmp/agent-rpc-…/status"`.
pub struct FileCommand {
    name: &'static str,
    connection: SharedConnection,
    sink: StagingDirSink,
}

impl FileCommand {
    pub fn new(name: &'static str, connection: SharedConnection, staging_root: PathBuf) -> Self {
        Self {
            name,
            connection,
            sink: StagingDirSink::new(staging_root),
        }
    }
}

#[async_trait]
impl Command for FileCommand {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn execute(&self, args: &[&str]) -> Result<String, CommandError> {
        expect_args(self.name, args, 1)?;

        let mut sink = self.sink.clone();
        let mut conn = self.connection.lock().await;
        let message = request(self.name, args, conn.delimiter())?;
        conn.send(&message).await?;

        let receipt = conn.recv_file(&mut sink).await?;
        Ok(receipt.to_string())
    }
}

/// The reserved shutdown command. The agent does not reply to it.
pub struct ExitCommand {
    connection: SharedConnection,
}

impl ExitCommand {
    pub fn new(connection: SharedConnection) -> Self {
        Self { connection }
    }
}

#[async_trait]
impl Command for ExitCommand {
    fn name(&self) -> &'static str {
        EXIT
    }

    async fn execute(&self, args: &[&str]) -> Result<String, CommandError> {
        expect_args(EXIT, args, 0)?;

        let mut conn = self.connection.lock().await;
        let message = request(EXIT, args, conn.delimiter())?;
        conn.send(&message).await?;
        debug!(peer = %conn.peer(), "Sent exit");

        Ok(String::new())
    }
}
