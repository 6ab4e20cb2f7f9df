//! Command Module
//!
//! This module turns named remote procedures into callable objects that
//! share one agent connection.
//!
//! ## Architecture
//!
//! ```text
//! caller
//!   │ invoke("get_dependencies", ["bash"])
//!   ▼
//! ┌─────────────────┐
//! │ CommandRegistry │  name ──> Box<dyn Command>
//! └────────┬────────┘
//!          │ execute(args)
//!          ▼
//! ┌─────────────────┐
//! │ Command         │  encode, send, recv / recv_file, decode
//! └────────┬────────┘
//!          │ (locks the shared connection for the whole exchange)
//!          ▼
//! ┌─────────────────┐
//! │FramedConnection │  (connection module)
//! └─────────────────┘
//! ```
//!
//! ## Built-in Commands
//!
//! - `ping`
//! - `get_installed`
//! - `get_dependencies <package>`
//! - `get_file <path>`
//! - `exit` (reserved, sent by `close`)

pub mod builtin;
pub mod command;
pub mod registry;

// Re-export the main types
pub use builtin::{
    ExitCommand, FileCommand, TextCommand, BUILTIN_COMMANDS, EXIT, GET_DEPENDENCIES, GET_FILE,
    GET_INSTALLED, PING,
};
pub use command::{Command, CommandContext, CommandDefinition, CommandError, SharedConnection};
pub use registry::CommandRegistry;
