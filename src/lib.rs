//! # agent-rpc - Remote Procedure Calls to Inventory Agents
//!
//! agent-rpc is the controller side of a small half-duplex RPC protocol used
//! to query software inventory on a remote host. A single persistent TCP
//! connection carries delimiter-terminated text messages and length-prefixed
//! file transfers; a registry turns named remote procedures into callables
//! bound to that connection.
//!
//! ## Features
//!
//! - **Fixed-Memory Receive Path**: one ring buffer per connection absorbs
//!   partial reads and never grows
//! - **Two Framings**: delimited text messages and `<count> <filename>` file
//!   transfers streamed straight to disk
//! - **Static Command Table**: every command is an explicit entry, looked up
//!   by name
//! - **Async I/O**: built on Tokio, with a receive timeout on every read
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                              agent-rpc                                  │
//! │                                                                         │
//! │  ┌─────────────┐    ┌─────────────┐    ┌──────────────────┐             │
//! │  │  Command    │───>│  Command    │───>│ FramedConnection │──> agent    │
//! │  │  Registry   │    │  (bound)    │    │                  │             │
//! │  └─────────────┘    └─────────────┘    └────────┬─────────┘             │
//! │                                                 │                       │
//! │                                                 ▼                       │
//! │                     ┌───────────────┐    ┌─────────────┐                │
//! │                     │ Wire protocol │    │ RingBuffer  │                │
//! │                     │ (request,     │    │ (fixed cap) │                │
//! │                     │  file header) │    └─────────────┘                │
//! │                     └───────────────┘                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```ignore
//! use agent_rpc::CommandRegistry;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let registry = CommandRegistry::connect("10.0.0.7", 49153).await?;
//!
//!     let installed = registry.invoke("get_installed", &[]).await?;
//!     for package in installed.lines() {
//!         println!("{}", package);
//!     }
//!
//!     let deps = registry.invoke("get_dependencies", &["bash"]).await?;
//!     println!("{}", deps);
//!
//!     // Sends "exit" and releases the connection
//!     registry.close().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Module Overview
//!
//! - [`buffer`]: the fixed-capacity ring buffer
//! - [`protocol`]: request encoding and file-transfer headers
//! - [`connection`]: framed connection, file sinks, transfer statistics
//! - [`commands`]: the command contract, built-in commands and the registry
//! - [`config`]: client configuration
//!
//! ## Design Highlights
//!
//! ### Half-Duplex by Construction
//!
//! Commands share the connection through an async mutex and hold it for a
//! whole request/response exchange. There is no way to have two requests in
//! flight on one connection.
//!
//! ### Failures Are Surfaced, Never Retried
//!
//! Timeouts, peer closes and header desyncs all propagate to the caller.
//! After any of them the stream position is unknown; the caller reconnects.

pub mod buffer;
pub mod commands;
pub mod config;
pub mod connection;
pub mod protocol;

// Re-export commonly used types for convenience
pub use buffer::RingBuffer;
pub use commands::{Command, CommandDefinition, CommandError, CommandRegistry, BUILTIN_COMMANDS};
pub use config::ClientConfig;
pub use connection::{ConnectionError, FileReceipt, FileSink, FramedConnection, StagingDirSink};
pub use protocol::{FileHeader, DEFAULT_DELIMITER};

/// The default port agents listen on
pub const DEFAULT_PORT: u16 = 49153;

/// The default agent host
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Version of agent-rpc
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
