//! Connection Module
//!
//! This module owns the byte stream to the agent and implements the two
//! framings on top of it.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    FramedConnection                         │
//! │                                                             │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐      │
//! │  │ TcpStream   │───>│ RingBuffer  │───>│ recv()      │      │
//! │  │ (owned)     │    │ (fixed cap) │    │ recv_file() │      │
//! │  └─────────────┘    └─────────────┘    └──────┬──────┘      │
//! │         ▲                                     │             │
//! │         │ send()                              ▼             │
//! │                                         FileSink            │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Features
//!
//! - **Receive Timeout**: every read is bounded by the configured timeout
//! - **Fixed Memory**: the ring buffer never grows; file payloads stream
//!   through it to the sink
//! - **Pluggable Sinks**: where received files land is the caller's choice
//! - **Statistics**: message, file and byte counters
//!
//! ## Example
//!
//! ```ignore
//! use agent_rpc::config::ClientConfig;
//! use agent_rpc::connection::{FramedConnection, StagingDirSink};
//!
//! let config = ClientConfig::new("10.0.0.7", 49153);
//! let mut conn = FramedConnection::connect(&config).await?;
//!
//! conn.send(b"ping\0").await?;
//! let reply = conn.recv().await?;
//!
//! conn.send(b"get_file /var/lib/dpkg/status\0").await?;
//! let receipt = conn.recv_file(&mut StagingDirSink::new("/tmp")).await?;
//! println!("{}", receipt);
//! ```

pub mod framed;
pub mod sink;

// Re-export commonly used types
pub use framed::{ConnectionError, FramedConnection, TransferStats, Transport};
pub use sink::{FileReceipt, FileSink, SinkTarget, StagingDirSink, STAGING_DIR_PREFIX};
