//! Agent Wire Protocol
//!
//! This module defines the byte-level formats exchanged with the agent.
//!
//! ## Overview
//!
//! The protocol is half-duplex and text based:
//!
//! - Every message is a run of bytes terminated by one delimiter byte
//!   (the zero byte unless configured otherwise).
//! - A request is the command name followed by space-separated arguments.
//! - A file transfer is a header message `<count> <filename>` followed by
//!   exactly `<count>` raw bytes with no further framing.
//!
//! ## Modules
//!
//! - `request`: request encoding and delimiter handling
//! - `header`: file-transfer header parsing
//!
//! ## Example
//!
//! ```
//! use agent_rpc::protocol::{encode_request, FileHeader, DEFAULT_DELIMITER};
//!
//! let request = encode_request("get_dependencies", &["bash"], DEFAULT_DELIMITER).unwrap();
//! assert_eq!(&request[..], b"get_dependencies bash\0");
//!
//! let header = FileHeader::parse("1024 data.bin").unwrap();
//! assert_eq!(header.len, 1024);
//! ```

pub mod header;
pub mod request;

// Re-export commonly used types for convenience
pub use header::{FileHeader, HeaderError, HEADER_SEPARATOR};
pub use request::{
    encode_request, encode_request_into, strip_delimiter, RequestError, ARGUMENT_SEPARATOR,
    DEFAULT_DELIMITER,
};
