//! Receive Buffer Module
//!
//! This module provides the fixed-capacity circular byte store that sits
//! between the raw connection and the framing logic.
//!
//! ## Why a Ring Buffer?
//!
//! TCP is a stream protocol. A single read may deliver half a message, or
//! a message plus the first bytes of a file payload. The ring buffer absorbs
//! whatever the socket hands us and gives it back in the two shapes the
//! framing layer needs:
//!
//! - **By delimiter** (`take_until`) for text messages
//! - **By length** (`take_exactly`) for file payloads
//!
//! ## Memory Layout
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                    RingBuffer (capacity C)                   │
//! ├──────────┬───────────────────────────┬───────────────────────┤
//! │   free   │      unread (len bytes)   │         free          │
//! └──────────┴───────────────────────────┴───────────────────────┘
//!            ▲                           ▲
//!         read_pos                    write_pos
//! ```
//!
//! Both regions may wrap past the end of the storage. The buffer is never
//! reallocated; when it is full, `fill` returns 0 until the caller drains it.
//!
//! ## Example
//!
//! ```
//! use agent_rpc::buffer::RingBuffer;
//!
//! let mut buffer = RingBuffer::new(16);
//! let mut source: &[u8] = b"hello\0world";
//! buffer
//!     .fill(usize::MAX, |dst| std::io::Read::read(&mut source, dst))
//!     .unwrap();
//!
//! let (message, found) = buffer.take_until(0);
//! assert!(found);
//! assert_eq!(&message[..], b"hello\0");
//! assert_eq!(buffer.len(), 5);
//! ```

pub mod ring;

pub use ring::RingBuffer;
