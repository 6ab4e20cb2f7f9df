//! Framed Connection
//!
//! This module turns a raw byte stream into the two framings the agent
//! speaks. Everything read from the socket goes through one [`RingBuffer`];
//! nothing else touches the stream.
//!
//! ## Text Messages
//!
//! ```text
//! ┌──────────────────────────────┐
//! │  buffered bytes?             │──yes──> take_until(delimiter)
//! │                              │            │
//! │                              │     found? ├──yes──> done
//! │                              │            │
//! │                              │<────no─────┘ (bytes kept in output)
//! │  fill from socket (timeout)  │
//! └──────────────────────────────┘
//! ```
//!
//! ## File Transfers
//!
//! A header message `<count> <filename>` is followed by `<count>` raw bytes.
//! Whatever arrived in the same read as the header is drained from the
//! buffer first; the rest is read in buffer-sized steps and streamed to the
//! sink, so a payload can be far larger than the buffer.

use crate::buffer::RingBuffer;
use crate::config::ClientConfig;
use crate::connection::sink::{FileReceipt, FileSink, SinkTarget};
use crate::protocol::{strip_delimiter, FileHeader, HeaderError};
use bytes::{Bytes, BytesMut};
use std::io;
use std::string::FromUtf8Error;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, info, trace, warn};

/// A byte stream the connection can own.
///
/// Implemented for every async stream, so a `TcpStream`, a `DuplexStream` or
/// a test mock can all back a [`FramedConnection`].
pub trait Transport: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin> Transport for T {}

/// Counters for traffic on one connection
#[derive(Debug, Default)]
pub struct TransferStats {
    /// Messages written with `send`
    pub messages_sent: AtomicU64,
    /// Text messages assembled by `recv`
    pub messages_received: AtomicU64,
    /// Completed file transfers
    pub files_received: AtomicU64,
    /// Raw bytes read from the stream
    pub bytes_read: AtomicU64,
    /// Raw bytes written to the stream
    pub bytes_written: AtomicU64,
    /// Commands dispatched through the registry
    pub commands_invoked: AtomicU64,
}

impl TransferStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn message_sent(&self, bytes: usize) {
        self.messages_sent.fetch_add(1, Ordering::Relaxed);
        self.bytes_written
            .fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub fn message_received(&self) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn file_received(&self) {
        self.files_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn bytes_read(&self, count: usize) {
        self.bytes_read.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn command_invoked(&self) {
        self.commands_invoked.fetch_add(1, Ordering::Relaxed);
    }
}

/// A stream connection speaking the delimited text and file framings.
pub struct FramedConnection {
    /// The owned byte stream
    stream: Box<dyn Transport>,

    /// Peer description (for logging)
    peer: String,

    /// Every byte read from the stream lands here first
    buffer: RingBuffer,

    /// Byte terminating each text message
    delimiter: u8,

    /// Upper bound on a single read
    recv_timeout: Duration,

    /// Traffic counters (shared with the registry)
    stats: Arc<TransferStats>,
}

impl FramedConnection {
    /// Wraps an already-open stream.
    ///
    /// # Arguments
    ///
    /// * `stream` - The byte stream to own
    /// * `peer` - How the peer is named in logs
    /// * `config` - Buffer capacity, delimiter and receive timeout
    pub fn new<T: Transport + 'static>(
        stream: T,
        peer: impl Into<String>,
        config: &ClientConfig,
    ) -> Self {
        Self {
            stream: Box::new(stream),
            peer: peer.into(),
            buffer: RingBuffer::new(config.buffer_capacity),
            delimiter: config.delimiter,
            recv_timeout: config.recv_timeout,
            stats: Arc::new(TransferStats::new()),
        }
    }

    /// Opens a TCP connection to the agent named in `config`.
    ///
    /// The receive timeout also bounds the connect attempt.
    pub async fn connect(config: &ClientConfig) -> Result<Self, ConnectionError> {
        let address = config.address();

        let stream = tokio::time::timeout(
            config.recv_timeout,
            TcpStream::connect((config.host.as_str(), config.port)),
        )
        .await
        .map_err(|_| ConnectionError::Timeout(config.recv_timeout))??;
        stream.set_nodelay(true)?;

        info!(peer = %address, "Connected to agent");
        Ok(Self::new(stream, address, config))
    }

    pub fn peer(&self) -> &str {
        &self.peer
    }

    pub fn delimiter(&self) -> u8 {
        self.delimiter
    }

    pub fn recv_timeout(&self) -> Duration {
        self.recv_timeout
    }

    /// Number of received bytes not yet consumed by a frame.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    pub fn stats(&self) -> &Arc<TransferStats> {
        &self.stats
    }

    /// Writes one already-framed message and flushes it.
    pub async fn send(&mut self, message: &[u8]) -> Result<(), ConnectionError> {
        self.stream.write_all(message).await?;
        self.stream.flush().await?;

        self.stats.message_sent(message.len());
        trace!(peer = %self.peer, bytes = message.len(), "Sent message");
        Ok(())
    }

    /// Receives one message, including its trailing delimiter.
    pub async fn recv_raw(&mut self) -> Result<Bytes, ConnectionError> {
        let mut message = BytesMut::new();

        loop {
            if !self.buffer.is_empty() {
                let (bytes, found) = self.buffer.take_until(self.delimiter);
                message.extend_from_slice(&bytes);
                if found {
                    break;
                }
            }

            self.fill(usize::MAX).await?;
        }

        self.stats.message_received();
        debug!(peer = %self.peer, bytes = message.len(), "Received message");
        Ok(message.freeze())
    }

    /// Receives one text message with the delimiter stripped.
    pub async fn recv(&mut self) -> Result<String, ConnectionError> {
        let raw = self.recv_raw().await?;
        let text = strip_delimiter(&raw, self.delimiter);
        Ok(String::from_utf8(text.to_vec())?)
    }

    /// Receives a file transfer and streams its payload into `sink`.
    ///
    /// A header that does not parse is a [`ConnectionError::ProtocolDesync`];
    /// the sink is not touched in that case. If the peer goes away mid
    /// payload, whatever was written so far stays where the sink put it.
    pub async fn recv_file(
        &mut self,
        sink: &mut dyn FileSink,
    ) -> Result<FileReceipt, ConnectionError> {
        let raw = self.recv_raw().await?;
        let text = strip_delimiter(&raw, self.delimiter);
        let parsed = match std::str::from_utf8(text) {
            Ok(text) => FileHeader::parse(text),
            Err(_) => Err(HeaderError::Malformed(
                String::from_utf8_lossy(text).into_owned(),
            )),
        };
        let header = match parsed {
            Ok(header) => header,
            Err(e) => {
                warn!(peer = %self.peer, error = %e, "File header rejected, stream is out of sync");
                return Err(e.into());
            }
        };

        let SinkTarget { path, mut writer } = sink
            .open(&header.filename, header.len)
            .await
            .map_err(ConnectionError::Sink)?;

        let copied = self.copy_payload(header.len, &mut *writer).await;
        // Flushed on failure too, so a partial payload is visible where the sink put it
        let flushed = writer.flush().await.map_err(ConnectionError::Sink);
        copied?;
        flushed?;

        self.stats.file_received();
        info!(
            peer = %self.peer,
            filename = %header.filename,
            bytes = header.len,
            path = %path.display(),
            "File received"
        );

        Ok(FileReceipt {
            len: header.len,
            path,
        })
    }

    /// Moves exactly `len` payload bytes from the stream into `writer`.
    async fn copy_payload(
        &mut self,
        len: u64,
        writer: &mut (dyn AsyncWrite + Send + Unpin),
    ) -> Result<(), ConnectionError> {
        let mut remaining = len;

        while remaining > 0 {
            let want = usize::try_from(remaining).unwrap_or(usize::MAX);

            // Bytes that came in with the header are already buffered
            if self.buffer.is_empty() {
                self.fill(want).await?;
            }

            let chunk = self.buffer.take_exactly(want);
            writer
                .write_all(&chunk)
                .await
                .map_err(ConnectionError::Sink)?;
            remaining -= chunk.len() as u64;
        }

        Ok(())
    }

    /// Shuts down the write side of the stream.
    pub async fn shutdown(&mut self) -> Result<(), ConnectionError> {
        self.stream.shutdown().await?;
        debug!(peer = %self.peer, "Connection shut down");
        Ok(())
    }

    /// Reads once from the stream into the buffer, up to `max` bytes.
    ///
    /// Only the first contiguous free segment is offered to the stream; a
    /// wrapped remainder is picked up by the next call.
    async fn fill(&mut self, max: usize) -> Result<usize, ConnectionError> {
        let dst = self.buffer.writable(max);
        if dst.is_empty() {
            return Ok(0);
        }

        let n = match tokio::time::timeout(self.recv_timeout, self.stream.read(dst)).await {
            Ok(result) => result?,
            Err(_) => {
                debug!(peer = %self.peer, timeout = ?self.recv_timeout, "Receive timed out");
                return Err(ConnectionError::Timeout(self.recv_timeout));
            }
        };

        if n == 0 {
            debug!(peer = %self.peer, "Peer closed the connection mid frame");
            return Err(ConnectionError::PeerClosed);
        }

        self.buffer.commit(n);
        self.stats.bytes_read(n);
        trace!(peer = %self.peer, bytes = n, buffered = self.buffer.len(), "Read data");

        Ok(n)
    }
}

impl std::fmt::Debug for FramedConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FramedConnection")
            .field("peer", &self.peer)
            .field("buffered", &self.buffer.len())
            .field("capacity", &self.buffer.capacity())
            .field("delimiter", &self.delimiter)
            .field("recv_timeout", &self.recv_timeout)
            .finish()
    }
}

/// Errors that can occur on a framed connection.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// I/O error (network issue)
    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),

    /// No bytes arrived within the receive timeout
    #[error("timed out after {0:?} waiting for data")]
    Timeout(Duration),

    /// End of stream before the frame was complete
    #[error("connection closed by peer")]
    PeerClosed,

    /// The stream is no longer frame-aligned
    #[error("protocol desynchronized: {0}")]
    ProtocolDesync(#[from] HeaderError),

    /// A text message was not valid UTF-8
    #[error("message is not valid UTF-8: {0}")]
    InvalidText(#[from] FromUtf8Error),

    /// The file sink could not open or write its target
    #[error("file sink error: {0}")]
    Sink(#[source] io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::sink::StagingDirSink;
    use tokio::io::{duplex, DuplexStream};

    fn test_config(capacity: usize) -> ClientConfig {
        ClientConfig::default()
            .with_buffer_capacity(capacity)
            .with_recv_timeout(Duration::from_millis(200))
    }

    fn pair(capacity: usize) -> (FramedConnection, DuplexStream) {
        let (client, agent) = duplex(64 * 1024);
        (FramedConnection::new(client, "test-agent", &test_config(capacity)), agent)
    }

    fn payload(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i * 7 % 256) as u8).collect()
    }

    #[tokio::test]
    async fn test_recv_message() {
        let (mut conn, mut agent) = pair(4096);
        agent.write_all(b"hello\0").await.unwrap();

        assert_eq!(conn.recv().await.unwrap(), "hello");
        assert_eq!(conn.buffered(), 0);
    }

    #[tokio::test]
    async fn test_recv_raw_keeps_delimiter() {
        let (mut conn, mut agent) = pair(4096);
        agent.write_all(b"hello\0").await.unwrap();

        assert_eq!(&conn.recv_raw().await.unwrap()[..], b"hello\0");
    }

    #[tokio::test]
    async fn test_recv_roundtrip_any_capacity() {
        let messages = ["", "x", "ii\tbash 4.3", "a message longer than the buffer"];

        for capacity in [1, 3, 8, 4096] {
            let (mut conn, mut agent) = pair(capacity);
            for message in messages {
                agent.write_all(message.as_bytes()).await.unwrap();
                agent.write_all(b"\0").await.unwrap();
            }

            for message in messages {
                assert_eq!(conn.recv().await.unwrap(), message, "capacity={}", capacity);
            }
        }
    }

    #[tokio::test]
    async fn test_recv_across_separate_writes() {
        let (mut conn, mut agent) = pair(4096);

        let writer = tokio::spawn(async move {
            for part in [&b"get"[..], b"_inst", b"alled\0"] {
                agent.write_all(part).await.unwrap();
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
            agent
        });

        assert_eq!(conn.recv().await.unwrap(), "get_installed");
        writer.await.unwrap();
    }

    #[tokio::test]
    async fn test_second_buffered_message_needs_no_read() {
        let (mut conn, mut agent) = pair(4096);
        agent.write_all(b"one\0two\0").await.unwrap();

        assert_eq!(conn.recv().await.unwrap(), "one");
        assert_eq!(conn.buffered(), 4);
        // Nothing more is written; this must not wait for the timeout
        assert_eq!(conn.recv().await.unwrap(), "two");
    }

    #[tokio::test]
    async fn test_custom_delimiter() {
        let (client, mut agent) = duplex(1024);
        let config = test_config(64).with_delimiter(b'\n');
        let mut conn = FramedConnection::new(client, "test-agent", &config);

        agent.write_all(b"a\0b\n").await.unwrap();
        assert_eq!(conn.recv().await.unwrap(), "a\0b");
    }

    #[tokio::test]
    async fn test_recv_timeout() {
        let (mut conn, _agent) = pair(4096);

        let err = conn.recv().await.unwrap_err();
        assert!(matches!(err, ConnectionError::Timeout(d) if d == Duration::from_millis(200)));
    }

    #[tokio::test]
    async fn test_recv_timeout_with_partial_message() {
        let (mut conn, mut agent) = pair(4096);
        agent.write_all(b"incompl").await.unwrap();

        assert!(matches!(
            conn.recv().await.unwrap_err(),
            ConnectionError::Timeout(_)
        ));
    }

    #[tokio::test]
    async fn test_peer_closed_before_delimiter() {
        let (mut conn, mut agent) = pair(4096);
        agent.write_all(b"abc").await.unwrap();
        drop(agent);

        assert!(matches!(
            conn.recv().await.unwrap_err(),
            ConnectionError::PeerClosed
        ));
    }

    #[tokio::test]
    async fn test_invalid_utf8() {
        let (mut conn, mut agent) = pair(4096);
        agent.write_all(b"\xff\xfe\0").await.unwrap();

        assert!(matches!(
            conn.recv().await.unwrap_err(),
            ConnectionError::InvalidText(_)
        ));
    }

    #[tokio::test]
    async fn test_send_writes_exact_bytes() {
        let mock = tokio_test::io::Builder::new().write(b"ping\0").build();
        let mut conn = FramedConnection::new(mock, "mock", &test_config(16));

        conn.send(b"ping\0").await.unwrap();

        assert_eq!(conn.stats().messages_sent.load(Ordering::Relaxed), 1);
        assert_eq!(conn.stats().bytes_written.load(Ordering::Relaxed), 5);
    }

    #[tokio::test]
    async fn test_recv_file() {
        let staging = tempfile::tempdir().unwrap();
        let mut sink = StagingDirSink::new(staging.path());
        let (mut conn, mut agent) = pair(4096);

        let data = payload(1024);
        agent.write_all(b"1024 data.bin\0").await.unwrap();
        agent.write_all(&data).await.unwrap();

        let receipt = conn.recv_file(&mut sink).await.unwrap();

        assert_eq!(receipt.len, 1024);
        assert!(receipt.to_string().contains("1024"));
        assert_eq!(receipt.path.file_name().unwrap(), "data.bin");
        assert!(receipt.path.starts_with(staging.path()));
        assert_eq!(std::fs::read(&receipt.path).unwrap(), data);
        assert_eq!(conn.stats().files_received.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn test_recv_file_larger_than_buffer() {
        let staging = tempfile::tempdir().unwrap();
        let mut sink = StagingDirSink::new(staging.path());
        let (mut conn, mut agent) = pair(16);

        let data = payload(5000);
        let writer = tokio::spawn(async move {
            agent.write_all(b"5000 big.bin\0").await.unwrap();
            for chunk in data.chunks(333) {
                agent.write_all(chunk).await.unwrap();
            }
            agent
        });

        let receipt = conn.recv_file(&mut sink).await.unwrap();
        let _agent = writer.await.unwrap();

        assert_eq!(receipt.len, 5000);
        assert_eq!(std::fs::read(&receipt.path).unwrap(), payload(5000));
    }

    #[tokio::test]
    async fn test_bytes_after_payload_stay_buffered() {
        let staging = tempfile::tempdir().unwrap();
        let mut sink = StagingDirSink::new(staging.path());
        let (mut conn, mut agent) = pair(4096);

        agent.write_all(b"3 small\0abcnext\0").await.unwrap();

        let receipt = conn.recv_file(&mut sink).await.unwrap();
        assert_eq!(std::fs::read(&receipt.path).unwrap(), b"abc");
        assert_eq!(conn.recv().await.unwrap(), "next");
    }

    #[tokio::test]
    async fn test_recv_empty_file() {
        let staging = tempfile::tempdir().unwrap();
        let mut sink = StagingDirSink::new(staging.path());
        let (mut conn, mut agent) = pair(4096);

        agent.write_all(b"0 empty.txt\0").await.unwrap();

        let receipt = conn.recv_file(&mut sink).await.unwrap();
        assert_eq!(receipt.len, 0);
        assert!(std::fs::read(&receipt.path).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_recv_file_bad_header_is_desync() {
        let staging = tempfile::tempdir().unwrap();
        let mut sink = StagingDirSink::new(staging.path());
        let (mut conn, mut agent) = pair(4096);

        agent.write_all(b"data.bin\0").await.unwrap();

        let err = conn.recv_file(&mut sink).await.unwrap_err();
        assert!(matches!(
            err,
            ConnectionError::ProtocolDesync(HeaderError::Malformed(_))
        ));
        // The sink was never asked for a destination
        assert_eq!(std::fs::read_dir(staging.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_recv_file_non_utf8_header_is_desync() {
        let staging = tempfile::tempdir().unwrap();
        let mut sink = StagingDirSink::new(staging.path());
        let (mut conn, mut agent) = pair(4096);

        agent.write_all(b"4 \xffdata\0abcd").await.unwrap();

        let err = conn.recv_file(&mut sink).await.unwrap_err();
        assert!(matches!(
            err,
            ConnectionError::ProtocolDesync(HeaderError::Malformed(_))
        ));
        assert_eq!(std::fs::read_dir(staging.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_recv_file_traversal_is_desync() {
        let staging = tempfile::tempdir().unwrap();
        let mut sink = StagingDirSink::new(staging.path());
        let (mut conn, mut agent) = pair(4096);

        agent.write_all(b"4 ../../etc/passwd\0").await.unwrap();

        assert!(matches!(
            conn.recv_file(&mut sink).await.unwrap_err(),
            ConnectionError::ProtocolDesync(_)
        ));
    }

    #[tokio::test]
    async fn test_recv_file_peer_closed_leaves_partial_file() {
        let staging = tempfile::tempdir().unwrap();
        let mut sink = StagingDirSink::new(staging.path());
        let (mut conn, mut agent) = pair(4096);

        agent.write_all(b"100 cut.bin\0only ten!!").await.unwrap();
        drop(agent);

        assert!(matches!(
            conn.recv_file(&mut sink).await.unwrap_err(),
            ConnectionError::PeerClosed
        ));

        let staged: Vec<_> = std::fs::read_dir(staging.path()).unwrap().collect();
        assert_eq!(staged.len(), 1);
        let file = staged[0].as_ref().unwrap().path().join("cut.bin");
        assert_eq!(std::fs::read(file).unwrap(), b"only ten!!");
    }

    #[tokio::test]
    async fn test_recv_file_payload_timeout() {
        let staging = tempfile::tempdir().unwrap();
        let mut sink = StagingDirSink::new(staging.path());
        let (mut conn, mut agent) = pair(4096);

        // Peer stays open but stops sending after 3 of 10 bytes
        agent.write_all(b"10 a.bin\0abc").await.unwrap();

        assert!(matches!(
            conn.recv_file(&mut sink).await.unwrap_err(),
            ConnectionError::Timeout(_)
        ));

        let staged: Vec<_> = std::fs::read_dir(staging.path()).unwrap().collect();
        assert_eq!(staged.len(), 1);
        let file = staged[0].as_ref().unwrap().path().join("a.bin");
        assert_eq!(std::fs::read(file).unwrap(), b"abc");
        drop(agent);
    }

    #[tokio::test]
    async fn test_stats_count_reads() {
        let (mut conn, mut agent) = pair(4096);
        agent.write_all(b"pong\0").await.unwrap();

        conn.recv().await.unwrap();

        let stats = conn.stats();
        assert_eq!(stats.messages_received.load(Ordering::Relaxed), 1);
        assert_eq!(stats.bytes_read.load(Ordering::Relaxed), 5);
    }
}
