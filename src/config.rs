//! Client Configuration
//!
//! Everything the transport needs to know before it opens a connection.
//! The defaults match what agents expect out of the box: a zero-byte
//! delimiter, a 4 KB receive buffer and a five second receive timeout.

use crate::protocol::DEFAULT_DELIMITER;
use std::path::PathBuf;
use std::time::Duration;

/// Default receive buffer capacity (4 KB)
pub const DEFAULT_BUFFER_CAPACITY: usize = 4096;

/// Default receive timeout
pub const DEFAULT_RECV_TIMEOUT: Duration = Duration::from_secs(5);

/// Configuration for a client connection.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Agent host to connect to
    pub host: String,

    /// Agent port to connect to
    pub port: u16,

    /// Capacity of the receive ring buffer in bytes
    pub buffer_capacity: usize,

    /// How long a single read may wait before the exchange fails
    pub recv_timeout: Duration,

    /// Byte terminating every text message
    pub delimiter: u8,

    /// Directory under which received files get their staging directories
    pub staging_root: PathBuf,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: crate::DEFAULT_HOST.to_string(),
            port: crate::DEFAULT_PORT,
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
            recv_timeout: DEFAULT_RECV_TIMEOUT,
            delimiter: DEFAULT_DELIMITER,
            staging_root: std::env::temp_dir(),
        }
    }
}

impl ClientConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Self::default()
        }
    }

    pub fn with_buffer_capacity(mut self, capacity: usize) -> Self {
        self.buffer_capacity = capacity;
        self
    }

    pub fn with_recv_timeout(mut self, timeout: Duration) -> Self {
        self.recv_timeout = timeout;
        self
    }

    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn with_staging_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.staging_root = root.into();
        self
    }

    /// Returns the agent address as `host:port`.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.buffer_capacity, 4096);
        assert_eq!(config.recv_timeout, Duration::from_secs(5));
        assert_eq!(config.delimiter, 0);
    }

    #[test]
    fn test_builder() {
        let config = ClientConfig::new("10.0.0.7", 9000)
            .with_buffer_capacity(64)
            .with_recv_timeout(Duration::from_millis(250))
            .with_delimiter(b'\n')
            .with_staging_root("/var/tmp/agent");

        assert_eq!(config.address(), "10.0.0.7:9000");
        assert_eq!(config.buffer_capacity, 64);
        assert_eq!(config.recv_timeout, Duration::from_millis(250));
        assert_eq!(config.delimiter, b'\n');
        assert_eq!(config.staging_root, PathBuf::from("/var/tmp/agent"));
    }
}
