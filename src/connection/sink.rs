//! Destinations for Received Files
//!
//! `recv_file` does not decide where a payload ends up. It asks a
//! [`FileSink`] for a writable target, streams the payload into it, and
//! reports the path the sink chose. The default [`StagingDirSink`] creates a
//! fresh, uniquely named directory per transfer and never deletes anything;
//! cleanup is the caller's policy.
//!
//! ## Layout
//!
//! ```text
//! <staging_root>/
//! ├── agent-rpc-5f0c…/       one directory per transfer
//! │   └── dpkg.list
//! └── agent-rpc-9b12…/
//!     └── dpkg.list
//! ```

use async_trait::async_trait;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::{AsyncWrite, BufWriter};
use tracing::debug;
use uuid::Uuid;

/// Prefix of every staging directory created by [`StagingDirSink`]
pub const STAGING_DIR_PREFIX: &str = "agent-rpc-";

/// A writable destination chosen by a sink.
pub struct SinkTarget {
    /// Where the bytes end up, reported back to the caller
    pub path: PathBuf,
    /// Receives the payload in order
    pub writer: Box<dyn AsyncWrite + Send + Unpin>,
}

impl fmt::Debug for SinkTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SinkTarget")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

/// Chooses where received files are written.
#[async_trait]
pub trait FileSink: Send {
    /// Opens a destination for a payload of `len` bytes named `filename`.
    ///
    /// `filename` has already been validated: it contains only ASCII word
    /// characters and dots, and is never `.` or `..`.
    async fn open(&mut self, filename: &str, len: u64) -> io::Result<SinkTarget>;
}

/// Writes every received file into its own new directory under a root.
#[derive(Debug, Clone)]
pub struct StagingDirSink {
    root: PathBuf,
}

impl StagingDirSink {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl FileSink for StagingDirSink {
    async fn open(&mut self, filename: &str, len: u64) -> io::Result<SinkTarget> {
        fs::create_dir_all(&self.root).await?;

        // create_dir fails if the name is taken, so the directory is always fresh
        let dir = self
            .root
            .join(format!("{}{}", STAGING_DIR_PREFIX, Uuid::new_v4().simple()));
        fs::create_dir(&dir).await?;

        let path = dir.join(filename);
        let file = fs::File::create(&path).await?;
        debug!(path = %path.display(), bytes = len, "Opened staging file");

        Ok(SinkTarget {
            path,
            writer: Box::new(BufWriter::new(file)),
        })
    }
}

/// Confirmation of a completed file transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileReceipt {
    /// Number of payload bytes written
    pub len: u64,
    /// Where the sink put them
    pub path: PathBuf,
}

impl fmt::Display for FileReceipt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} bytes saved to {}", self.len, self.path.display())
    }
}
