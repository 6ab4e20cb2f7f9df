//! File-Transfer Header
//!
//! A file transfer starts with one ordinary text message announcing the
//! payload, followed immediately by the raw payload bytes:
//!
//! ```text
//! 1024 data.bin<delimiter><1024 raw bytes>
//! ```
//!
//! The header must match `^([0-9]+) ([A-Za-z0-9_.]+)$`. The filename class
//! excludes path separators and whitespace, so a header can never name a
//! location outside the directory the sink chooses. Anything else means the
//! stream is no longer frame-aligned and the exchange has to be abandoned.

use regex::Regex;
use std::fmt;
use std::sync::LazyLock;
use thiserror::Error;

/// Separator between the byte count and the filename
pub const HEADER_SEPARATOR: char = ' ';

static HEADER_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([0-9]+) ([A-Za-z0-9_.]+)$").expect("file header regex must compile")
});

/// Errors raised while parsing a file-transfer header.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HeaderError {
    /// The header does not have the `<count> <filename>` shape
    #[error("malformed file header: {0:?}")]
    Malformed(String),

    /// The byte count does not fit in 64 bits
    #[error("declared length out of range: {0}")]
    LengthOutOfRange(String),

    /// The filename is `.` or `..`
    #[error("reserved filename: {0:?}")]
    ReservedFilename(String),
}

/// A parsed file-transfer header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileHeader {
    /// Number of raw payload bytes that follow the header
    pub len: u64,
    /// Bare filename, free of separators and whitespace
    pub filename: String,
}

impl FileHeader {
    pub fn new(len: u64, filename: impl Into<String>) -> Self {
        Self {
            len,
            filename: filename.into(),
        }
    }

    /// Parses a header message with its delimiter already stripped.
    pub fn parse(header: &str) -> Result<Self, HeaderError> {
        let captures = HEADER_PATTERN
            .captures(header)
            .ok_or_else(|| HeaderError::Malformed(header.to_string()))?;

        let (count, filename) = (&captures[1], &captures[2]);

        let len = count
            .parse::<u64>()
            .map_err(|_| HeaderError::LengthOutOfRange(count.to_string()))?;

        if filename == "." || filename == ".." {
            return Err(HeaderError::ReservedFilename(filename.to_string()));
        }

        Ok(Self::new(len, filename))
    }
}

impl fmt::Display for FileHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.len, HEADER_SEPARATOR, self.filename)
    }
}
