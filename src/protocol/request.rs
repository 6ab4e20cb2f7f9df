//! Request Encoding
//!
//! Requests to the agent are plain text messages terminated by a single
//! delimiter byte:
//!
//! ```text
//! <command>[ <arg>]*<delimiter>
//! ```
//!
//! ## Examples
//!
//! Ping: `ping\0`
//! Dependencies of a package: `get_dependencies openssl\0`
//!
//! Arguments are separated by a single space, so an argument must be
//! non-empty and may not contain whitespace or the delimiter byte.

use bytes::{BufMut, Bytes, BytesMut};
use thiserror::Error;

/// The default message delimiter (the zero byte)
pub const DEFAULT_DELIMITER: u8 = 0;

/// Separator between the command name and each argument
pub const ARGUMENT_SEPARATOR: u8 = b' ';

/// Errors raised while encoding a request.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RequestError {
    /// An argument was the empty string
    #[error("argument {index} is empty")]
    EmptyArgument { index: usize },

    /// An argument would break the request framing
    #[error("argument {index} contains whitespace or the message delimiter")]
    UnframableArgument { index: usize },
}

/// Encodes a request for `command` with positional `args`.
pub fn encode_request(command: &str, args: &[&str], delimiter: u8) -> Result<Bytes, RequestError> {
    let mut buf = BytesMut::with_capacity(
        command.len() + args.iter().map(|a| a.len() + 1).sum::<usize>() + 1,
    );
    encode_request_into(command, args, delimiter, &mut buf)?;
    Ok(buf.freeze())
}

/// Encodes a request into an existing buffer.
///
/// Nothing is written when an argument is rejected.
pub fn encode_request_into(
    command: &str,
    args: &[&str],
    delimiter: u8,
    buf: &mut BytesMut,
) -> Result<(), RequestError> {
    for (index, arg) in args.iter().enumerate() {
        if arg.is_empty() {
            return Err(RequestError::EmptyArgument { index });
        }
        if arg
            .bytes()
            .any(|b| b == delimiter || b.is_ascii_whitespace())
        {
            return Err(RequestError::UnframableArgument { index });
        }
    }

    buf.put_slice(command.as_bytes());
    for arg in args {
        buf.put_u8(ARGUMENT_SEPARATOR);
        buf.put_slice(arg.as_bytes());
    }
    buf.put_u8(delimiter);

    Ok(())
}

/// Strips exactly one trailing `delimiter` from a framed message, if present.
#[inline]
pub fn strip_delimiter(message: &[u8], delimiter: u8) -> &[u8] {
    match message.split_last() {
        Some((&last, rest)) if last == delimiter => rest,
        _ => message,
    }
}
