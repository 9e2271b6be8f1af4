//! RESP2 framing: command encoding and response-line parsing.
//!
//! Commands travel as an array of bulk strings; responses are prefixed with
//! a type byte (`+` simple string, `-` error, `:` integer, `$` bulk string,
//! `*` array). `$-1` and `*-1` are the nil replies.

use bytes::{BufMut, Bytes, BytesMut};
use oxicache_core::{Error, Result};

pub(crate) const CRLF: &[u8] = b"\r\n";

/// A decoded RESP2 reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// Simple string: `+OK\r\n`.
    SimpleString(String),
    /// Error: `-ERR message\r\n`.
    Error(String),
    /// Integer: `:1000\r\n`.
    Integer(i64),
    /// Bulk string: `$5\r\nhello\r\n`.
    BulkString(Bytes),
    /// Nil: `$-1\r\n`.
    Null,
    /// Array: `*2\r\n...`.
    Array(Vec<Value>),
}

/// Encode one command as a RESP2 array of bulk strings.
pub fn write_command(buf: &mut BytesMut, args: &[&[u8]]) {
    let mut lengths = itoa::Buffer::new();
    buf.put_u8(b'*');
    buf.put_slice(lengths.format(args.len()).as_bytes());
    buf.put_slice(CRLF);
    for arg in args {
        buf.put_u8(b'$');
        buf.put_slice(lengths.format(arg.len()).as_bytes());
        buf.put_slice(CRLF);
        buf.put_slice(arg);
        buf.put_slice(CRLF);
    }
}

/// Parse a base-10 integer with an optional leading `-`.
pub fn parse_int(digits: &[u8]) -> Result<i64> {
    let (negative, digits) = match digits.split_first() {
        Some((b'-', rest)) => (true, rest),
        _ => (false, digits),
    };
    if digits.is_empty() {
        return Err(Error::InvalidCharacter);
    }
    let mut value: i64 = 0;
    for &byte in digits {
        if !byte.is_ascii_digit() {
            return Err(Error::InvalidCharacter);
        }
        value = value
            .checked_mul(10)
            .and_then(|v| v.checked_add(i64::from(byte - b'0')))
            .ok_or(Error::Overflow)?;
    }
    Ok(if negative { -value } else { value })
}

/// Parse a bulk-string or array length, where `-1` means nil.
pub fn parse_len(digits: &[u8]) -> Result<Option<usize>> {
    let len = parse_int(digits)?;
    if len == -1 {
        return Ok(None);
    }
    usize::try_from(len)
        .map(Some)
        .map_err(|_| Error::Protocol("negative length"))
}

/// Turn an error reply line (`-message`, prefix included) into an error.
pub(crate) fn error_reply(line: &[u8]) -> Error {
    Error::Redis(lossy(&line[1..]))
}

pub(crate) fn lossy(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}
