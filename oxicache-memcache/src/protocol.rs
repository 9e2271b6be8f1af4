//! Meta-protocol framing: command encoding and response-line parsing.
//!
//! Commands are space-separated ASCII tokens terminated by CRLF; payloads
//! follow on their own CRLF-terminated line. Response lines start with a
//! two-letter code (`VA`, `HD`, `EN`, `NS`, `EX`, `NF`) or a word
//! (`OK`, `VERSION`, `SERVER_ERROR`).

use bytes::{BufMut, BytesMut};
use oxicache_core::{Error, Result};

use crate::client::{SetMode, SetOptions};

pub(crate) const CRLF: &[u8] = b"\r\n";

/// A parsed response status line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ResponseLine {
    /// `VA <size> [f<flags>] [c<cas>]`: `size` payload bytes follow.
    Value { size: usize, flags: u32, cas: u64 },
    /// `HD [...]`: stored / hit, no payload.
    Stored,
    /// `EN`: miss.
    Miss,
}

/// `mg <key> v f c`: fetch value, flags and CAS token.
pub(crate) fn write_get(buf: &mut BytesMut, key: &[u8]) {
    buf.put_slice(b"mg ");
    buf.put_slice(key);
    buf.put_slice(b" v f c");
    buf.put_slice(CRLF);
}

/// `ms <key> <size> [T<ttl>] [F<flags>] [C<cas>] [M<mode>]` plus payload.
pub(crate) fn write_store(
    buf: &mut BytesMut,
    key: &[u8],
    value: &[u8],
    options: &SetOptions,
    mode: SetMode,
) {
    let mut numbers = itoa::Buffer::new();
    buf.put_slice(b"ms ");
    buf.put_slice(key);
    buf.put_u8(b' ');
    buf.put_slice(numbers.format(value.len()).as_bytes());
    if options.ttl > 0 {
        buf.put_slice(b" T");
        buf.put_slice(numbers.format(options.ttl).as_bytes());
    }
    if options.flags > 0 {
        buf.put_slice(b" F");
        buf.put_slice(numbers.format(options.flags).as_bytes());
    }
    if let Some(cas) = options.cas {
        buf.put_slice(b" C");
        buf.put_slice(numbers.format(cas).as_bytes());
    }
    if let Some(token) = mode.token() {
        buf.put_u8(b' ');
        buf.put_slice(token);
    }
    buf.put_slice(CRLF);
    buf.put_slice(value);
    buf.put_slice(CRLF);
}

/// `md <key>`.
pub(crate) fn write_delete(buf: &mut BytesMut, key: &[u8]) {
    buf.put_slice(b"md ");
    buf.put_slice(key);
    buf.put_slice(CRLF);
}

/// `ma <key> v D<delta> [MD]`: increment, or decrement with `MD`.
pub(crate) fn write_arithmetic(buf: &mut BytesMut, key: &[u8], delta: u64, decrement: bool) {
    let mut numbers = itoa::Buffer::new();
    buf.put_slice(b"ma ");
    buf.put_slice(key);
    buf.put_slice(b" v D");
    buf.put_slice(numbers.format(delta).as_bytes());
    if decrement {
        buf.put_slice(b" MD");
    }
    buf.put_slice(CRLF);
}

/// `mg <key> T<ttl>`: touch is a meta-get carrying only a TTL update.
pub(crate) fn write_touch(buf: &mut BytesMut, key: &[u8], ttl: u32) {
    let mut numbers = itoa::Buffer::new();
    buf.put_slice(b"mg ");
    buf.put_slice(key);
    buf.put_slice(b" T");
    buf.put_slice(numbers.format(ttl).as_bytes());
    buf.put_slice(CRLF);
}

pub(crate) fn write_flush_all(buf: &mut BytesMut) {
    buf.put_slice(b"flush_all");
    buf.put_slice(CRLF);
}

pub(crate) fn write_version(buf: &mut BytesMut) {
    buf.put_slice(b"version");
    buf.put_slice(CRLF);
}

/// Parse a response status line.
///
/// The semantic rejections map straight to their error kinds: `NS` is
/// [`Error::NotStored`], `EX` is [`Error::Exists`], `NF` is
/// [`Error::NotFound`], `SERVER_ERROR` and any unknown code are
/// [`Error::Server`]. All of those leave the stream framed.
pub(crate) fn parse_response(line: &[u8]) -> Result<ResponseLine> {
    let mut tokens = line.split(|&b| b == b' ').filter(|t| !t.is_empty());
    let code = tokens.next().ok_or(Error::Protocol("empty response line"))?;
    match code {
        b"VA" => {
            let size = tokens.next().ok_or(Error::Protocol("VA without size"))?;
            let size = usize::try_from(parse_u64(size)?).map_err(|_| Error::Overflow)?;
            let (flags, cas) = parse_item_tokens(tokens)?;
            Ok(ResponseLine::Value { size, flags, cas })
        }
        b"HD" => Ok(ResponseLine::Stored),
        b"EN" => Ok(ResponseLine::Miss),
        b"NS" => Err(Error::NotStored),
        b"EX" => Err(Error::Exists),
        b"NF" => Err(Error::NotFound),
        _ => Err(server_error(line)),
    }
}

/// Parse the payload of a `version` reply.
pub(crate) fn parse_version(line: &[u8]) -> Result<String> {
    match line.strip_prefix(b"VERSION ") {
        Some(version) => Ok(String::from_utf8_lossy(version).into_owned()),
        None => Err(match parse_response(line) {
            Ok(_) => Error::UnexpectedType,
            Err(err) => err,
        }),
    }
}

/// Interpret any non-`OK` reply to `flush_all` as an error.
pub(crate) fn flush_all_error(line: &[u8]) -> Error {
    match parse_response(line) {
        Ok(_) => Error::UnexpectedType,
        Err(err) => err,
    }
}

/// Parse a decimal `u64` field.
pub(crate) fn parse_u64(digits: &[u8]) -> Result<u64> {
    if digits.is_empty() {
        return Err(Error::InvalidCharacter);
    }
    let mut value: u64 = 0;
    for &byte in digits {
        if !byte.is_ascii_digit() {
            return Err(Error::InvalidCharacter);
        }
        value = value
            .checked_mul(10)
            .and_then(|v| v.checked_add(u64::from(byte - b'0')))
            .ok_or(Error::Overflow)?;
    }
    Ok(value)
}

fn parse_item_tokens<'a>(tokens: impl Iterator<Item = &'a [u8]>) -> Result<(u32, u64)> {
    let mut flags = 0u32;
    let mut cas = 0u64;
    for token in tokens {
        match token.split_first() {
            Some((b'f', digits)) => {
                flags = u32::try_from(parse_u64(digits)?).map_err(|_| Error::Overflow)?;
            }
            Some((b'c', digits)) => {
                cas = parse_u64(digits)?;
            }
            // tokens we did not ask for
            _ => {}
        }
    }
    Ok((flags, cas))
}

fn server_error(line: &[u8]) -> Error {
    let message = line.strip_prefix(b"SERVER_ERROR ").unwrap_or(line);
    Error::Server(String::from_utf8_lossy(message).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_frame() {
        let mut buf = BytesMut::new();
        write_get(&mut buf, b"hello");
        assert_eq!(buf.as_ref(), b"mg hello v f c\r\n");
    }

    #[test]
    fn store_frame_with_every_option() {
        let mut buf = BytesMut::new();
        let options = SetOptions {
            ttl: 60,
            flags: 7,
            cas: Some(42),
        };
        write_store(&mut buf, b"k", b"value", &options, SetMode::Add);
        assert_eq!(buf.as_ref(), b"ms k 5 T60 F7 C42 ME\r\nvalue\r\n");
    }

    #[test]
    fn store_frame_omits_zero_options() {
        let mut buf = BytesMut::new();
        write_store(&mut buf, b"k", b"v", &SetOptions::default(), SetMode::Set);
        assert_eq!(buf.as_ref(), b"ms k 1\r\nv\r\n");
    }

    #[test]
    fn arithmetic_frames() {
        let mut buf = BytesMut::new();
        write_arithmetic(&mut buf, b"counter", 5, false);
        assert_eq!(buf.as_ref(), b"ma counter v D5\r\n");

        buf.clear();
        write_arithmetic(&mut buf, b"counter", 1, true);
        assert_eq!(buf.as_ref(), b"ma counter v D1 MD\r\n");
    }

    #[test]
    fn touch_is_a_meta_get_with_ttl() {
        let mut buf = BytesMut::new();
        write_touch(&mut buf, b"k", 300);
        assert_eq!(buf.as_ref(), b"mg k T300\r\n");
    }

    #[test]
    fn value_line_carries_flags_and_cas() {
        assert_eq!(
            parse_response(b"VA 5 f32 c99").unwrap(),
            ResponseLine::Value {
                size: 5,
                flags: 32,
                cas: 99
            }
        );
        assert_eq!(
            parse_response(b"VA 0").unwrap(),
            ResponseLine::Value {
                size: 0,
                flags: 0,
                cas: 0
            }
        );
    }

    #[test]
    fn status_codes_map_to_error_kinds() {
        assert_eq!(parse_response(b"HD").unwrap(), ResponseLine::Stored);
        assert_eq!(parse_response(b"EN").unwrap(), ResponseLine::Miss);
        assert!(matches!(parse_response(b"NS"), Err(Error::NotStored)));
        assert!(matches!(parse_response(b"EX"), Err(Error::Exists)));
        assert!(matches!(parse_response(b"NF"), Err(Error::NotFound)));
        assert!(matches!(
            parse_response(b"SERVER_ERROR out of memory"),
            Err(Error::Server(message)) if message == "out of memory"
        ));
    }

    #[test]
    fn unknown_codes_are_server_errors() {
        assert!(matches!(parse_response(b"WAT"), Err(Error::Server(_))));
    }

    #[test]
    fn version_reply() {
        assert_eq!(parse_version(b"VERSION 1.6.31").unwrap(), "1.6.31");
        assert!(matches!(
            parse_version(b"SERVER_ERROR busy"),
            Err(Error::Server(_))
        ));
    }

    #[test]
    fn rejects_malformed_numbers() {
        assert!(matches!(parse_u64(b""), Err(Error::InvalidCharacter)));
        assert!(matches!(parse_u64(b"12x"), Err(Error::InvalidCharacter)));
        assert!(matches!(
            parse_u64(b"18446744073709551616"),
            Err(Error::Overflow)
        ));
    }
}
