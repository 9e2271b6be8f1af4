//! `host:port` server address parsing.

use crate::error::{Error, Result};

/// Split a server address of the form `host:port`.
///
/// The port is the substring after the last `':'`, so bracketed IPv6
/// addresses like `[::1]:6379` parse with `host = "[::1]"`. A missing
/// colon, empty host or non-numeric port is [`Error::InvalidServer`].
pub fn parse_server(address: &str) -> Result<(&str, u16)> {
    let (host, port) = address
        .rsplit_once(':')
        .ok_or_else(|| Error::InvalidServer(address.to_string()))?;
    if host.is_empty() {
        return Err(Error::InvalidServer(address.to_string()));
    }
    let port = port
        .parse::<u16>()
        .map_err(|_| Error::InvalidServer(address.to_string()))?;
    Ok((host, port))
}
