//! A single pooled connection to a memcached server.

use async_trait::async_trait;
use oxicache_core::pool::Connect;
use oxicache_core::transport::Transport;
use oxicache_core::{ConnectionOptions, Error, Result};

use crate::client::{SetMode, SetOptions};
use crate::protocol::{self, ResponseLine};

/// Longest decimal payload an arithmetic reply can carry (`u64::MAX`).
const MAX_COUNTER_DIGITS: usize = 20;

/// One TCP connection plus its buffers, owned exclusively by the holder
/// between acquire and release.
pub struct Connection {
    transport: Transport,
}

#[async_trait]
impl Connect for Connection {
    async fn connect(host: &str, port: u16, options: &ConnectionOptions) -> Result<Self> {
        let transport = Transport::connect(host, port, options).await?;
        Ok(Self { transport })
    }
}

impl Connection {
    /// `mg key v f c`: copy the value into `buf` and return
    /// `(len, flags, cas)`, or `None` on a miss.
    pub async fn get(&mut self, key: &str, buf: &mut [u8]) -> Result<Option<(usize, u32, u64)>> {
        protocol::write_get(self.transport.write_buf(), key.as_bytes());
        self.transport.flush().await?;
        let line = self.transport.read_line().await?;
        match protocol::parse_response(&line)? {
            ResponseLine::Value { size, flags, cas } => {
                if size > buf.len() {
                    return Err(Error::ValueTooLarge);
                }
                self.transport.read_exact_into(&mut buf[..size]).await?;
                self.transport.expect_crlf().await?;
                Ok(Some((size, flags, cas)))
            }
            ResponseLine::Miss => Ok(None),
            ResponseLine::Stored => Err(Error::UnexpectedType),
        }
    }

    /// `ms key size [T F C M]` plus payload.
    pub async fn store(
        &mut self,
        key: &str,
        value: &[u8],
        options: &SetOptions,
        mode: SetMode,
    ) -> Result<()> {
        protocol::write_store(self.transport.write_buf(), key.as_bytes(), value, options, mode);
        self.transport.flush().await?;
        let line = self.transport.read_line().await?;
        match protocol::parse_response(&line)? {
            ResponseLine::Stored => Ok(()),
            ResponseLine::Miss => Err(Error::NotFound),
            ResponseLine::Value { .. } => Err(Error::UnexpectedType),
        }
    }

    /// `md key`.
    pub async fn delete(&mut self, key: &str) -> Result<()> {
        protocol::write_delete(self.transport.write_buf(), key.as_bytes());
        self.transport.flush().await?;
        let line = self.transport.read_line().await?;
        match protocol::parse_response(&line)? {
            ResponseLine::Stored => Ok(()),
            ResponseLine::Miss => Err(Error::NotFound),
            ResponseLine::Value { .. } => Err(Error::UnexpectedType),
        }
    }

    /// `ma key v D<delta> [MD]`: the new counter value.
    pub async fn arithmetic(&mut self, key: &str, delta: u64, decrement: bool) -> Result<u64> {
        protocol::write_arithmetic(self.transport.write_buf(), key.as_bytes(), delta, decrement);
        self.transport.flush().await?;
        let line = self.transport.read_line().await?;
        match protocol::parse_response(&line)? {
            ResponseLine::Value { size, .. } => {
                if size > MAX_COUNTER_DIGITS {
                    return Err(Error::Overflow);
                }
                let mut digits = [0u8; MAX_COUNTER_DIGITS];
                self.transport.read_exact_into(&mut digits[..size]).await?;
                self.transport.expect_crlf().await?;
                protocol::parse_u64(&digits[..size])
            }
            ResponseLine::Miss => Err(Error::NotFound),
            ResponseLine::Stored => Err(Error::UnexpectedType),
        }
    }

    /// Touch via `mg key T<ttl>`; `HD` is success.
    pub async fn touch(&mut self, key: &str, ttl: u32) -> Result<()> {
        protocol::write_touch(self.transport.write_buf(), key.as_bytes(), ttl);
        self.transport.flush().await?;
        let line = self.transport.read_line().await?;
        match protocol::parse_response(&line)? {
            ResponseLine::Stored => Ok(()),
            ResponseLine::Miss => Err(Error::NotFound),
            ResponseLine::Value { .. } => Err(Error::UnexpectedType),
        }
    }

    /// `flush_all`: expects `OK`.
    pub async fn flush_all(&mut self) -> Result<()> {
        protocol::write_flush_all(self.transport.write_buf());
        self.transport.flush().await?;
        let line = self.transport.read_line().await?;
        if line.as_ref() == b"OK" {
            return Ok(());
        }
        Err(protocol::flush_all_error(&line))
    }

    /// `version`: the server's version string.
    pub async fn version(&mut self) -> Result<String> {
        protocol::write_version(self.transport.write_buf());
        self.transport.flush().await?;
        let line = self.transport.read_line().await?;
        protocol::parse_version(&line)
    }
}
