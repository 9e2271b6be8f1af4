//! A single pooled connection to a Redis server.

use async_trait::async_trait;
use bytes::Bytes;
use oxicache_core::pool::Connect;
use oxicache_core::transport::Transport;
use oxicache_core::{ConnectionOptions, Error, Result};

use crate::protocol::{self, Value};

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
    /// Staging buffer for pipelined commands; not flushed until
    /// [`Connection::flush`].
    pub(crate) fn stage(&mut self) -> &mut bytes::BytesMut {
        self.transport.write_buf()
    }

    pub(crate) async fn flush(&mut self) -> Result<()> {
        self.transport.flush().await
    }

    pub(crate) fn discard_staged(&mut self) {
        self.transport.discard_staged();
    }

    /// Encode one command and send it.
    pub async fn write_command(&mut self, args: &[&[u8]]) -> Result<()> {
        protocol::write_command(self.transport.write_buf(), args);
        self.transport.flush().await
    }

    /// Execute a command answered by a simple string (`+...`).
    pub async fn exec_simple_string(&mut self, args: &[&[u8]]) -> Result<()> {
        self.write_command(args).await?;
        self.read_simple_string().await
    }

    /// Execute a command answered by an integer (`:N`).
    pub async fn exec_integer(&mut self, args: &[&[u8]]) -> Result<i64> {
        self.write_command(args).await?;
        self.read_integer().await
    }

    /// Execute a command answered by a bulk string, copying the payload into
    /// `buf`. Returns the payload length, or `None` for the nil reply.
    pub async fn exec_bulk_string(
        &mut self,
        args: &[&[u8]],
        buf: &mut [u8],
    ) -> Result<Option<usize>> {
        self.write_command(args).await?;
        self.read_bulk_string(buf).await
    }

    /// Execute a command answered by `+OK`, nil, or a bulk string to discard.
    ///
    /// Covers `SET` with `NX`/`XX` (nil when the condition failed) and with
    /// `GET` (the previous value, drained unread).
    pub async fn exec_ok_or_nil(&mut self, args: &[&[u8]]) -> Result<()> {
        self.write_command(args).await?;
        self.read_ok_or_nil().await
    }

    pub(crate) async fn read_simple_string(&mut self) -> Result<()> {
        let line = self.transport.read_line().await?;
        match line.first() {
            Some(b'+') => Ok(()),
            Some(b'-') => Err(protocol::error_reply(&line)),
            _ => Err(Error::UnexpectedType),
        }
    }

    pub(crate) async fn read_integer(&mut self) -> Result<i64> {
        let line = self.transport.read_line().await?;
        match line.first() {
            Some(b':') => protocol::parse_int(&line[1..]),
            Some(b'-') => Err(protocol::error_reply(&line)),
            _ => Err(Error::UnexpectedType),
        }
    }

    pub(crate) async fn read_bulk_string(&mut self, buf: &mut [u8]) -> Result<Option<usize>> {
        let line = self.transport.read_line().await?;
        match line.first() {
            Some(b'$') => {
                let Some(len) = protocol::parse_len(&line[1..])? else {
                    return Ok(None);
                };
                if len > buf.len() {
                    return Err(Error::ValueTooLarge);
                }
                self.transport.read_exact_into(&mut buf[..len]).await?;
                self.transport.expect_crlf().await?;
                Ok(Some(len))
            }
            Some(b'-') => Err(protocol::error_reply(&line)),
            _ => Err(Error::UnexpectedType),
        }
    }

    pub(crate) async fn read_ok_or_nil(&mut self) -> Result<()> {
        let line = self.transport.read_line().await?;
        match line.first() {
            Some(b'+') => Ok(()),
            Some(b'$') => {
                if let Some(len) = protocol::parse_len(&line[1..])? {
                    self.transport.skip(len).await?;
                    self.transport.expect_crlf().await?;
                }
                Ok(())
            }
            Some(b'-') => Err(protocol::error_reply(&line)),
            _ => Err(Error::UnexpectedType),
        }
    }

    /// Read one reply of any RESP2 type.
    ///
    /// Used by the pipeline demultiplexer, which learns the reply type from
    /// the wire rather than from the call site.
    pub async fn read_value(&mut self) -> Result<Value> {
        let line = self.transport.read_line().await?;
        match line.first() {
            Some(b'+') => Ok(Value::SimpleString(protocol::lossy(&line[1..]))),
            Some(b'-') => Ok(Value::Error(protocol::lossy(&line[1..]))),
            Some(b':') => Ok(Value::Integer(protocol::parse_int(&line[1..])?)),
            Some(b'$') => match protocol::parse_len(&line[1..])? {
                None => Ok(Value::Null),
                Some(len) => {
                    let mut payload = vec![0u8; len];
                    self.transport.read_exact_into(&mut payload).await?;
                    self.transport.expect_crlf().await?;
                    Ok(Value::BulkString(Bytes::from(payload)))
                }
            },
            Some(b'*') => match protocol::parse_len(&line[1..])? {
                None => Ok(Value::Null),
                Some(len) => {
                    let mut items = Vec::with_capacity(len);
                    for _ in 0..len {
                        let item = Box::pin(self.read_value()).await?;
                        items.push(item);
                    }
                    Ok(Value::Array(items))
                }
            },
            _ => Err(Error::Protocol("unknown reply type")),
        }
    }
}
