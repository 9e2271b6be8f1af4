//! Buffered TCP transport with per-operation timeouts.
//!
//! A [`Transport`] owns the stream and a pair of buffers. Outgoing bytes are
//! staged in the write buffer and sent by a single [`Transport::flush`];
//! incoming bytes accumulate in the read buffer and are consumed as
//! CRLF-framed lines or raw payload slices. The configured timeouts are
//! applied inside these helpers, so codec code never re-applies them.

use std::future::Future;
use std::io;
use std::time::Duration;

use bytes::{Buf, Bytes, BytesMut};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::debug;

use crate::config::ConnectionOptions;
use crate::error::{Error, Result};

/// A connected TCP stream plus its read and write buffers.
pub struct Transport {
    stream: TcpStream,
    read_buf: BytesMut,
    write_buf: BytesMut,
    read_timeout: Option<Duration>,
    write_timeout: Option<Duration>,
}

/// Run `io` under an optional deadline, folding expiry into `TimedOut`.
async fn bounded<T>(
    limit: Option<Duration>,
    io: impl Future<Output = io::Result<T>>,
) -> io::Result<T> {
    match limit {
        Some(limit) => match timeout(limit, io).await {
            Ok(result) => result,
            Err(_) => Err(io::Error::new(io::ErrorKind::TimedOut, "operation timed out")),
        },
        None => io.await,
    }
}

impl Transport {
    /// Establish a TCP connection and allocate the buffers.
    pub async fn connect(host: &str, port: u16, options: &ConnectionOptions) -> Result<Self> {
        let address = format!("{host}:{port}");
        debug!(%address, "connecting");
        let stream = bounded(options.connect_timeout, TcpStream::connect(address.as_str()))
            .await
            .map_err(Error::ConnectionFailed)?;
        Ok(Self {
            stream,
            read_buf: BytesMut::with_capacity(options.read_buffer_size),
            write_buf: BytesMut::with_capacity(options.write_buffer_size),
            read_timeout: options.read_timeout,
            write_timeout: options.write_timeout,
        })
    }

    /// Staging buffer for outgoing bytes; sent by the next [`Transport::flush`].
    pub fn write_buf(&mut self) -> &mut BytesMut {
        &mut self.write_buf
    }

    /// Drop staged bytes that were never flushed.
    pub fn discard_staged(&mut self) {
        self.write_buf.clear();
    }

    /// Send everything staged in the write buffer.
    pub async fn flush(&mut self) -> Result<()> {
        let result = bounded(self.write_timeout, self.stream.write_all(&self.write_buf)).await;
        self.write_buf.clear();
        result.map_err(Error::WriteFailed)
    }

    /// Pull more bytes from the stream into the read buffer.
    async fn fill(&mut self) -> Result<()> {
        let read = bounded(self.read_timeout, self.stream.read_buf(&mut self.read_buf))
            .await
            .map_err(Error::ReadFailed)?;
        if read == 0 {
            return Err(Error::EndOfStream);
        }
        Ok(())
    }

    /// Read one CRLF-terminated line, returned without the terminator.
    ///
    /// A line whose terminator is a bare `\n` is a framing violation.
    pub async fn read_line(&mut self) -> Result<Bytes> {
        let mut scanned = 0;
        loop {
            if let Some(pos) = self.read_buf[scanned..].iter().position(|&b| b == b'\n') {
                let mut line = self.read_buf.split_to(scanned + pos + 1);
                if line.len() < 2 || line[line.len() - 2] != b'\r' {
                    return Err(Error::Protocol("line not terminated by CRLF"));
                }
                line.truncate(line.len() - 2);
                return Ok(line.freeze());
            }
            scanned = self.read_buf.len();
            self.fill().await?;
        }
    }

    /// Stream exactly `out.len()` payload bytes into the caller's buffer.
    pub async fn read_exact_into(&mut self, out: &mut [u8]) -> Result<()> {
        let mut filled = 0;
        while filled < out.len() {
            if self.read_buf.is_empty() {
                self.fill().await?;
            }
            let take = self.read_buf.len().min(out.len() - filled);
            out[filled..filled + take].copy_from_slice(&self.read_buf[..take]);
            self.read_buf.advance(take);
            filled += take;
        }
        Ok(())
    }

    /// Consume and discard `len` payload bytes.
    pub async fn skip(&mut self, len: usize) -> Result<()> {
        let mut remaining = len;
        while remaining > 0 {
            if self.read_buf.is_empty() {
                self.fill().await?;
            }
            let take = self.read_buf.len().min(remaining);
            self.read_buf.advance(take);
            remaining -= take;
        }
        Ok(())
    }

    /// Consume the two-byte terminator that follows a payload.
    pub async fn expect_crlf(&mut self) -> Result<()> {
        let mut tail = [0u8; 2];
        self.read_exact_into(&mut tail).await?;
        if tail != *b"\r\n" {
            return Err(Error::Protocol("payload not terminated by CRLF"));
        }
        Ok(())
    }
}
