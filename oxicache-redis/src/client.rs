//! High-level Redis client: command surface, retries, pooling.

use std::time::Duration;

use bytes::BytesMut;
use oxicache_core::pool::{Pool, DEFAULT_MAX_IDLE};
use oxicache_core::retry::{with_connection, RetryPolicy};
use oxicache_core::{addr, ConnectionOptions, Error, Result};

use crate::connection::Connection;
use crate::pipeline::Pipeline;
use crate::protocol;

/// Upper bound on keys accepted by the multi-key commands.
///
/// Argument arrays are built on the stack; batches beyond this bound fail
/// with [`Error::TooManyKeys`] rather than spilling to the heap.
pub const MAX_KEYS: usize = 64;

/// Configuration for [`Client`].
#[derive(Debug, Clone)]
pub struct Config {
    /// Server address as `host:port`.
    pub address: String,
    /// Cap on idle connections kept in the pool.
    pub max_idle: usize,
    /// Retry policy for transient connection failures.
    pub retry: RetryPolicy,
    /// Per-connection buffer sizes and timeouts.
    pub connection: ConnectionOptions,
}

impl Config {
    /// Create a configuration for the given `host:port` address.
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            max_idle: DEFAULT_MAX_IDLE,
            retry: RetryPolicy::default(),
            connection: ConnectionOptions::default(),
        }
    }

    /// Set the idle-connection cap.
    #[must_use]
    pub const fn with_max_idle(mut self, max_idle: usize) -> Self {
        self.max_idle = max_idle;
        self
    }

    /// Set the number of retry attempts.
    #[must_use]
    pub const fn with_retry_attempts(mut self, attempts: usize) -> Self {
        self.retry.attempts = attempts;
        self
    }

    /// Set the pause between retry attempts.
    #[must_use]
    pub const fn with_retry_interval(mut self, interval: Duration) -> Self {
        self.retry.interval = interval;
        self
    }

    /// Set the per-connection options.
    #[must_use]
    pub fn with_connection_options(mut self, options: ConnectionOptions) -> Self {
        self.connection = options;
        self
    }
}

/// Options for [`Client::set`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SetOptions {
    /// Expire the key after this many seconds (`EX`).
    pub ex: Option<u32>,
    /// Only set if the key does not exist (`NX`).
    pub nx: bool,
    /// Only set if the key already exists (`XX`). Skipped when `nx` is also
    /// set.
    pub xx: bool,
    /// Ask the server for the previous value (`GET`); the reply is drained
    /// and discarded.
    pub get: bool,
}

/// Encode a `SET` command with its options into `buf`.
pub(crate) fn write_set(buf: &mut BytesMut, key: &[u8], value: &[u8], options: &SetOptions) {
    let mut seconds = itoa::Buffer::new();
    let mut args: [&[u8]; 7] = [b""; 7];
    args[0] = b"SET";
    args[1] = key;
    args[2] = value;
    let mut len = 3;
    if let Some(ex) = options.ex {
        args[len] = b"EX";
        args[len + 1] = seconds.format(ex).as_bytes();
        len += 2;
    }
    if options.nx {
        args[len] = b"NX";
        len += 1;
    } else if options.xx {
        args[len] = b"XX";
        len += 1;
    }
    if options.get {
        args[len] = b"GET";
        len += 1;
    }
    protocol::write_command(buf, &args[..len]);
}

/// Async Redis client for one server.
///
/// Cheap to share by reference across cooperative tasks; the pool mutex
/// serializes access to the idle list, and every acquired connection is
/// exclusive to its operation.
pub struct Client {
    pool: Pool<Connection>,
    retry: RetryPolicy,
}

impl Client {
    /// Create a client. Performs no I/O; the first command dials.
    pub fn new(config: Config) -> Result<Self> {
        let (host, port) = addr::parse_server(&config.address)?;
        Ok(Self {
            pool: Pool::new(host, port, config.connection, config.max_idle),
            retry: config.retry,
        })
    }

    /// Number of idle connections currently pooled.
    pub fn idle_connections(&self) -> usize {
        self.pool.idle_count()
    }

    /// `GET key`: copy the value into `buf` and return the filled prefix,
    /// or `None` if the key does not exist.
    pub async fn get<'a>(&self, key: &str, buf: &'a mut [u8]) -> Result<Option<&'a [u8]>> {
        let args: [&[u8]; 2] = [b"GET", key.as_bytes()];
        let len = with_connection(&self.pool, &self.retry, async |conn: &mut Connection| {
            conn.exec_bulk_string(&args, &mut *buf).await
        })
        .await?;
        match len {
            Some(len) => Ok(Some(&buf[..len])),
            None => Ok(None),
        }
    }

    /// `SET key value [EX n] [NX|XX] [GET]`.
    ///
    /// A failed `NX`/`XX` condition is reported as success (the server
    /// answers nil); callers that need to distinguish must `get` afterwards.
    pub async fn set(&self, key: &str, value: &[u8], options: &SetOptions) -> Result<()> {
        with_connection(&self.pool, &self.retry, async |conn: &mut Connection| {
            write_set(conn.stage(), key.as_bytes(), value, options);
            conn.flush().await?;
            conn.read_ok_or_nil().await
        })
        .await
    }

    /// `SET key value EX seconds`.
    pub async fn set_ex(&self, key: &str, value: &[u8], seconds: u32) -> Result<()> {
        let options = SetOptions {
            ex: Some(seconds),
            ..SetOptions::default()
        };
        self.set(key, value, &options).await
    }

    /// `SET key value NX`.
    pub async fn set_nx(&self, key: &str, value: &[u8]) -> Result<()> {
        let options = SetOptions {
            nx: true,
            ..SetOptions::default()
        };
        self.set(key, value, &options).await
    }

    /// `DEL key [key ...]`: number of keys removed. At most [`MAX_KEYS`].
    pub async fn del(&self, keys: &[&str]) -> Result<i64> {
        self.multi_key(b"DEL", keys).await
    }

    /// `EXISTS key [key ...]`: number of keys present. At most [`MAX_KEYS`].
    pub async fn exists(&self, keys: &[&str]) -> Result<i64> {
        self.multi_key(b"EXISTS", keys).await
    }

    /// `INCR key`.
    pub async fn incr(&self, key: &str) -> Result<i64> {
        let args: [&[u8]; 2] = [b"INCR", key.as_bytes()];
        self.integer_command(&args).await
    }

    /// `INCRBY key delta`.
    pub async fn incr_by(&self, key: &str, delta: i64) -> Result<i64> {
        let mut delta_buf = itoa::Buffer::new();
        let args: [&[u8]; 3] = [b"INCRBY", key.as_bytes(), delta_buf.format(delta).as_bytes()];
        self.integer_command(&args).await
    }

    /// `DECR key`.
    pub async fn decr(&self, key: &str) -> Result<i64> {
        let args: [&[u8]; 2] = [b"DECR", key.as_bytes()];
        self.integer_command(&args).await
    }

    /// `DECRBY key delta`.
    pub async fn decr_by(&self, key: &str, delta: i64) -> Result<i64> {
        let mut delta_buf = itoa::Buffer::new();
        let args: [&[u8]; 3] = [b"DECRBY", key.as_bytes(), delta_buf.format(delta).as_bytes()];
        self.integer_command(&args).await
    }

    /// `EXPIRE key seconds`: true if the timeout was set.
    pub async fn expire(&self, key: &str, seconds: u32) -> Result<bool> {
        let mut ttl_buf = itoa::Buffer::new();
        let args: [&[u8]; 3] = [b"EXPIRE", key.as_bytes(), ttl_buf.format(seconds).as_bytes()];
        Ok(self.integer_command(&args).await? == 1)
    }

    /// `TTL key`: seconds to live, `-1` without a timeout, `-2` if absent.
    pub async fn ttl(&self, key: &str) -> Result<i64> {
        let args: [&[u8]; 2] = [b"TTL", key.as_bytes()];
        self.integer_command(&args).await
    }

    /// `PING [message]`. An echoed message is drained and discarded.
    pub async fn ping(&self, message: Option<&str>) -> Result<()> {
        match message {
            None => {
                let args: [&[u8]; 1] = [b"PING"];
                with_connection(&self.pool, &self.retry, async |conn: &mut Connection| {
                    conn.exec_simple_string(&args).await
                })
                .await
            }
            Some(message) => {
                let args: [&[u8]; 2] = [b"PING", message.as_bytes()];
                with_connection(&self.pool, &self.retry, async |conn: &mut Connection| {
                    conn.exec_ok_or_nil(&args).await
                })
                .await
            }
        }
    }

    /// `FLUSHDB`.
    pub async fn flushdb(&self) -> Result<()> {
        let args: [&[u8]; 1] = [b"FLUSHDB"];
        with_connection(&self.pool, &self.retry, async |conn: &mut Connection| {
            conn.exec_simple_string(&args).await
        })
        .await
    }

    /// `DBSIZE`: number of keys in the selected database.
    pub async fn dbsize(&self) -> Result<i64> {
        let args: [&[u8]; 1] = [b"DBSIZE"];
        self.integer_command(&args).await
    }

    /// Acquire a connection and start a pipeline on it.
    ///
    /// The connection returns to the pool when the pipeline is dropped,
    /// healthy unless an execution failed mid-stream.
    pub async fn pipeline(&self) -> Result<Pipeline<'_>> {
        let conn = self.pool.acquire().await?;
        Ok(Pipeline::new(conn, &self.pool))
    }

    async fn integer_command(&self, args: &[&[u8]]) -> Result<i64> {
        with_connection(&self.pool, &self.retry, async |conn: &mut Connection| {
            conn.exec_integer(args).await
        })
        .await
    }

    async fn multi_key(&self, command: &'static [u8], keys: &[&str]) -> Result<i64> {
        if keys.len() > MAX_KEYS {
            return Err(Error::TooManyKeys);
        }
        let mut args: [&[u8]; MAX_KEYS + 1] = [b""; MAX_KEYS + 1];
        args[0] = command;
        for (i, key) in keys.iter().enumerate() {
            args[i + 1] = key.as_bytes();
        }
        let len = keys.len() + 1;
        self.integer_command(&args[..len]).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encoded(key: &str, value: &[u8], options: &SetOptions) -> Vec<u8> {
        let mut buf = BytesMut::new();
        write_set(&mut buf, key.as_bytes(), value, options);
        buf.to_vec()
    }

    #[test]
    fn plain_set_has_three_arguments() {
        assert_eq!(
            encoded("k", b"v", &SetOptions::default()),
            b"*3\r\n$3\r\nSET\r\n$1\r\nk\r\n$1\r\nv\r\n"
        );
    }

    #[test]
    fn expiry_and_condition_flags_are_appended() {
        let options = SetOptions {
            ex: Some(60),
            nx: true,
            ..SetOptions::default()
        };
        assert_eq!(
            encoded("k", b"v", &options),
            b"*6\r\n$3\r\nSET\r\n$1\r\nk\r\n$1\r\nv\r\n$2\r\nEX\r\n$2\r\n60\r\n$2\r\nNX\r\n"
        );
    }

    #[test]
    fn nx_wins_over_xx() {
        let options = SetOptions {
            nx: true,
            xx: true,
            ..SetOptions::default()
        };
        assert_eq!(
            encoded("k", b"v", &options),
            b"*4\r\n$3\r\nSET\r\n$1\r\nk\r\n$1\r\nv\r\n$2\r\nNX\r\n"
        );
    }

    #[test]
    fn get_flag_is_last() {
        let options = SetOptions {
            xx: true,
            get: true,
            ..SetOptions::default()
        };
        assert_eq!(
            encoded("k", b"v", &options),
            b"*5\r\n$3\r\nSET\r\n$1\r\nk\r\n$1\r\nv\r\n$2\r\nXX\r\n$3\r\nGET\r\n"
        );
    }

    #[test]
    fn invalid_address_is_rejected() {
        assert!(matches!(
            Client::new(Config::new("no-port")),
            Err(Error::InvalidServer(_))
        ));
    }
}
