//! Multi-command batching on a single pooled connection.
//!
//! A [`Pipeline`] stages commands in the connection's write buffer without
//! flushing, then [`Pipeline::exec`] sends the whole batch in one write and
//! reads the replies back in request order. A server-side rejection fills
//! its slot with [`Reply::Error`] and demultiplexing continues; any other
//! read failure marks the pipeline unhealthy, and dropping it then destroys
//! the connection instead of pooling it.

use bytes::Bytes;
use oxicache_core::pool::Pool;
use oxicache_core::{Error, Result};
use tracing::debug;

use crate::client::{write_set, SetOptions};
use crate::connection::Connection;
use crate::protocol::{self, Value};

/// Upper bound on commands buffered in one batch.
pub const MAX_PENDING: usize = 64;

/// Reply shape expected for one enqueued command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ResponseKind {
    Ok,
    OkOrNil,
    Integer,
    Bulk,
}

/// One slot of a batch result, in enqueue order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// The command succeeded with no payload of interest.
    Ok,
    /// Integer reply.
    Integer(i64),
    /// Bulk string reply; `None` is the nil reply.
    Bulk(Option<Bytes>),
    /// The server rejected this command; the rest of the batch is intact.
    Error(String),
}

/// A batch of commands on one acquired connection.
///
/// Reusable: after [`Pipeline::exec`] the same pipeline can stage a new
/// batch on the same connection.
pub struct Pipeline<'a> {
    pool: &'a Pool<Connection>,
    conn: Option<Connection>,
    pending: [ResponseKind; MAX_PENDING],
    pending_len: usize,
    healthy: bool,
}

impl<'a> Pipeline<'a> {
    pub(crate) fn new(conn: Connection, pool: &'a Pool<Connection>) -> Self {
        Self {
            pool,
            conn: Some(conn),
            pending: [ResponseKind::Ok; MAX_PENDING],
            pending_len: 0,
            healthy: true,
        }
    }

    /// Stage `SET key value [EX n] [NX|XX] [GET]`.
    pub fn set(&mut self, key: &str, value: &[u8], options: &SetOptions) -> Result<()> {
        let conn = self.slot()?;
        write_set(conn.stage(), key.as_bytes(), value, options);
        self.push(ResponseKind::OkOrNil);
        Ok(())
    }

    /// Stage `GET key`.
    pub fn get(&mut self, key: &str) -> Result<()> {
        let args: [&[u8]; 2] = [b"GET", key.as_bytes()];
        self.stage_command(&args, ResponseKind::Bulk)
    }

    /// Stage `DEL key`.
    pub fn del(&mut self, key: &str) -> Result<()> {
        let args: [&[u8]; 2] = [b"DEL", key.as_bytes()];
        self.stage_command(&args, ResponseKind::Integer)
    }

    /// Stage `INCR key`.
    pub fn incr(&mut self, key: &str) -> Result<()> {
        let args: [&[u8]; 2] = [b"INCR", key.as_bytes()];
        self.stage_command(&args, ResponseKind::Integer)
    }

    /// Stage `INCRBY key delta`.
    pub fn incr_by(&mut self, key: &str, delta: i64) -> Result<()> {
        let mut delta_buf = itoa::Buffer::new();
        let args: [&[u8]; 3] = [b"INCRBY", key.as_bytes(), delta_buf.format(delta).as_bytes()];
        self.stage_command(&args, ResponseKind::Integer)
    }

    /// Stage `DECR key`.
    pub fn decr(&mut self, key: &str) -> Result<()> {
        let args: [&[u8]; 2] = [b"DECR", key.as_bytes()];
        self.stage_command(&args, ResponseKind::Integer)
    }

    /// Stage `DECRBY key delta`.
    pub fn decr_by(&mut self, key: &str, delta: i64) -> Result<()> {
        let mut delta_buf = itoa::Buffer::new();
        let args: [&[u8]; 3] = [b"DECRBY", key.as_bytes(), delta_buf.format(delta).as_bytes()];
        self.stage_command(&args, ResponseKind::Integer)
    }

    /// Stage `EXPIRE key seconds`.
    pub fn expire(&mut self, key: &str, seconds: u32) -> Result<()> {
        let mut ttl_buf = itoa::Buffer::new();
        let args: [&[u8]; 3] = [b"EXPIRE", key.as_bytes(), ttl_buf.format(seconds).as_bytes()];
        self.stage_command(&args, ResponseKind::Integer)
    }

    /// Stage `TTL key`.
    pub fn ttl(&mut self, key: &str) -> Result<()> {
        let args: [&[u8]; 2] = [b"TTL", key.as_bytes()];
        self.stage_command(&args, ResponseKind::Integer)
    }

    /// Stage `EXISTS key`.
    pub fn exists(&mut self, key: &str) -> Result<()> {
        let args: [&[u8]; 2] = [b"EXISTS", key.as_bytes()];
        self.stage_command(&args, ResponseKind::Integer)
    }

    /// Number of commands staged and not yet executed.
    pub fn pending(&self) -> usize {
        self.pending_len
    }

    /// Flush the batch in one write and read one reply per command.
    ///
    /// Replies come back in enqueue order. The pipeline is empty afterwards
    /// and can stage a new batch.
    pub async fn exec(&mut self) -> Result<Vec<Reply>> {
        let count = self.pending_len;
        self.pending_len = 0;
        let pending = self.pending;
        let conn = self.conn()?;
        let result = Self::drain(conn, &pending[..count]).await;
        if let Err(err) = &result {
            debug!(error = %err, "pipeline demux failed, connection marked unhealthy");
            self.healthy = false;
        }
        result
    }

    async fn drain(conn: &mut Connection, pending: &[ResponseKind]) -> Result<Vec<Reply>> {
        conn.flush().await?;
        let mut replies = Vec::with_capacity(pending.len());
        for kind in pending {
            let value = conn.read_value().await?;
            replies.push(match (*kind, value) {
                (_, Value::Error(message)) => Reply::Error(message),
                (ResponseKind::Ok, Value::SimpleString(_)) => Reply::Ok,
                (
                    ResponseKind::OkOrNil,
                    Value::SimpleString(_) | Value::Null | Value::BulkString(_),
                ) => Reply::Ok,
                (ResponseKind::Integer, Value::Integer(value)) => Reply::Integer(value),
                (ResponseKind::Bulk, Value::BulkString(data)) => Reply::Bulk(Some(data)),
                (ResponseKind::Bulk, Value::Null) => Reply::Bulk(None),
                _ => return Err(Error::UnexpectedType),
            });
        }
        Ok(replies)
    }

    fn stage_command(&mut self, args: &[&[u8]], kind: ResponseKind) -> Result<()> {
        let conn = self.slot()?;
        protocol::write_command(conn.stage(), args);
        self.push(kind);
        Ok(())
    }

    fn slot(&mut self) -> Result<&mut Connection> {
        if self.pending_len == MAX_PENDING {
            return Err(Error::TooManyKeys);
        }
        self.conn()
    }

    fn conn(&mut self) -> Result<&mut Connection> {
        // the connection is only taken by Drop
        self.conn.as_mut().ok_or(Error::EndOfStream)
    }

    fn push(&mut self, kind: ResponseKind) {
        self.pending[self.pending_len] = kind;
        self.pending_len += 1;
    }
}

impl Drop for Pipeline<'_> {
    fn drop(&mut self) {
        if let Some(mut conn) = self.conn.take() {
            if self.pending_len > 0 {
                // staged commands that were never flushed must not leak
                // onto the wire under the next holder
                conn.discard_staged();
            }
            self.pool.release(conn, self.healthy);
        }
    }
}
