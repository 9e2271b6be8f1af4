//! Acquire/execute/release orchestration with bounded retries.

use std::ops::AsyncFnMut;
use std::time::Duration;

use tokio::time::sleep;
use tracing::debug;

use crate::error::Result;
use crate::pool::{Connect, Pool};

/// How often and how eagerly to retry transient connection failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Additional attempts after the first failure.
    pub attempts: usize,
    /// Pause between attempts.
    pub interval: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 2,
            interval: Duration::ZERO,
        }
    }
}

impl RetryPolicy {
    /// No retries at all.
    pub const fn none() -> Self {
        Self {
            attempts: 0,
            interval: Duration::ZERO,
        }
    }
}

/// Run `op` on a pooled connection, retrying transient failures.
///
/// The loop acquires a connection, runs the operation, and classifies any
/// failure with [`Error::is_resumable`]:
///
/// - a resumable error means the server rejected the command over an intact
///   stream; the connection re-enters the pool and the error is surfaced
///   immediately (the server's answer will not change on a retry),
/// - any other failure destroys the connection and the call is retried on a
///   fresh one, up to `retry.attempts` times with `retry.interval` between
///   attempts; likewise for failures to acquire a connection at all.
///
/// [`Error::is_resumable`]: crate::error::Error::is_resumable
pub async fn with_connection<C, T, F>(pool: &Pool<C>, retry: &RetryPolicy, mut op: F) -> Result<T>
where
    C: Connect,
    F: AsyncFnMut(&mut C) -> Result<T>,
{
    let mut attempts = 0;
    loop {
        let mut conn = match pool.acquire().await {
            Ok(conn) => conn,
            Err(err) => {
                if attempts < retry.attempts {
                    attempts += 1;
                    debug!(error = %err, attempt = attempts, "acquire failed, backing off");
                    sleep(retry.interval).await;
                    continue;
                }
                return Err(err);
            }
        };
        match op(&mut conn).await {
            Ok(value) => {
                pool.release(conn, true);
                return Ok(value);
            }
            Err(err) => {
                let resumable = err.is_resumable();
                pool.release(conn, resumable);
                if resumable {
                    return Err(err);
                }
                if attempts < retry.attempts {
                    attempts += 1;
                    debug!(error = %err, attempt = attempts, "connection failed, backing off");
                    sleep(retry.interval).await;
                    continue;
                }
                return Err(err);
            }
        }
    }
}
