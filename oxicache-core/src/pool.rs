//! Bounded idle-connection pool, one per server.

use std::sync::Mutex;

use async_trait::async_trait;
use tracing::debug;

use crate::config::ConnectionOptions;
use crate::error::Result;

/// Default cap on idle connections kept per server.
pub const DEFAULT_MAX_IDLE: usize = 2;

/// Constructor for the connection type a [`Pool`] manages.
#[async_trait]
pub trait Connect: Sized + Send {
    /// Establish a connection to `host:port` with the given options.
    async fn connect(host: &str, port: u16, options: &ConnectionOptions) -> Result<Self>;
}

/// An idle list of healthy connections for one server.
///
/// Only idle connections are tracked: an acquired connection belongs
/// exclusively to its holder until it is passed back through
/// [`Pool::release`]. The idle list is bounded by `max_idle`; a healthy
/// connection released into a full list is dropped instead of pooled.
///
/// The list is guarded by a synchronous mutex whose critical sections never
/// cross an await point. Acquire therefore suspends only while dialing a new
/// connection, so a cancelled acquire can never leak pooled state, and
/// release cannot be interrupted at all, which lets destructors release.
pub struct Pool<C> {
    host: String,
    port: u16,
    options: ConnectionOptions,
    max_idle: usize,
    idle: Mutex<Vec<C>>,
}

impl<C: Connect> Pool<C> {
    /// Create an empty pool for one server.
    pub fn new(
        host: impl Into<String>,
        port: u16,
        options: ConnectionOptions,
        max_idle: usize,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            options,
            max_idle,
            idle: Mutex::new(Vec::new()),
        }
    }

    /// Host this pool connects to.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Port this pool connects to.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Take an idle connection, or dial a new one.
    ///
    /// A dial failure leaves the pool untouched.
    pub async fn acquire(&self) -> Result<C> {
        if let Some(conn) = self.idle.lock().unwrap().pop() {
            return Ok(conn);
        }
        debug!(host = %self.host, port = self.port, "idle list empty, dialing");
        C::connect(&self.host, self.port, &self.options).await
    }

    /// Hand a connection back.
    ///
    /// `ok == false` means the connection's framing can no longer be
    /// trusted; it is dropped. A healthy connection re-enters the idle list
    /// unless the list is at capacity.
    pub fn release(&self, conn: C, ok: bool) {
        if !ok {
            debug!(host = %self.host, port = self.port, "discarding unhealthy connection");
            return;
        }
        let mut idle = self.idle.lock().unwrap();
        if idle.len() >= self.max_idle {
            return;
        }
        idle.push(conn);
    }

    /// Number of idle connections currently held.
    pub fn idle_count(&self) -> usize {
        self.idle.lock().unwrap().len()
    }

    /// True if no idle connections are held.
    pub fn is_empty(&self) -> bool {
        self.idle_count() == 0
    }
}
