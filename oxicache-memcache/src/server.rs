//! One memcached server: address, pool, precomputed hash identity.

use oxicache_core::pool::Pool;
use oxicache_core::{addr, ConnectionOptions, Result};
use wyhash::wyhash;

use crate::connection::Connection;

/// A memcached server and its connection pool.
pub struct Server {
    host: String,
    port: u16,
    pool: Pool<Connection>,
    hash_id: u64,
}

impl Server {
    /// Parse `address` as `host:port` and set up an empty pool for it.
    ///
    /// `hash_id` is `wyhash("host:port", 0)`, computed once here so
    /// rendezvous lookups never rehash the server identity per key.
    pub fn new(address: &str, options: ConnectionOptions, max_idle: usize) -> Result<Self> {
        let (host, port) = addr::parse_server(address)?;
        let identity = format!("{host}:{port}");
        let hash_id = wyhash(identity.as_bytes(), 0);
        Ok(Self {
            host: host.to_string(),
            port,
            pool: Pool::new(host, port, options, max_idle),
            hash_id,
        })
    }

    /// Host this server was configured with.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Port this server was configured with.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// The server's connection pool.
    pub fn pool(&self) -> &Pool<Connection> {
        &self.pool
    }

    /// Rendezvous seed derived from the server identity.
    pub fn hash_id(&self) -> u64 {
        self.hash_id
    }
}
