//! Distributed memcached client: routing, retries, the command surface.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use oxicache_core::pool::DEFAULT_MAX_IDLE;
use oxicache_core::retry::{with_connection, RetryPolicy};
use oxicache_core::{ConnectionOptions, Error, Result};
use tracing::debug;

use crate::connection::Connection;
use crate::hash::{self, Hasher};
use crate::server::Server;

/// Configuration for [`Client`].
#[derive(Debug, Clone)]
pub struct Config {
    /// Server addresses as `host:port`.
    pub servers: Vec<String>,
    /// Key-to-server routing strategy.
    pub hasher: Hasher,
    /// Cap on idle connections kept per server.
    pub max_idle: usize,
    /// Retry policy for transient connection failures.
    pub retry: RetryPolicy,
    /// Per-connection buffer sizes and timeouts.
    pub connection: ConnectionOptions,
}

impl Config {
    /// Create a configuration for the given `host:port` addresses.
    pub fn new<I, S>(servers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            servers: servers.into_iter().map(Into::into).collect(),
            hasher: Hasher::default(),
            max_idle: DEFAULT_MAX_IDLE,
            retry: RetryPolicy::default(),
            connection: ConnectionOptions::default(),
        }
    }

    /// Set the routing strategy.
    #[must_use]
    pub const fn with_hasher(mut self, hasher: Hasher) -> Self {
        self.hasher = hasher;
        self
    }

    /// Set the per-server idle-connection cap.
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

/// Options for the storage commands.
#[derive(Debug, Clone, Copy, Default)]
pub struct SetOptions {
    /// Expiry in seconds; `0` stores without expiry and omits the flag.
    pub ttl: u32,
    /// Opaque client flags stored with the item; `0` omits the flag.
    pub flags: u32,
    /// Store only if the item still carries this CAS token; a mismatch
    /// fails with [`Error::Exists`].
    pub cas: Option<u64>,
}

/// Storage mode of the `ms` command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SetMode {
    /// Store unconditionally.
    #[default]
    Set,
    /// Store only if the key is absent.
    Add,
    /// Store only if the key is present.
    Replace,
    /// Append to the existing value.
    Append,
    /// Prepend to the existing value.
    Prepend,
}

impl SetMode {
    /// Mode token emitted on the wire; plain `set` has none.
    pub(crate) fn token(self) -> Option<&'static [u8]> {
        match self {
            SetMode::Set => None,
            SetMode::Add => Some(b"ME"),
            SetMode::Replace => Some(b"MR"),
            SetMode::Append => Some(b"MA"),
            SetMode::Prepend => Some(b"MP"),
        }
    }
}

/// A value read from the cache.
///
/// `value` is the filled prefix of the buffer the caller passed to
/// [`Client::get`].
#[derive(Debug)]
pub struct Info<'a> {
    /// The item's payload.
    pub value: &'a [u8],
    /// Opaque client flags stored with the item.
    pub flags: u32,
    /// CAS token for conditional updates.
    pub cas: u64,
}

/// Async memcached client over one or more independent servers.
///
/// Key-bearing commands route through the configured [`Hasher`]; keyless
/// commands round-robin across the servers. Retries of one call are pinned
/// to the server picked first, since a failure is assumed server-local.
pub struct Client {
    servers: Vec<Server>,
    hasher: Hasher,
    counter: AtomicUsize,
    retry: RetryPolicy,
}

impl Client {
    /// Create a client. Performs no I/O; the first command dials.
    pub fn new(config: Config) -> Result<Self> {
        if config.servers.is_empty() {
            return Err(Error::NoServers);
        }
        let servers = config
            .servers
            .iter()
            .map(|address| Server::new(address, config.connection.clone(), config.max_idle))
            .collect::<Result<Vec<_>>>()?;
        debug!(servers = servers.len(), hasher = ?config.hasher, "client configured");
        Ok(Self {
            servers,
            hasher: config.hasher,
            counter: AtomicUsize::new(0),
            retry: config.retry,
        })
    }

    /// The configured servers.
    pub fn servers(&self) -> &[Server] {
        &self.servers
    }

    /// Total idle connections across all server pools.
    pub fn idle_connections(&self) -> usize {
        self.servers
            .iter()
            .map(|server| server.pool().idle_count())
            .sum()
    }

    /// Fetch `key`, copying the value into `buf`.
    pub async fn get<'a>(&self, key: &str, buf: &'a mut [u8]) -> Result<Option<Info<'a>>> {
        let server = self.pick_server(key.as_bytes());
        let hit = with_connection(server.pool(), &self.retry, async |conn: &mut Connection| {
            conn.get(key, &mut *buf).await
        })
        .await?;
        match hit {
            Some((len, flags, cas)) => Ok(Some(Info {
                value: &buf[..len],
                flags,
                cas,
            })),
            None => Ok(None),
        }
    }

    /// Store `key` unconditionally (CAS in `options` still applies).
    pub async fn set(&self, key: &str, value: &[u8], options: &SetOptions) -> Result<()> {
        self.store(key, value, options, SetMode::Set).await
    }

    /// Store `key` only if it is absent; fails with [`Error::NotStored`]
    /// otherwise.
    pub async fn add(&self, key: &str, value: &[u8], options: &SetOptions) -> Result<()> {
        self.store(key, value, options, SetMode::Add).await
    }

    /// Store `key` only if it is present.
    pub async fn replace(&self, key: &str, value: &[u8], options: &SetOptions) -> Result<()> {
        self.store(key, value, options, SetMode::Replace).await
    }

    /// Append to the existing value of `key`.
    pub async fn append(&self, key: &str, value: &[u8], options: &SetOptions) -> Result<()> {
        self.store(key, value, options, SetMode::Append).await
    }

    /// Prepend to the existing value of `key`.
    pub async fn prepend(&self, key: &str, value: &[u8], options: &SetOptions) -> Result<()> {
        self.store(key, value, options, SetMode::Prepend).await
    }

    /// Store `key` with an explicit [`SetMode`].
    pub async fn store(
        &self,
        key: &str,
        value: &[u8],
        options: &SetOptions,
        mode: SetMode,
    ) -> Result<()> {
        let server = self.pick_server(key.as_bytes());
        with_connection(server.pool(), &self.retry, async |conn: &mut Connection| {
            conn.store(key, value, options, mode).await
        })
        .await
    }

    /// Delete `key`; a miss fails with [`Error::NotFound`].
    pub async fn delete(&self, key: &str) -> Result<()> {
        let server = self.pick_server(key.as_bytes());
        with_connection(server.pool(), &self.retry, async |conn: &mut Connection| {
            conn.delete(key).await
        })
        .await
    }

    /// Increment the counter at `key` by `delta`; returns the new value.
    pub async fn incr(&self, key: &str, delta: u64) -> Result<u64> {
        self.arithmetic(key, delta, false).await
    }

    /// Decrement the counter at `key` by `delta`; returns the new value.
    pub async fn decr(&self, key: &str, delta: u64) -> Result<u64> {
        self.arithmetic(key, delta, true).await
    }

    /// Reset the TTL of `key` without fetching its value.
    pub async fn touch(&self, key: &str, ttl: u32) -> Result<()> {
        let server = self.pick_server(key.as_bytes());
        with_connection(server.pool(), &self.retry, async |conn: &mut Connection| {
            conn.touch(key, ttl).await
        })
        .await
    }

    /// Expire every item on one server (round-robin pick).
    pub async fn flush_all(&self) -> Result<()> {
        let server = self.round_robin();
        with_connection(server.pool(), &self.retry, async |conn: &mut Connection| {
            conn.flush_all().await
        })
        .await
    }

    /// Version string of one server (round-robin pick).
    pub async fn version(&self) -> Result<String> {
        let server = self.round_robin();
        with_connection(server.pool(), &self.retry, async |conn: &mut Connection| {
            conn.version().await
        })
        .await
    }

    async fn arithmetic(&self, key: &str, delta: u64, decrement: bool) -> Result<u64> {
        let server = self.pick_server(key.as_bytes());
        with_connection(server.pool(), &self.retry, async |conn: &mut Connection| {
            conn.arithmetic(key, delta, decrement).await
        })
        .await
    }

    fn pick_server(&self, key: &[u8]) -> &Server {
        if self.servers.len() == 1 {
            return &self.servers[0];
        }
        let index = match self.hasher {
            Hasher::None => self.next_index(),
            Hasher::Modulo => hash::modulo(&self.servers, key),
            Hasher::Rendezvous => hash::rendezvous(&self.servers, key),
        };
        &self.servers[index]
    }

    fn round_robin(&self) -> &Server {
        if self.servers.len() == 1 {
            return &self.servers[0];
        }
        &self.servers[self.next_index()]
    }

    fn next_index(&self) -> usize {
        // only progress matters, not cross-thread ordering
        self.counter.fetch_add(1, Ordering::Relaxed) % self.servers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_server_list_is_rejected() {
        let config = Config::new(Vec::<String>::new());
        assert!(matches!(Client::new(config), Err(Error::NoServers)));
    }

    #[test]
    fn malformed_address_is_rejected() {
        let config = Config::new(["localhost"]);
        assert!(matches!(Client::new(config), Err(Error::InvalidServer(_))));
    }

    #[test]
    fn single_server_short_circuits_routing() {
        let client = Client::new(Config::new(["localhost:11211"])).unwrap();
        for key in [&b"a"[..], &b"b"[..], &b"c"[..]] {
            assert_eq!(client.pick_server(key).port(), 11211);
        }
    }

    #[test]
    fn round_robin_cycles_through_servers() {
        let config = Config::new(["a:1", "b:2", "c:3"]).with_hasher(Hasher::None);
        let client = Client::new(config).unwrap();
        let ports: Vec<u16> = (0..6).map(|_| client.round_robin().port()).collect();
        assert_eq!(ports, [1, 2, 3, 1, 2, 3]);
    }

    #[test]
    fn hashed_routing_is_pinned_per_key() {
        let config = Config::new(["a:1", "b:2", "c:3"]);
        let client = Client::new(config).unwrap();
        let first = client.pick_server(b"some-key").port();
        for _ in 0..10 {
            assert_eq!(client.pick_server(b"some-key").port(), first);
        }
    }

    #[test]
    fn mode_tokens_match_the_wire_map() {
        assert_eq!(SetMode::Set.token(), None);
        assert_eq!(SetMode::Add.token(), Some(&b"ME"[..]));
        assert_eq!(SetMode::Replace.token(), Some(&b"MR"[..]));
        assert_eq!(SetMode::Append.token(), Some(&b"MA"[..]));
        assert_eq!(SetMode::Prepend.token(), Some(&b"MP"[..]));
    }
}
