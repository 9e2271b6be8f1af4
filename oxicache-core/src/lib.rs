//! Core building blocks shared by the oxicache cache-protocol clients.
//!
//! This crate provides the pieces that are identical between the Redis and
//! memcached clients: the error taxonomy with its resumable/fatal split, the
//! per-connection options, the buffered TCP transport, the bounded idle pool
//! and the retry loop that ties them together. The protocol crates
//! (`oxicache-redis`, `oxicache-memcache`) supply the wire codecs on top.

#![warn(missing_docs)]

pub mod addr;
pub mod config;
pub mod error;
pub mod pool;
pub mod retry;
pub mod transport;

pub use config::ConnectionOptions;
pub use error::{Error, Result};
pub use pool::{Connect, Pool};
pub use retry::RetryPolicy;
pub use transport::Transport;
