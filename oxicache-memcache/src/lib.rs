//! Async memcached client speaking the meta protocol (`mg`/`ms`/`md`/`ma`).
//!
//! Keys are routed across independent memcached servers by rendezvous or
//! modulo hashing (or round-robin), each server backed by its own bounded
//! connection pool. Semantic replies (`EN`, `NS`, `EX`, `NF`) surface as
//! typed errors over an intact connection; transport failures destroy the
//! connection and are retried against the same server.
//!
//! # Quick Start
//!
//! ```no_run
//! use oxicache_memcache::{Client, Config, SetOptions};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = Client::new(Config::new(["localhost:11211"]))?;
//!
//!     client.set("hello", b"world", &SetOptions::default()).await?;
//!     let mut buf = [0u8; 128];
//!     if let Some(item) = client.get("hello", &mut buf).await? {
//!         println!("hello = {}", String::from_utf8_lossy(item.value));
//!     }
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]

pub mod client;
pub mod connection;
pub mod hash;
mod protocol;
pub mod server;

pub use client::{Client, Config, Info, SetMode, SetOptions};
pub use connection::Connection;
pub use hash::Hasher;
pub use oxicache_core::{ConnectionOptions, Error, Result, RetryPolicy};
pub use server::Server;
