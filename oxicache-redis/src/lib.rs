//! Async Redis client speaking RESP2.
//!
//! The client exposes a curated string-command surface plus a pipeline API.
//! Connections are pooled per server, transient transport failures are
//! retried with a configurable back-off, and server-side command rejections
//! (`-ERR ...`) are surfaced immediately while the connection stays pooled.
//!
//! # Quick Start
//!
//! ```no_run
//! use oxicache_redis::{Client, Config, SetOptions};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = Client::new(Config::new("localhost:6379"))?;
//!
//!     client.set("hello", b"world", &SetOptions::default()).await?;
//!     let mut buf = [0u8; 128];
//!     if let Some(value) = client.get("hello", &mut buf).await? {
//!         println!("hello = {}", String::from_utf8_lossy(value));
//!     }
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]

pub mod client;
pub mod connection;
pub mod pipeline;
pub mod protocol;

pub use client::{Client, Config, SetOptions};
pub use connection::Connection;
pub use oxicache_core::{ConnectionOptions, Error, Result, RetryPolicy};
pub use pipeline::{Pipeline, Reply};
pub use protocol::Value;
