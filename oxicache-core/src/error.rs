//! Error types shared by the cache clients.

use std::io;

use thiserror::Error;

/// Result type for cache operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type covering both cache protocols.
///
/// Most variants mean the connection's framing can no longer be trusted and
/// the connection must be discarded. The exceptions are the semantic replies
/// a server sends over an intact stream; [`Error::is_resumable`] identifies
/// those.
#[derive(Error, Debug)]
pub enum Error {
    /// Establishing the TCP connection failed (or timed out).
    #[error("failed to connect: {0}")]
    ConnectionFailed(#[source] io::Error),

    /// A read from the stream failed (or timed out).
    #[error("read failed: {0}")]
    ReadFailed(#[source] io::Error),

    /// A write to the stream failed (or timed out).
    #[error("write failed: {0}")]
    WriteFailed(#[source] io::Error),

    /// The peer closed the connection mid-response.
    #[error("connection closed by server")]
    EndOfStream,

    /// The response violates the wire framing.
    #[error("protocol error: {0}")]
    Protocol(&'static str),

    /// The response is well-framed but of the wrong kind for this call.
    #[error("unexpected response type")]
    UnexpectedType,

    /// The value does not fit into the caller-provided buffer.
    #[error("value too large for the provided buffer")]
    ValueTooLarge,

    /// A non-digit character appeared inside an integer field.
    #[error("invalid character in integer")]
    InvalidCharacter,

    /// An integer field exceeds the representable range.
    #[error("integer overflow")]
    Overflow,

    /// The Redis server rejected the command (`-ERR ...`).
    #[error("redis: {0}")]
    Redis(String),

    /// Memcached refused to store the item (`NS`).
    #[error("item not stored")]
    NotStored,

    /// The compare-and-swap token no longer matches (`EX`).
    #[error("compare-and-swap conflict")]
    Exists,

    /// The key does not exist (`EN`/`NF`).
    #[error("key not found")]
    NotFound,

    /// Memcached reported a server-side failure (`SERVER_ERROR ...`).
    #[error("server error: {0}")]
    Server(String),

    /// More than the supported number of keys in one command.
    #[error("too many keys in one command")]
    TooManyKeys,

    /// A server address is not of the form `host:port`.
    #[error("invalid server address: {0}")]
    InvalidServer(String),

    /// The client was configured with an empty server list.
    #[error("no servers configured")]
    NoServers,
}

impl Error {
    /// True if the server rejected the command over an intact stream.
    ///
    /// A resumable error leaves the connection framed: the next command can
    /// be sent on it as-is. Every other error means the stream may hold
    /// unread or half-read bytes and the connection must be discarded.
    pub fn is_resumable(&self) -> bool {
        matches!(
            self,
            Error::Redis(_)
                | Error::NotStored
                | Error::Exists
                | Error::NotFound
                | Error::Server(_)
        )
    }
}
