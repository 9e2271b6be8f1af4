//! Per-connection configuration.

use std::time::Duration;

/// Default size of the read and write buffer, in bytes.
pub const DEFAULT_BUFFER_SIZE: usize = 4096;

/// Options applied to every connection a pool creates.
#[derive(Debug, Clone)]
pub struct ConnectionOptions {
    /// Capacity of the receive-side buffer.
    pub read_buffer_size: usize,
    /// Capacity of the send-side staging buffer.
    pub write_buffer_size: usize,
    /// Limit on establishing the TCP connection. `None` means no limit.
    pub connect_timeout: Option<Duration>,
    /// Limit on each read from the stream. `None` means no limit.
    pub read_timeout: Option<Duration>,
    /// Limit on each write to the stream. `None` means no limit.
    pub write_timeout: Option<Duration>,
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self {
            read_buffer_size: DEFAULT_BUFFER_SIZE,
            write_buffer_size: DEFAULT_BUFFER_SIZE,
            connect_timeout: None,
            read_timeout: None,
            write_timeout: None,
        }
    }
}

impl ConnectionOptions {
    /// Create options with the defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the read buffer capacity.
    #[must_use]
    pub const fn with_read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size;
        self
    }

    /// Set the write buffer capacity.
    #[must_use]
    pub const fn with_write_buffer_size(mut self, size: usize) -> Self {
        self.write_buffer_size = size;
        self
    }

    /// Set the connect timeout.
    #[must_use]
    pub const fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Set the per-read timeout.
    #[must_use]
    pub const fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = Some(timeout);
        self
    }

    /// Set the per-write timeout.
    #[must_use]
    pub const fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = Some(timeout);
        self
    }
}
