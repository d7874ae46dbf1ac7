//! Server configuration.

use std::time::Duration;

/// Transport settings for [`Server`](crate::Server).
///
/// ```rust
/// use std::time::Duration;
/// use strata::ServerConfig;
///
/// let config = ServerConfig::default()
///     .with_max_body_size(64 * 1024)
///     .with_shutdown_grace(Duration::from_secs(10));
/// assert!(config.keep_alive);
/// ```
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Time a client gets to send the request head on HTTP/1.
    pub header_read_timeout: Duration,
    /// Whether HTTP/1 connections are kept open between requests.
    pub keep_alive: bool,
    /// Largest request body accepted; larger ones get `413`.
    pub max_body_size: usize,
    /// How long in-flight connections may run after a shutdown signal
    /// before they are aborted.
    pub shutdown_grace: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            header_read_timeout: Duration::from_secs(5),
            keep_alive: true,
            max_body_size: 1024 * 1024,
            shutdown_grace: Duration::from_secs(2),
        }
    }
}

impl ServerConfig {
    pub fn with_header_read_timeout(mut self, timeout: Duration) -> Self {
        self.header_read_timeout = timeout;
        self
    }

    pub fn with_keep_alive(mut self, enabled: bool) -> Self {
        self.keep_alive = enabled;
        self
    }

    pub fn with_max_body_size(mut self, bytes: usize) -> Self {
        self.max_body_size = bytes;
        self
    }

    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }
}
