//! Configuration for River
//!
//! Centralized configuration with sensible defaults, one struct per role:
//! the stream server, the client connection, and the batching writer.

use std::time::Duration;

use crate::error::{Result, RiverError};
use crate::protocol::MAX_BATCH_BYTES;

/// Default port, shared with the reference deployment
pub const DEFAULT_PORT: u16 = 6379;

// =============================================================================
// Server Configuration
// =============================================================================

/// Configuration for the stream server
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// TCP listen address
    pub listen_addr: String,

    /// Max concurrent client sessions
    pub max_connections: usize,

    /// Upper bound on the bytes returned by a single FETCH
    pub max_fetch_bytes: usize,

    /// How often the accept loop checks for shutdown (milliseconds)
    pub accept_poll_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: format!("127.0.0.1:{}", DEFAULT_PORT),
            max_connections: 1024,
            max_fetch_bytes: 4 * 1024 * 1024, // 4 MB
            accept_poll_ms: 10,
        }
    }
}

impl ServerConfig {
    /// Create a new config builder
    pub fn builder() -> ServerConfigBuilder {
        ServerConfigBuilder::default()
    }

    /// Reject settings the server cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.max_connections == 0 {
            return Err(RiverError::Config("max_connections must be at least 1".into()));
        }
        if self.max_fetch_bytes == 0 || self.max_fetch_bytes > MAX_BATCH_BYTES {
            return Err(RiverError::Config(format!(
                "max_fetch_bytes must be between 1 and {}, got {}",
                MAX_BATCH_BYTES, self.max_fetch_bytes
            )));
        }
        Ok(())
    }
}

/// Builder for ServerConfig
#[derive(Default)]
pub struct ServerConfigBuilder {
    config: ServerConfig,
}

impl ServerConfigBuilder {
    /// Set the TCP listen address
    pub fn listen_addr(mut self, addr: impl Into<String>) -> Self {
        self.config.listen_addr = addr.into();
        self
    }

    /// Set the maximum number of concurrent sessions
    pub fn max_connections(mut self, count: usize) -> Self {
        self.config.max_connections = count;
        self
    }

    /// Set the per-fetch byte limit
    pub fn max_fetch_bytes(mut self, bytes: usize) -> Self {
        self.config.max_fetch_bytes = bytes;
        self
    }

    /// Set the accept loop's shutdown polling interval (in milliseconds)
    pub fn accept_poll_ms(mut self, ms: u64) -> Self {
        self.config.accept_poll_ms = ms;
        self
    }

    pub fn build(self) -> ServerConfig {
        self.config
    }
}

// =============================================================================
// Client Configuration
// =============================================================================

/// What `initialize` does when the requested stream does not exist yet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResolvePolicy {
    /// Wait for a writer to create the stream (default)
    #[default]
    WaitForCreation,

    /// Register a pending placeholder, then wait for a writer to make it ready
    CreateIfMissing,
}

/// Configuration for a client connection
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Store host name or IP
    pub host: String,

    /// Store port
    pub port: u16,

    /// Bound on TCP connect (milliseconds)
    pub connect_timeout_ms: u64,

    /// Extra time allowed for a response on top of the request's own wait
    pub response_grace_ms: u64,

    /// Stream resolution policy used by readers
    pub resolve_policy: ResolvePolicy,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            connect_timeout_ms: 2000,
            response_grace_ms: 5000,
            resolve_policy: ResolvePolicy::WaitForCreation,
        }
    }
}

impl ClientConfig {
    /// Create a new config builder
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::default()
    }

    pub fn validate(&self) -> Result<()> {
        if self.host.is_empty() {
            return Err(RiverError::Config("host must not be empty".into()));
        }
        if self.port == 0 {
            return Err(RiverError::Config("port must not be 0".into()));
        }
        if self.connect_timeout_ms == 0 {
            return Err(RiverError::Config("connect_timeout_ms must be at least 1".into()));
        }
        Ok(())
    }

    /// `host:port` form of the store address
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn response_grace(&self) -> Duration {
        Duration::from_millis(self.response_grace_ms)
    }
}

/// Builder for ClientConfig
#[derive(Default)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    /// Set the store host
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.host = host.into();
        self
    }

    /// Set the store port
    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    /// Set the connect timeout (in milliseconds)
    pub fn connect_timeout_ms(mut self, ms: u64) -> Self {
        self.config.connect_timeout_ms = ms;
        self
    }

    /// Set the response grace period (in milliseconds)
    pub fn response_grace_ms(mut self, ms: u64) -> Self {
        self.config.response_grace_ms = ms;
        self
    }

    /// Set the stream resolution policy
    pub fn resolve_policy(mut self, policy: ResolvePolicy) -> Self {
        self.config.resolve_policy = policy;
        self
    }

    pub fn build(self) -> ClientConfig {
        self.config
    }
}

// =============================================================================
// Batching Writer Configuration
// =============================================================================

/// Configuration for [`BatchWriter`](crate::client::BatchWriter)
///
/// A non-positive latency or batch size disables the background thread and
/// every record is written synchronously.
#[derive(Debug, Clone, Copy)]
pub struct BatchConfig {
    /// Most records sent in one APPEND
    pub max_batch_size: i64,

    /// Longest a queued record waits before being sent (milliseconds)
    pub max_latency_ms: i64,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_batch_size: 4096,
            max_latency_ms: 5,
        }
    }
}

impl BatchConfig {
    pub fn new(max_batch_size: i64, max_latency_ms: i64) -> Self {
        Self {
            max_batch_size,
            max_latency_ms,
        }
    }

    /// Whether records go through the background thread
    pub fn is_async(&self) -> bool {
        self.max_batch_size > 0 && self.max_latency_ms > 0
    }
}
