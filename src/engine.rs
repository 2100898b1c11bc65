//! Engine Module
//!
//! Executes decoded commands against the stream registry.
//!
//! ## Responsibilities
//! - Route each command to the registry
//! - Turn `wait_ms` into deadlines for blocking commands
//! - Shape registry results into protocol replies

use std::time::{Duration, Instant};

use crate::config::ServerConfig;
use crate::error::Result;
use crate::protocol::{Command, Reply};
use crate::store::StreamRegistry;

/// The store-side command executor
///
/// ## Concurrency Model
///
/// `execute` takes `&self` and is called from every session thread at once.
/// Blocking commands (WAIT_READY, FETCH) park only the calling session;
/// the registry never holds its map lock across a wait.
pub struct Engine {
    /// Engine configuration
    config: ServerConfig,

    /// Every stream held by this store
    registry: StreamRegistry,
}

impl Engine {
    pub fn new(config: ServerConfig) -> Self {
        let registry = StreamRegistry::new(config.max_fetch_bytes);
        Self { config, registry }
    }

    /// Execute a command
    ///
    /// Routes commands to appropriate handlers
    pub fn execute(&self, command: Command) -> Result<Reply> {
        match command {
            Command::Ping => Ok(Reply::Pong),
            Command::CreateStream {
                name,
                schema,
                metadata,
            } => Ok(Reply::Stream(self.registry.create(&name, schema, metadata)?)),
            Command::WaitReady { name, wait_ms } => {
                let info = self.registry.wait_ready(&name, deadline(wait_ms));
                Ok(Reply::Stream(info))
            }
            Command::Append {
                name,
                sample_count,
                data,
            } => {
                let length = self.registry.append(&name, sample_count, &data)?;
                Ok(Reply::Appended { length })
            }
            Command::Fetch {
                name,
                cursor,
                max_samples,
                wait_ms,
            } => {
                let batch = self
                    .registry
                    .fetch(&name, cursor, max_samples, deadline(wait_ms))?;
                Ok(Reply::Batch {
                    data: batch.data,
                    count: batch.count,
                    next_cursor: batch.next_cursor,
                    ended: batch.ended,
                })
            }
            Command::EndStream { name } => {
                self.registry.end(&name)?;
                tracing::debug!("Stream '{}' ended", name);
                Ok(Reply::Ack)
            }
            Command::DeleteStream { name } => {
                self.registry.delete(&name)?;
                Ok(Reply::Ack)
            }
            Command::ListStreams => Ok(Reply::Streams(self.registry.list())),
        }
    }

    // =========================================================================
    // Accessors (for testing and debugging)
    // =========================================================================

    pub fn registry(&self) -> &StreamRegistry {
        &self.registry
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}

/// Longest a single blocking command may park a session
const MAX_WAIT: Duration = Duration::from_secs(24 * 60 * 60);

fn deadline(wait_ms: u64) -> Instant {
    Instant::now() + Duration::from_millis(wait_ms).min(MAX_WAIT)
}
