//! Stream resolver
//!
//! Makes sure a named stream is ready and binds a fresh cursor to it.

use std::collections::BTreeMap;
use std::time::Instant;

use crate::config::ResolvePolicy;
use crate::error::{Result, RiverError};
use crate::protocol::{Command, Reply};
use crate::schema::StreamSchema;

use super::connection::{unexpected_reply, Connection};

/// A stream bound to a reader, with the reader's private cursor
#[derive(Debug, Clone)]
pub struct StreamHandle {
    name: String,
    schema: StreamSchema,
    metadata: BTreeMap<String, String>,
    /// Index of the next record to deliver
    pub(crate) cursor: u64,
}

impl StreamHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema(&self) -> &StreamSchema {
        &self.schema
    }

    pub fn metadata(&self) -> &BTreeMap<String, String> {
        &self.metadata
    }
}

/// Resolves stream names against a connection
pub struct StreamResolver<'a> {
    connection: &'a Connection,
    policy: ResolvePolicy,
}

impl<'a> StreamResolver<'a> {
    /// Resolver using the connection's configured policy
    pub fn new(connection: &'a Connection) -> Self {
        Self {
            connection,
            policy: connection.config().resolve_policy,
        }
    }

    pub fn with_policy(connection: &'a Connection, policy: ResolvePolicy) -> Self {
        Self { connection, policy }
    }

    /// Wait up to `timeout_ms` for `name` to be ready and bind to it
    ///
    /// `timeout_ms == 0` only checks the current state. The cursor starts at
    /// the earliest record in the stream.
    pub fn resolve(&self, name: &str, timeout_ms: u64) -> Result<StreamHandle> {
        if name.is_empty() {
            return Err(RiverError::InvalidArgument("stream name must not be empty".into()));
        }

        let started = Instant::now();

        if self.policy == ResolvePolicy::CreateIfMissing {
            let placeholder = Command::CreateStream {
                name: name.to_string(),
                schema: None,
                metadata: BTreeMap::new(),
            };
            match self.connection.request(&placeholder)? {
                Reply::Stream(_) => {}
                other => return Err(unexpected_reply("CREATE_STREAM", &other)),
            }
        }

        let reply = self.connection.request(&Command::WaitReady {
            name: name.to_string(),
            wait_ms: timeout_ms,
        })?;
        let info = match reply {
            Reply::Stream(info) => info,
            other => return Err(unexpected_reply("WAIT_READY", &other)),
        };

        let schema = match (info.is_ready(), info.schema) {
            (true, Some(schema)) => schema,
            _ => {
                let elapsed_ms = started.elapsed().as_millis() as u64;
                tracing::debug!(
                    "Stream '{}' still {:?} after {} ms",
                    name,
                    info.state,
                    elapsed_ms
                );
                return Err(RiverError::StreamTimeout {
                    name: name.to_string(),
                    elapsed_ms,
                });
            }
        };

        tracing::debug!("Resolved stream '{}' ({} records so far)", name, info.length);
        Ok(StreamHandle {
            name: info.name,
            schema,
            metadata: info.metadata,
            cursor: 0,
        })
    }
}
