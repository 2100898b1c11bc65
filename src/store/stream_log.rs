//! Stream log
//!
//! One append-only sequence of packed samples.

use std::collections::BTreeMap;
use std::time::Instant;

use bytes::BytesMut;
use parking_lot::{Condvar, Mutex};

use crate::error::{Result, RiverError};
use crate::schema::StreamSchema;

use super::{StreamInfo, StreamState};

/// Samples handed out by a single fetch
#[derive(Debug, Clone, PartialEq)]
pub struct FetchBatch {
    pub data: Vec<u8>,
    pub count: u64,
    pub next_cursor: u64,
    /// Stream is ended and `next_cursor` is at its tail
    pub ended: bool,
}

struct LogState {
    /// `None` while the stream is a pending placeholder
    schema: Option<StreamSchema>,
    metadata: BTreeMap<String, String>,
    data: BytesMut,
    length: u64,
    ended: bool,
    deleted: bool,
    /// The store is shutting down
    closed: bool,
}

/// Append-only sample log for one stream
///
/// ## Concurrency:
/// - All state sits behind one Mutex
/// - Fetchers park on `changed` and are woken by append, end, delete, and
///   store shutdown
pub struct StreamLog {
    name: String,
    state: Mutex<LogState>,
    changed: Condvar,
}

impl StreamLog {
    /// A placeholder that becomes ready once a writer supplies the schema
    pub fn pending(name: &str) -> Self {
        Self::with_state(name, None, BTreeMap::new())
    }

    pub fn ready(name: &str, schema: StreamSchema, metadata: BTreeMap<String, String>) -> Self {
        Self::with_state(name, Some(schema), metadata)
    }

    fn with_state(
        name: &str,
        schema: Option<StreamSchema>,
        metadata: BTreeMap<String, String>,
    ) -> Self {
        Self {
            name: name.to_string(),
            state: Mutex::new(LogState {
                schema,
                metadata,
                data: BytesMut::new(),
                length: 0,
                ended: false,
                deleted: false,
                closed: false,
            }),
            changed: Condvar::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_ready(&self) -> bool {
        self.state.lock().schema.is_some()
    }

    /// Promote a pending log to ready
    pub fn make_ready(&self, schema: StreamSchema, metadata: BTreeMap<String, String>) -> Result<()> {
        let mut state = self.state.lock();
        if state.schema.is_some() {
            return Err(RiverError::StreamExists(self.name.clone()));
        }
        state.schema = Some(schema);
        state.metadata = metadata;
        Ok(())
    }

    pub fn info(&self) -> StreamInfo {
        let state = self.state.lock();
        StreamInfo {
            name: self.name.clone(),
            state: if state.schema.is_some() {
                StreamState::Ready
            } else {
                StreamState::Pending
            },
            schema: state.schema.clone(),
            metadata: state.metadata.clone(),
            length: state.length,
            ended: state.ended,
        }
    }

    /// Append `sample_count` packed samples; returns the new length
    pub fn append(&self, sample_count: u64, data: &[u8]) -> Result<u64> {
        let mut state = self.state.lock();
        let sample_size = match &state.schema {
            Some(schema) => schema.sample_size() as u64,
            None => {
                return Err(RiverError::InvalidArgument(format!(
                    "stream '{}' is not ready for writes",
                    self.name
                )))
            }
        };
        if state.ended {
            return Err(RiverError::StreamEnded(self.name.clone()));
        }
        let expected = sample_count.checked_mul(sample_size).ok_or_else(|| {
            RiverError::InvalidArgument(format!(
                "{} samples of {} bytes overflow the stream",
                sample_count, sample_size
            ))
        })?;
        if data.len() as u64 != expected {
            return Err(RiverError::InvalidArgument(format!(
                "{} samples of {} bytes need {} bytes, got {}",
                sample_count,
                sample_size,
                expected,
                data.len()
            )));
        }
        if sample_count == 0 {
            return Ok(state.length);
        }

        state.data.extend_from_slice(data);
        state.length += sample_count;
        let length = state.length;
        drop(state);

        self.changed.notify_all();
        Ok(length)
    }

    /// Return up to `max_samples` samples from `cursor`
    ///
    /// Blocks until at least one sample is available, the stream is ended,
    /// or `deadline` passes, whichever comes first. `max_bytes` further caps
    /// the batch but never below one sample.
    pub fn fetch(
        &self,
        cursor: u64,
        max_samples: u64,
        max_bytes: usize,
        deadline: Instant,
    ) -> Result<FetchBatch> {
        if max_samples == 0 {
            return Err(RiverError::InvalidArgument("max_samples must be at least 1".into()));
        }

        let mut state = self.state.lock();
        loop {
            if state.deleted {
                return Err(RiverError::StreamNotFound(self.name.clone()));
            }
            if state.closed {
                return Err(RiverError::Server("store is shutting down".into()));
            }
            let sample_size = match &state.schema {
                Some(schema) => schema.sample_size() as u64,
                None => {
                    return Err(RiverError::InvalidArgument(format!(
                        "stream '{}' is not ready for reads",
                        self.name
                    )))
                }
            };
            if cursor > state.length {
                return Err(RiverError::InvalidArgument(format!(
                    "cursor {} is past the end of '{}' ({} samples)",
                    cursor, self.name, state.length
                )));
            }

            let available = state.length - cursor;
            if available > 0 {
                let byte_cap = (max_bytes as u64 / sample_size).max(1);
                let count = available.min(max_samples).min(byte_cap);
                let start = (cursor * sample_size) as usize;
                let end = ((cursor + count) * sample_size) as usize;
                let next_cursor = cursor + count;
                return Ok(FetchBatch {
                    data: state.data[start..end].to_vec(),
                    count,
                    next_cursor,
                    ended: state.ended && next_cursor == state.length,
                });
            }

            if state.ended || Instant::now() >= deadline {
                return Ok(FetchBatch {
                    data: Vec::new(),
                    count: 0,
                    next_cursor: cursor,
                    ended: state.ended,
                });
            }

            self.changed.wait_until(&mut state, deadline);
        }
    }

    /// Mark the stream ended. Ending twice is a no-op.
    pub fn end(&self) -> Result<()> {
        let mut state = self.state.lock();
        if state.schema.is_none() {
            return Err(RiverError::InvalidArgument(format!(
                "stream '{}' is still pending",
                self.name
            )));
        }
        state.ended = true;
        drop(state);

        self.changed.notify_all();
        Ok(())
    }

    /// Wake and fail every fetcher; called once the log leaves the registry
    pub(crate) fn mark_deleted(&self) {
        self.state.lock().deleted = true;
        self.changed.notify_all();
    }

    /// Wake and fail every fetcher because the store is going away
    pub(crate) fn close(&self) {
        self.state.lock().closed = true;
        self.changed.notify_all();
    }
}
