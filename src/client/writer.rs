//! Stream writer
//!
//! The producer-side counterpart of [`StreamReader`](super::StreamReader).

use std::collections::BTreeMap;
use std::marker::PhantomData;
use std::ops::{Deref, DerefMut};

use crate::error::{Result, RiverError};
use crate::protocol::{Command, Reply};
use crate::record::{encode_records, Record};
use crate::schema::StreamSchema;

use super::connection::{unexpected_reply, Connection};

/// Appends records of type `R` to one stream
pub struct StreamWriter<R: Record> {
    connection: Connection,
    stream_name: Option<String>,
    stopped: bool,
    total_samples_written: u64,
    _record: PhantomData<R>,
}

impl<R: Record> StreamWriter<R> {
    pub fn new(connection: Connection) -> Self {
        Self {
            connection,
            stream_name: None,
            stopped: false,
            total_samples_written: 0,
            _record: PhantomData,
        }
    }

    /// Create `stream_name` with this writer's schema and the given metadata
    ///
    /// A pending placeholder left by a reader is promoted to ready; a stream
    /// that is already ready fails with `StreamExists`.
    pub fn initialize(
        &mut self,
        stream_name: &str,
        metadata: BTreeMap<String, String>,
    ) -> Result<()> {
        if let Some(current) = &self.stream_name {
            return Err(RiverError::InvalidArgument(format!(
                "writer already initialized for '{}'",
                current
            )));
        }
        if stream_name.is_empty() {
            return Err(RiverError::InvalidArgument("stream name must not be empty".into()));
        }

        let reply = self.connection.request(&Command::CreateStream {
            name: stream_name.to_string(),
            schema: Some(R::schema()),
            metadata,
        })?;
        match reply {
            Reply::Stream(info) if info.is_ready() => {}
            other => return Err(unexpected_reply("CREATE_STREAM", &other)),
        }

        tracing::debug!("Writer created stream '{}'", stream_name);
        self.stream_name = Some(stream_name.to_string());
        Ok(())
    }

    /// Append a batch of records in order
    pub fn write(&mut self, records: &[R]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }
        self.append(records.len() as u64, encode_records(records))
    }

    /// Append `sample_count` records that are already in packed form
    pub fn write_bytes(&mut self, data: &[u8], sample_count: usize) -> Result<()> {
        let expected = sample_count.checked_mul(R::SIZE).ok_or_else(|| {
            RiverError::InvalidArgument(format!(
                "{} samples of {} bytes overflow a batch",
                sample_count,
                R::SIZE
            ))
        })?;
        if data.len() != expected {
            return Err(RiverError::InvalidArgument(format!(
                "{} samples of {} bytes need {} bytes, got {}",
                sample_count,
                R::SIZE,
                expected,
                data.len()
            )));
        }
        if sample_count == 0 {
            return Ok(());
        }
        self.append(sample_count as u64, data.to_vec())
    }

    fn append(&mut self, sample_count: u64, data: Vec<u8>) -> Result<()> {
        let name = self
            .stream_name
            .clone()
            .ok_or(RiverError::NotInitialized("write"))?;
        if self.stopped {
            return Err(RiverError::StreamEnded(name));
        }

        match self.connection.request(&Command::Append {
            name,
            sample_count,
            data,
        })? {
            Reply::Appended { .. } => {
                self.total_samples_written += sample_count;
                Ok(())
            }
            other => Err(unexpected_reply("APPEND", &other)),
        }
    }

    /// Mark the stream ended so readers see end-of-stream
    ///
    /// Safe to call more than once; only the first call reaches the store.
    pub fn stop(&mut self) -> Result<()> {
        let name = match (&self.stream_name, self.stopped) {
            (Some(name), false) => name.clone(),
            _ => return Ok(()),
        };
        self.stopped = true;

        match self.connection.request(&Command::EndStream { name: name.clone() })? {
            Reply::Ack => {
                tracing::debug!(
                    "Writer ended stream '{}' after {} records",
                    name,
                    self.total_samples_written
                );
                Ok(())
            }
            other => Err(unexpected_reply("END_STREAM", &other)),
        }
    }

    pub fn stream_name(&self) -> Option<&str> {
        self.stream_name.as_deref()
    }

    pub fn schema(&self) -> StreamSchema {
        R::schema()
    }

    pub fn total_samples_written(&self) -> u64 {
        self.total_samples_written
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    /// Open (or validate) the connection and return a guard that ends the
    /// stream and closes the connection when it goes out of scope
    pub fn scope(&mut self) -> Result<WriterScope<'_, R>> {
        self.connection.connect()?;
        Ok(WriterScope { writer: self })
    }
}

/// Scoped access to a writer; dropping it stops the writer and closes the
/// connection
pub struct WriterScope<'a, R: Record> {
    writer: &'a mut StreamWriter<R>,
}

impl<R: Record> Deref for WriterScope<'_, R> {
    type Target = StreamWriter<R>;

    fn deref(&self) -> &StreamWriter<R> {
        self.writer
    }
}

impl<R: Record> DerefMut for WriterScope<'_, R> {
    fn deref_mut(&mut self) -> &mut StreamWriter<R> {
        self.writer
    }
}

impl<R: Record> Drop for WriterScope<'_, R> {
    fn drop(&mut self) {
        if let Err(e) = self.writer.stop() {
            tracing::warn!("Failed to end stream on scope exit: {}", e);
        }
        if let Err(e) = self.writer.connection.close() {
            tracing::warn!("Failed to close writer connection: {}", e);
        }
    }
}
