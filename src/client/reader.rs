//! Stream reader
//!
//! Reads batches of records into caller-owned buffers.
//!
//! ## Usage
//! ```no_run
//! use river::client::{Connection, ReadResult, StreamReader};
//! use river::record::SpikeRecord;
//!
//! # fn main() -> river::Result<()> {
//! let mut reader = StreamReader::<SpikeRecord>::new(Connection::open("127.0.0.1", 6379)?);
//! reader.initialize("Red-769", 10_000)?;
//! let mut data = reader.new_buffer(1);
//!
//! let mut scope = reader.scope()?;
//! loop {
//!     match scope.read(&mut data, 100)? {
//!         ReadResult::Filled(n) => {
//!             for spike in data.filled(n) {
//!                 println!("{:?}", spike);
//!             }
//!         }
//!         ReadResult::Empty => continue,
//!         ReadResult::EndOfStream => break,
//!     }
//! }
//! # Ok(())
//! # }
//! ```

use std::collections::BTreeMap;
use std::marker::PhantomData;
use std::ops::{Deref, DerefMut};

use crate::error::{Result, RiverError};
use crate::protocol::{Command, Reply};
use crate::record::{Record, RecordBuffer};
use crate::schema::StreamSchema;

use super::connection::{unexpected_reply, Connection};
use super::resolver::{StreamHandle, StreamResolver};

/// Outcome of one `read` call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadResult {
    /// Slots `[0, n)` hold new records, `n >= 1`
    Filled(usize),

    /// Nothing arrived before the timeout; the stream is still open
    Empty,

    /// No record will ever arrive again. Sticky.
    EndOfStream,
}

impl ReadResult {
    /// Classic return-code form: `n`, `0`, or `-1`
    pub fn as_count(&self) -> i64 {
        match self {
            ReadResult::Filled(n) => *n as i64,
            ReadResult::Empty => 0,
            ReadResult::EndOfStream => -1,
        }
    }

    /// Records delivered by this call
    pub fn count(&self) -> usize {
        match self {
            ReadResult::Filled(n) => *n,
            _ => 0,
        }
    }

    pub fn is_end_of_stream(&self) -> bool {
        matches!(self, ReadResult::EndOfStream)
    }
}

/// Reads records of type `R` from one stream at a time
pub struct StreamReader<R: Record> {
    connection: Connection,
    handle: Option<StreamHandle>,
    /// Set once end-of-stream is observed; cleared only by rebinding
    eof: bool,
    total_samples_read: u64,
    _record: PhantomData<R>,
}

impl<R: Record> StreamReader<R> {
    pub fn new(connection: Connection) -> Self {
        Self {
            connection,
            handle: None,
            eof: false,
            total_samples_read: 0,
            _record: PhantomData,
        }
    }

    /// Bind to `stream_name`, waiting up to `timeout_ms` for it to be ready
    ///
    /// Rebinding discards the previous cursor and any end-of-stream state.
    /// On failure the reader is left unbound.
    pub fn initialize(&mut self, stream_name: &str, timeout_ms: u64) -> Result<()> {
        self.handle = None;
        self.eof = false;

        let handle = StreamResolver::new(&self.connection).resolve(stream_name, timeout_ms)?;

        let expected = R::schema();
        if handle.schema() != &expected {
            return Err(RiverError::SchemaMismatch {
                stream: stream_name.to_string(),
                expected: expected.to_string(),
                got: handle.schema().to_string(),
            });
        }

        tracing::debug!("Reader bound to stream '{}'", stream_name);
        self.handle = Some(handle);
        Ok(())
    }

    /// Fill `buffer` with up to `buffer.capacity()` records
    ///
    /// Blocks until at least one record is available, the stream ends, or
    /// `timeout_ms` elapses. One call is one bounded wait; there are no
    /// internal retries.
    pub fn read(&mut self, buffer: &mut RecordBuffer<R>, timeout_ms: u64) -> Result<ReadResult> {
        if buffer.capacity() == 0 {
            return Err(RiverError::InvalidArgument("buffer capacity must be at least 1".into()));
        }
        let handle = self.handle.as_mut().ok_or(RiverError::NotInitialized("read"))?;
        if self.eof {
            return Ok(ReadResult::EndOfStream);
        }

        let reply = self.connection.request(&Command::Fetch {
            name: handle.name().to_string(),
            cursor: handle.cursor,
            max_samples: buffer.capacity() as u64,
            wait_ms: timeout_ms,
        })?;

        let (data, count, next_cursor, ended) = match reply {
            Reply::Batch {
                data,
                count,
                next_cursor,
                ended,
            } => (data, count, next_cursor, ended),
            other => return Err(unexpected_reply("FETCH", &other)),
        };

        if next_cursor != handle.cursor + count {
            return Err(RiverError::Protocol(format!(
                "cursor moved from {} to {} for {} records",
                handle.cursor, next_cursor, count
            )));
        }
        let filled = buffer.fill_from(&data)?;
        if filled as u64 != count {
            return Err(RiverError::Protocol(format!(
                "batch declared {} records but carried {}",
                count, filled
            )));
        }

        handle.cursor = next_cursor;
        self.total_samples_read += count;
        self.eof = ended;

        if filled > 0 {
            Ok(ReadResult::Filled(filled))
        } else if ended {
            tracing::debug!("End of stream '{}'", handle.name());
            Ok(ReadResult::EndOfStream)
        } else {
            Ok(ReadResult::Empty)
        }
    }

    /// A buffer sized for `capacity` records of this reader's type
    pub fn new_buffer(&self, capacity: usize) -> RecordBuffer<R> {
        RecordBuffer::new(capacity)
    }

    pub fn stream_name(&self) -> Option<&str> {
        self.handle.as_ref().map(|h| h.name())
    }

    /// Writer-supplied metadata of the bound stream
    pub fn metadata(&self) -> Option<&BTreeMap<String, String>> {
        self.handle.as_ref().map(|h| h.metadata())
    }

    pub fn schema(&self) -> StreamSchema {
        R::schema()
    }

    pub fn is_initialized(&self) -> bool {
        self.handle.is_some()
    }

    pub fn total_samples_read(&self) -> u64 {
        self.total_samples_read
    }

    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    /// Release the stream binding and close the connection
    pub fn stop(&mut self) -> Result<()> {
        if let Some(handle) = self.handle.take() {
            tracing::debug!(
                "Reader for '{}' stopping after {} records",
                handle.name(),
                self.total_samples_read
            );
        }
        self.eof = false;
        self.connection.close()
    }

    /// Open (or validate) the connection and return a guard that stops the
    /// reader when it goes out of scope
    pub fn scope(&mut self) -> Result<ReaderScope<'_, R>> {
        self.connection.connect()?;
        Ok(ReaderScope { reader: self })
    }
}

/// Scoped access to a reader; dropping it calls [`StreamReader::stop`]
pub struct ReaderScope<'a, R: Record> {
    reader: &'a mut StreamReader<R>,
}

impl<R: Record> Deref for ReaderScope<'_, R> {
    type Target = StreamReader<R>;

    fn deref(&self) -> &StreamReader<R> {
        self.reader
    }
}

impl<R: Record> DerefMut for ReaderScope<'_, R> {
    fn deref_mut(&mut self) -> &mut StreamReader<R> {
        self.reader
    }
}

impl<R: Record> Drop for ReaderScope<'_, R> {
    fn drop(&mut self) {
        if let Err(e) = self.reader.stop() {
            tracing::warn!("Failed to stop reader: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;
    use crate::record::SpikeRecord;

    #[test]
    fn test_read_result_counts() {
        assert_eq!(ReadResult::Filled(3).as_count(), 3);
        assert_eq!(ReadResult::Empty.as_count(), 0);
        assert_eq!(ReadResult::EndOfStream.as_count(), -1);
        assert_eq!(ReadResult::EndOfStream.count(), 0);
        assert!(ReadResult::EndOfStream.is_end_of_stream());
    }

    #[test]
    fn test_zero_capacity_rejected_before_connection_use() {
        // Never opened: any request would fail with a connect error
        let mut reader = StreamReader::<SpikeRecord>::new(Connection::new(ClientConfig::default()));
        let mut buffer = reader.new_buffer(0);
        assert!(matches!(
            reader.read(&mut buffer, 0),
            Err(RiverError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_read_before_initialize() {
        let mut reader = StreamReader::<SpikeRecord>::new(Connection::new(ClientConfig::default()));
        let mut buffer = reader.new_buffer(1);
        assert!(matches!(
            reader.read(&mut buffer, 0),
            Err(RiverError::NotInitialized(_))
        ));
        assert_eq!(reader.stream_name(), None);
    }
}
