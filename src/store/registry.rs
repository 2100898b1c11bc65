//! Stream registry
//!
//! Maps stream names to their logs and lets callers wait for readiness.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::{Condvar, Mutex};

use crate::error::{Result, RiverError};
use crate::protocol::MAX_BATCH_BYTES;
use crate::schema::StreamSchema;

use super::{FetchBatch, StreamInfo, StreamLog};

/// All streams held by one store
///
/// ## Concurrency:
/// - `streams`: Mutex over the name map, held only for lookups and
///   lifecycle changes, never across a fetch wait
/// - `readiness`: signalled whenever a stream becomes ready, and on close
/// - `closed`: set under the `streams` lock so waiters cannot miss it
pub struct StreamRegistry {
    streams: Mutex<HashMap<String, Arc<StreamLog>>>,
    readiness: Condvar,
    closed: AtomicBool,
    max_fetch_bytes: usize,
}

impl StreamRegistry {
    /// `max_fetch_bytes` is clamped so a batch always fits in one frame
    pub fn new(max_fetch_bytes: usize) -> Self {
        Self {
            streams: Mutex::new(HashMap::new()),
            readiness: Condvar::new(),
            closed: AtomicBool::new(false),
            max_fetch_bytes: max_fetch_bytes.clamp(1, MAX_BATCH_BYTES),
        }
    }

    /// Create a stream, or promote a pending one
    ///
    /// - no schema: registers a pending placeholder; a no-op if the name exists
    /// - schema: creates a ready stream, or makes a pending one ready; fails
    ///   with `StreamExists` if it is already ready
    pub fn create(
        &self,
        name: &str,
        schema: Option<StreamSchema>,
        metadata: BTreeMap<String, String>,
    ) -> Result<StreamInfo> {
        if name.is_empty() {
            return Err(RiverError::InvalidArgument("stream name must not be empty".into()));
        }
        if let Some(schema) = &schema {
            schema.validate()?;
        }

        let mut streams = self.streams.lock();
        let existing = streams.get(name).cloned();
        let info = match (existing, schema) {
            (Some(log), None) => log.info(),
            (Some(log), Some(schema)) => {
                log.make_ready(schema, metadata)?;
                tracing::debug!("Stream '{}' promoted from pending to ready", name);
                log.info()
            }
            (None, schema) => {
                let log = match schema {
                    Some(schema) => StreamLog::ready(name, schema, metadata),
                    None => StreamLog::pending(name),
                };
                let info = log.info();
                streams.insert(name.to_string(), Arc::new(log));
                tracing::debug!("Stream '{}' created ({:?})", name, info.state);
                info
            }
        };
        drop(streams);

        if info.is_ready() {
            self.readiness.notify_all();
        }
        Ok(info)
    }

    /// Block until `name` is ready or `deadline` passes
    ///
    /// Never fails: the returned info says whether the stream made it.
    pub fn wait_ready(&self, name: &str, deadline: Instant) -> StreamInfo {
        let mut streams = self.streams.lock();
        loop {
            let current = streams.get(name).map(|log| log.info());
            match current {
                Some(info) if info.is_ready() => return info,
                current if self.is_closed() || Instant::now() >= deadline => {
                    return current.unwrap_or_else(|| StreamInfo::absent(name))
                }
                _ => {}
            }
            self.readiness.wait_until(&mut streams, deadline);
        }
    }

    /// Look up a stream's log
    pub fn log(&self, name: &str) -> Result<Arc<StreamLog>> {
        self.streams
            .lock()
            .get(name)
            .cloned()
            .ok_or_else(|| RiverError::StreamNotFound(name.to_string()))
    }

    pub fn append(&self, name: &str, sample_count: u64, data: &[u8]) -> Result<u64> {
        self.log(name)?.append(sample_count, data)
    }

    /// Fetch from a stream without holding the registry lock during the wait
    pub fn fetch(
        &self,
        name: &str,
        cursor: u64,
        max_samples: u64,
        deadline: Instant,
    ) -> Result<FetchBatch> {
        if self.is_closed() {
            return Err(RiverError::Server("store is shutting down".into()));
        }
        let log = self.log(name)?;
        log.fetch(cursor, max_samples, self.max_fetch_bytes, deadline)
    }

    pub fn end(&self, name: &str) -> Result<()> {
        self.log(name)?.end()
    }

    pub fn delete(&self, name: &str) -> Result<()> {
        let log = self
            .streams
            .lock()
            .remove(name)
            .ok_or_else(|| RiverError::StreamNotFound(name.to_string()))?;
        log.mark_deleted();
        tracing::debug!("Stream '{}' deleted", name);
        Ok(())
    }

    pub fn info(&self, name: &str) -> Option<StreamInfo> {
        self.streams.lock().get(name).map(|log| log.info())
    }

    /// Every stream, sorted by name
    pub fn list(&self) -> Vec<StreamInfo> {
        let mut infos: Vec<StreamInfo> = self.streams.lock().values().map(|log| log.info()).collect();
        infos.sort_by(|a, b| a.name.cmp(&b.name));
        infos
    }

    /// Wake every parked WAIT_READY and FETCH; used on store shutdown
    ///
    /// Fetches fail afterwards and readiness waits return immediately.
    pub fn close(&self) {
        let streams = self.streams.lock();
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        for log in streams.values() {
            log.close();
        }
        drop(streams);
        self.readiness.notify_all();
        tracing::debug!("Stream registry closed");
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn max_fetch_bytes(&self) -> usize {
        self.max_fetch_bytes
    }

    pub fn stream_count(&self) -> usize {
        self.streams.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{Record, SpikeRecord};
    use crate::store::StreamState;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_wait_ready_absent_with_zero_wait() {
        let registry = StreamRegistry::new(1024);
        let start = Instant::now();
        let info = registry.wait_ready("S", Instant::now());
        assert_eq!(info.state, StreamState::Absent);
        assert!(start.elapsed() < Duration::from_millis(50));
    }

    #[test]
    fn test_wait_ready_wakes_on_creation() {
        let registry = Arc::new(StreamRegistry::new(1024));
        let creator = Arc::clone(&registry);
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            creator
                .create("late", Some(SpikeRecord::schema()), BTreeMap::new())
                .unwrap();
        });

        let info = registry.wait_ready("late", Instant::now() + Duration::from_secs(5));
        assert!(info.is_ready());
        handle.join().unwrap();
    }

    #[test]
    fn test_pending_then_ready() {
        let registry = StreamRegistry::new(1024);
        let info = registry.create("p", None, BTreeMap::new()).unwrap();
        assert_eq!(info.state, StreamState::Pending);

        // Repeated placeholder registration is harmless
        registry.create("p", None, BTreeMap::new()).unwrap();

        let info = registry.wait_ready("p", Instant::now());
        assert_eq!(info.state, StreamState::Pending);

        let mut metadata = BTreeMap::new();
        metadata.insert("sampling_rate".to_string(), "30000".to_string());
        let info = registry
            .create("p", Some(SpikeRecord::schema()), metadata)
            .unwrap();
        assert!(info.is_ready());
        assert_eq!(info.metadata.get("sampling_rate").map(String::as_str), Some("30000"));
    }

    #[test]
    fn test_create_ready_twice_conflicts() {
        let registry = StreamRegistry::new(1024);
        registry
            .create("s", Some(SpikeRecord::schema()), BTreeMap::new())
            .unwrap();
        assert!(matches!(
            registry.create("s", Some(SpikeRecord::schema()), BTreeMap::new()),
            Err(RiverError::StreamExists(_))
        ));
    }

    #[test]
    fn test_delete_wakes_fetcher() {
        let registry = Arc::new(StreamRegistry::new(1024));
        registry
            .create("d", Some(SpikeRecord::schema()), BTreeMap::new())
            .unwrap();

        let reader = Arc::clone(&registry);
        let handle = thread::spawn(move || {
            reader.fetch("d", 0, 1, Instant::now() + Duration::from_secs(5))
        });
        thread::sleep(Duration::from_millis(20));
        registry.delete("d").unwrap();

        let result = handle.join().unwrap();
        assert!(matches!(result, Err(RiverError::StreamNotFound(_))));
        assert!(registry.info("d").is_none());
    }

    #[test]
    fn test_list_sorted() {
        let registry = StreamRegistry::new(1024);
        registry.create("b", None, BTreeMap::new()).unwrap();
        registry.create("a", None, BTreeMap::new()).unwrap();
        let names: Vec<String> = registry.list().into_iter().map(|i| i.name).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(registry.stream_count(), 2);
    }

    #[test]
    fn test_invalid_schema_rejected() {
        let registry = StreamRegistry::new(1024);
        let empty = StreamSchema {
            field_definitions: vec![],
        };
        assert!(matches!(
            registry.create("e", Some(empty.clone()), BTreeMap::new()),
            Err(RiverError::Schema(_))
        ));
        assert!(registry.info("e").is_none());

        // A pending placeholder cannot be promoted with a bad schema either
        registry.create("p", None, BTreeMap::new()).unwrap();
        assert!(registry.create("p", Some(empty), BTreeMap::new()).is_err());
        assert_eq!(registry.info("p").map(|i| i.state), Some(StreamState::Pending));
    }

    #[test]
    fn test_fetch_bytes_clamped_to_frame() {
        let registry = StreamRegistry::new(usize::MAX);
        assert_eq!(registry.max_fetch_bytes(), MAX_BATCH_BYTES);
        assert_eq!(StreamRegistry::new(0).max_fetch_bytes(), 1);

        registry
            .create("big", Some(SpikeRecord::schema()), BTreeMap::new())
            .unwrap();
        let count = MAX_BATCH_BYTES / SpikeRecord::SIZE + 1000;
        registry
            .append("big", count as u64, &vec![0u8; count * SpikeRecord::SIZE])
            .unwrap();

        let batch = registry.fetch("big", 0, count as u64, Instant::now()).unwrap();
        assert!(batch.data.len() <= MAX_BATCH_BYTES);
        assert!(batch.count < count as u64);
    }

    #[test]
    fn test_close_wakes_waiters() {
        let registry = Arc::new(StreamRegistry::new(1024));
        registry
            .create("s", Some(SpikeRecord::schema()), BTreeMap::new())
            .unwrap();

        let fetcher = Arc::clone(&registry);
        let fetch = thread::spawn(move || {
            fetcher.fetch("s", 0, 1, Instant::now() + Duration::from_secs(5))
        });
        let waiter = Arc::clone(&registry);
        let wait = thread::spawn(move || {
            waiter.wait_ready("never", Instant::now() + Duration::from_secs(5))
        });

        let start = Instant::now();
        thread::sleep(Duration::from_millis(20));
        registry.close();

        assert!(matches!(fetch.join().unwrap(), Err(RiverError::Server(_))));
        assert_eq!(wait.join().unwrap().state, StreamState::Absent);
        assert!(start.elapsed() < Duration::from_secs(5));
        assert!(registry.is_closed());
    }

    #[test]
    fn test_empty_name_rejected() {
        let registry = StreamRegistry::new(1024);
        assert!(matches!(
            registry.create("", None, BTreeMap::new()),
            Err(RiverError::InvalidArgument(_))
        ));
    }
}
