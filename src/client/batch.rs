//! Batching writer
//!
//! Moves a [`StreamWriter`] onto a background thread that drains a bounded
//! queue once per latency period, so producers never wait on the network.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};

use crate::config::BatchConfig;
use crate::error::{Result, RiverError};
use crate::record::Record;

use super::writer::StreamWriter;

enum Mode<R: Record> {
    /// Non-positive batch size or latency: write on the caller's thread
    Sync(StreamWriter<R>),
    Async {
        sender: Sender<R>,
        worker: JoinHandle<Result<StreamWriter<R>>>,
    },
}

/// Queues records and appends them in batches
pub struct BatchWriter<R: Record> {
    mode: Mode<R>,
    written: Arc<AtomicU64>,
}

impl<R: Record> BatchWriter<R> {
    /// Wrap an initialized writer
    pub fn new(writer: StreamWriter<R>, config: BatchConfig) -> Result<Self> {
        let name = writer
            .stream_name()
            .ok_or(RiverError::NotInitialized("BatchWriter::new"))?
            .to_string();
        let written = Arc::new(AtomicU64::new(writer.total_samples_written()));

        if !config.is_async() {
            tracing::info!("Writing to River synchronously with stream name {}", name);
            return Ok(Self {
                mode: Mode::Sync(writer),
                written,
            });
        }

        let max_batch = config.max_batch_size as usize;
        let period = Duration::from_millis(config.max_latency_ms as u64);
        let (sender, receiver) = channel::bounded(max_batch);
        let counter = Arc::clone(&written);

        let worker = thread::Builder::new()
            .name(format!("river-writer-{}", name))
            .spawn(move || drain(writer, receiver, max_batch, period, counter))?;

        tracing::info!("Writing to River asynchronously with stream name {}", name);
        Ok(Self {
            mode: Mode::Async { sender, worker },
            written,
        })
    }

    /// Queue one record; blocks while the queue is full
    pub fn enqueue(&mut self, record: R) -> Result<()> {
        match &mut self.mode {
            Mode::Sync(writer) => {
                writer.write(&[record])?;
                self.written.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Mode::Async { sender, .. } => sender
                .send(record)
                .map_err(|_| RiverError::ConnectionLost("batch writer thread exited".into())),
        }
    }

    pub fn enqueue_all(&mut self, records: &[R]) -> Result<()> {
        for record in records {
            self.enqueue(*record)?;
        }
        Ok(())
    }

    /// Records the store has acknowledged so far
    pub fn total_samples_written(&self) -> u64 {
        self.written.load(Ordering::Relaxed)
    }

    /// Flush everything queued and hand the writer back
    ///
    /// If the background thread failed, its error is returned here.
    pub fn finish(self) -> Result<StreamWriter<R>> {
        match self.mode {
            Mode::Sync(writer) => Ok(writer),
            Mode::Async { sender, worker } => {
                drop(sender);
                worker
                    .join()
                    .map_err(|_| RiverError::Server("batch writer thread panicked".into()))?
            }
        }
    }
}

/// Background loop: gather up to `max_batch` records per `period`, then append
fn drain<R: Record>(
    mut writer: StreamWriter<R>,
    receiver: Receiver<R>,
    max_batch: usize,
    period: Duration,
    written: Arc<AtomicU64>,
) -> Result<StreamWriter<R>> {
    let mut batch = Vec::with_capacity(max_batch);
    loop {
        let tick = Instant::now() + period;
        let mut disconnected = false;

        while batch.len() < max_batch {
            match receiver.recv_deadline(tick) {
                Ok(record) => batch.push(record),
                Err(RecvTimeoutError::Timeout) => break,
                Err(RecvTimeoutError::Disconnected) => {
                    disconnected = true;
                    break;
                }
            }
        }

        if !batch.is_empty() {
            if let Err(e) = writer.write(&batch) {
                tracing::warn!("Batch of {} records failed: {}", batch.len(), e);
                return Err(e);
            }
            written.fetch_add(batch.len() as u64, Ordering::Relaxed);
            tracing::trace!("Flushed batch of {} records", batch.len());
            batch.clear();
        }

        if disconnected {
            return Ok(writer);
        }
    }
}
