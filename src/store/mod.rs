//! Store Module
//!
//! In-memory backing store for record streams.
//!
//! ## Responsibilities
//! - Create streams, either ready (with a schema) or as pending placeholders
//! - Append packed samples in arrival order
//! - Serve batches from a cursor, blocking until data, end, or deadline
//! - Track end-of-stream
//!
//! ## Stream lifecycle
//! ```text
//!   absent ──create(no schema)──▶ pending ──create(schema)──▶ ready ──end──▶ ready+ended
//!      └──────────────create(schema)────────────────────────────▲
//! ```
//!
//! ## Locking
//! `StreamRegistry` guards the name → log map; each `StreamLog` guards its
//! own samples. Lock order is always registry first, then log.

mod stream_log;
mod registry;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::schema::StreamSchema;

pub use stream_log::{FetchBatch, StreamLog};
pub use registry::StreamRegistry;

/// Existence state of a stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StreamState {
    Absent,
    Pending,
    Ready,
}

/// Snapshot of a stream's state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamInfo {
    pub name: String,
    pub state: StreamState,
    pub schema: Option<StreamSchema>,
    pub metadata: BTreeMap<String, String>,
    /// Number of samples appended so far
    pub length: u64,
    pub ended: bool,
}

impl StreamInfo {
    /// Info for a stream the store has never seen
    pub fn absent(name: &str) -> Self {
        Self {
            name: name.to_string(),
            state: StreamState::Absent,
            schema: None,
            metadata: BTreeMap::new(),
            length: 0,
            ended: false,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.state == StreamState::Ready
    }
}
