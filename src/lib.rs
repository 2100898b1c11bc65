//! # River
//!
//! Blocking, buffer-oriented streaming of fixed-schema records:
//! - Named, append-only streams held by a TCP stream store
//! - Readers that fill caller-owned buffers within a per-call timeout
//! - Explicit three-way read outcome: filled, empty, or end-of-stream
//! - Scoped connection lifetime with guaranteed release
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────────────────┐        ┌──────────────────────────┐
//! │  StreamWriter / Batch    │        │      StreamReader        │
//! │  (append, end)           │        │  (initialize, read)      │
//! └────────────┬─────────────┘        └────────────┬─────────────┘
//!              │          Connection (TCP)          │
//!              └──────────────────┬─────────────────┘
//!                                 │  framed protocol
//! ┌───────────────────────────────▼─────────────────────────────┐
//! │                 Server → Session → Engine                   │
//! └───────────────────────────────┬─────────────────────────────┘
//!                                 │
//!                      ┌──────────▼──────────┐
//!                      │   StreamRegistry    │
//!                      │  StreamLog per name │
//!                      └─────────────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod schema;
pub mod record;
pub mod protocol;
pub mod store;
pub mod engine;
pub mod network;
pub mod client;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{Result, RiverError};
pub use config::{BatchConfig, ClientConfig, ResolvePolicy, ServerConfig};
pub use client::{
    BatchWriter, Connection, ConnectionState, ReadResult, StreamReader, StreamWriter,
};
pub use engine::Engine;
pub use record::{EventRecord, Record, RecordBuffer, SpikeRecord};
pub use schema::{FieldDefinition, FieldType, StreamSchema};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of River
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
