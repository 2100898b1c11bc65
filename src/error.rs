//! Error types for River
//!
//! Provides a unified error type for client and store operations.
//!
//! End-of-stream is not an error: it is reported as
//! [`ReadResult::EndOfStream`](crate::client::ReadResult). An empty read is
//! likewise a normal value the caller loops on.

use thiserror::Error;

/// Result type alias using RiverError
pub type Result<T> = std::result::Result<T, RiverError>;

/// Unified error type for River operations
#[derive(Debug, Error)]
pub enum RiverError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Connection Errors
    // -------------------------------------------------------------------------
    /// The session could not be established.
    #[error("Failed to connect to {addr}: {reason}")]
    Connect { addr: String, reason: String },

    /// The session died mid-operation. The connection and every reader or
    /// writer bound through it must be re-opened.
    #[error("Connection lost: {0}")]
    ConnectionLost(String),

    /// The connection was closed by its owner.
    #[error("Connection already closed")]
    Closed,

    // -------------------------------------------------------------------------
    // Stream Errors
    // -------------------------------------------------------------------------
    #[error("Stream '{name}' not ready after {elapsed_ms} ms")]
    StreamTimeout { name: String, elapsed_ms: u64 },

    #[error("Stream not found: {0}")]
    StreamNotFound(String),

    #[error("Stream already exists: {0}")]
    StreamExists(String),

    #[error("Stream has ended: {0}")]
    StreamEnded(String),

    #[error("Not initialized: call initialize() before {0}")]
    NotInitialized(&'static str),

    // -------------------------------------------------------------------------
    // Schema Errors
    // -------------------------------------------------------------------------
    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Schema mismatch on stream '{stream}': expected {expected}, got {got}")]
    SchemaMismatch {
        stream: String,
        expected: String,
        got: String,
    },

    // -------------------------------------------------------------------------
    // Argument Errors
    // -------------------------------------------------------------------------
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    // -------------------------------------------------------------------------
    // Serialization / Protocol Errors
    // -------------------------------------------------------------------------
    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    /// An error message returned by the store for a well-formed request.
    #[error("Server error: {0}")]
    Server(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl RiverError {
    /// Whether the connection that produced this error is unusable.
    ///
    /// Fatal errors require re-opening the connection and re-initializing
    /// any reader or writer bound through it.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            RiverError::ConnectionLost(_) | RiverError::Closed | RiverError::Connect { .. }
        )
    }
}

impl From<bincode::Error> for RiverError {
    fn from(err: bincode::Error) -> Self {
        RiverError::Serialization(err.to_string())
    }
}

impl From<serde_json::Error> for RiverError {
    fn from(err: serde_json::Error) -> Self {
        RiverError::Schema(err.to_string())
    }
}
