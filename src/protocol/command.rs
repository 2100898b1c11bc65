//! Command definitions
//!
//! Requests a client can send to the store.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::schema::StreamSchema;

/// Command types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CommandType {
    Ping = 0x01,
    CreateStream = 0x02,
    WaitReady = 0x03,
    Append = 0x04,
    Fetch = 0x05,
    EndStream = 0x06,
    DeleteStream = 0x07,
    ListStreams = 0x08,
}

impl CommandType {
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x01 => Some(CommandType::Ping),
            0x02 => Some(CommandType::CreateStream),
            0x03 => Some(CommandType::WaitReady),
            0x04 => Some(CommandType::Append),
            0x05 => Some(CommandType::Fetch),
            0x06 => Some(CommandType::EndStream),
            0x07 => Some(CommandType::DeleteStream),
            0x08 => Some(CommandType::ListStreams),
            _ => None,
        }
    }
}

/// A parsed command
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Command {
    /// Health check
    Ping,

    /// Create a stream. With a schema the stream is ready at once; without
    /// one it is registered as a pending placeholder.
    CreateStream {
        name: String,
        schema: Option<StreamSchema>,
        metadata: BTreeMap<String, String>,
    },

    /// Block until the stream is ready or `wait_ms` elapses
    WaitReady { name: String, wait_ms: u64 },

    /// Append `sample_count` packed samples
    Append {
        name: String,
        sample_count: u64,
        data: Vec<u8>,
    },

    /// Fetch up to `max_samples` samples starting at `cursor`, blocking up to
    /// `wait_ms` for at least one to arrive
    Fetch {
        name: String,
        cursor: u64,
        max_samples: u64,
        wait_ms: u64,
    },

    /// Mark the stream ended; no more appends are accepted
    EndStream { name: String },

    /// Remove the stream
    DeleteStream { name: String },

    /// Describe every stream
    ListStreams,
}

impl Command {
    /// Get the command type
    pub fn command_type(&self) -> CommandType {
        match self {
            Command::Ping => CommandType::Ping,
            Command::CreateStream { .. } => CommandType::CreateStream,
            Command::WaitReady { .. } => CommandType::WaitReady,
            Command::Append { .. } => CommandType::Append,
            Command::Fetch { .. } => CommandType::Fetch,
            Command::EndStream { .. } => CommandType::EndStream,
            Command::DeleteStream { .. } => CommandType::DeleteStream,
            Command::ListStreams => CommandType::ListStreams,
        }
    }

    /// How long the store may legitimately hold this request before replying
    pub fn wait_ms(&self) -> u64 {
        match self {
            Command::WaitReady { wait_ms, .. } | Command::Fetch { wait_ms, .. } => *wait_ms,
            _ => 0,
        }
    }
}
