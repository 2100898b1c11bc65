//! Response definitions
//!
//! Represents responses to clients.

use serde::{Deserialize, Serialize};

use crate::error::{Result, RiverError};
use crate::store::StreamInfo;

/// Response status codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Status {
    Ok = 0x00,
    NotFound = 0x01,
    Error = 0x02,
    Exists = 0x03,
    Ended = 0x04,
    Invalid = 0x05,
}

impl Status {
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x00 => Some(Status::Ok),
            0x01 => Some(Status::NotFound),
            0x02 => Some(Status::Error),
            0x03 => Some(Status::Exists),
            0x04 => Some(Status::Ended),
            0x05 => Some(Status::Invalid),
            _ => None,
        }
    }
}

/// Successful result of a command
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Reply {
    Pong,

    /// Command applied, nothing to return
    Ack,

    /// State of one stream (CREATE_STREAM, WAIT_READY)
    Stream(StreamInfo),

    /// Stream length after an APPEND
    Appended { length: u64 },

    /// Samples returned by FETCH. `ended` is set once the stream is ended and
    /// `next_cursor` has reached its tail.
    Batch {
        data: Vec<u8>,
        count: u64,
        next_cursor: u64,
        ended: bool,
    },

    Streams(Vec<StreamInfo>),
}

/// A response to send to client
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    /// Status code
    pub status: Status,

    /// Optional payload (encoded Reply for OK, message otherwise)
    pub payload: Option<Vec<u8>>,
}

impl Response {
    /// Create an OK response carrying an encoded reply
    pub fn ok(reply: &Reply) -> Result<Self> {
        Ok(Self {
            status: Status::Ok,
            payload: Some(bincode::serialize(reply)?),
        })
    }

    /// Create a failure response with a message payload
    pub fn failure(status: Status, message: &str) -> Self {
        Self {
            status,
            payload: Some(message.as_bytes().to_vec()),
        }
    }

    /// Create a NOT_FOUND response naming the stream
    pub fn not_found(stream: &str) -> Self {
        Self::failure(Status::NotFound, stream)
    }

    /// Create an ERROR response
    pub fn error(message: &str) -> Self {
        Self::failure(Status::Error, message)
    }

    /// Map a store error onto the status that lets the client rebuild it
    pub fn from_error(err: &RiverError) -> Self {
        match err {
            RiverError::StreamNotFound(name) => Self::not_found(name),
            RiverError::StreamExists(name) => Self::failure(Status::Exists, name),
            RiverError::StreamEnded(name) => Self::failure(Status::Ended, name),
            RiverError::InvalidArgument(msg) => Self::failure(Status::Invalid, msg),
            RiverError::Schema(msg) => Self::failure(Status::Invalid, msg),
            other => Self::error(&other.to_string()),
        }
    }

    /// Turn a response back into a reply, mapping failure statuses to errors
    pub fn into_reply(self) -> Result<Reply> {
        match self.status {
            Status::Ok => {
                let payload = self
                    .payload
                    .ok_or_else(|| RiverError::Protocol("OK response without reply".into()))?;
                Ok(bincode::deserialize(&payload)?)
            }
            Status::NotFound => Err(RiverError::StreamNotFound(self.message())),
            Status::Exists => Err(RiverError::StreamExists(self.message())),
            Status::Ended => Err(RiverError::StreamEnded(self.message())),
            Status::Invalid => Err(RiverError::InvalidArgument(self.message())),
            Status::Error => Err(RiverError::Server(self.message())),
        }
    }

    fn message(&self) -> String {
        self.payload
            .as_deref()
            .map(|p| String::from_utf8_lossy(p).into_owned())
            .unwrap_or_default()
    }
}
