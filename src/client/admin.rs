//! Stream administration
//!
//! Inspection and lifecycle commands that do not need a bound reader or
//! writer.

use std::collections::BTreeMap;

use crate::error::Result;
use crate::protocol::{Command, Reply};
use crate::schema::StreamSchema;
use crate::store::StreamInfo;

use super::connection::{unexpected_reply, Connection};

impl Connection {
    /// Current state of `name`; `Absent` if the store has never seen it
    pub fn stream_info(&self, name: &str) -> Result<StreamInfo> {
        match self.request(&Command::WaitReady {
            name: name.to_string(),
            wait_ms: 0,
        })? {
            Reply::Stream(info) => Ok(info),
            other => Err(unexpected_reply("WAIT_READY", &other)),
        }
    }

    /// Create a stream with an arbitrary schema, e.g. one loaded from JSON
    ///
    /// The store validates the schema; a pending placeholder is promoted.
    pub fn create_stream(
        &self,
        name: &str,
        schema: StreamSchema,
        metadata: BTreeMap<String, String>,
    ) -> Result<StreamInfo> {
        match self.request(&Command::CreateStream {
            name: name.to_string(),
            schema: Some(schema),
            metadata,
        })? {
            Reply::Stream(info) => Ok(info),
            other => Err(unexpected_reply("CREATE_STREAM", &other)),
        }
    }

    /// Every stream in the store, sorted by name
    pub fn list_streams(&self) -> Result<Vec<StreamInfo>> {
        match self.request(&Command::ListStreams)? {
            Reply::Streams(infos) => Ok(infos),
            other => Err(unexpected_reply("LIST_STREAMS", &other)),
        }
    }

    /// Mark `name` ended on behalf of its producer
    pub fn end_stream(&self, name: &str) -> Result<()> {
        match self.request(&Command::EndStream {
            name: name.to_string(),
        })? {
            Reply::Ack => Ok(()),
            other => Err(unexpected_reply("END_STREAM", &other)),
        }
    }

    pub fn delete_stream(&self, name: &str) -> Result<()> {
        match self.request(&Command::DeleteStream {
            name: name.to_string(),
        })? {
            Reply::Ack => Ok(()),
            other => Err(unexpected_reply("DELETE_STREAM", &other)),
        }
    }
}
