//! Protocol Module
//!
//! Defines the wire protocol between stream clients and the store.
//!
//! ## Frame Format
//! ```text
//! ┌──────────┬──────────┬──────────┬─────────────────────────┐
//! │ Type (1) │ Len (4)  │ CRC (4)  │   Payload (bincode)     │
//! └──────────┴──────────┴──────────┴─────────────────────────┘
//! ```
//!
//! Requests carry a command type; responses carry a status byte in the same
//! position. Length and CRC32 are big-endian and cover the payload only.
//!
//! ### Commands
//! - 0x01: PING
//! - 0x02: CREATE_STREAM - name, optional schema, metadata
//! - 0x03: WAIT_READY    - name, wait_ms
//! - 0x04: APPEND        - name, sample count, packed samples
//! - 0x05: FETCH         - name, cursor, max samples, wait_ms
//! - 0x06: END_STREAM    - name
//! - 0x07: DELETE_STREAM - name
//! - 0x08: LIST_STREAMS
//!
//! ### Status Codes
//! - 0x00: OK        - payload is a bincode [`Reply`]
//! - 0x01: NOT_FOUND - payload is a UTF-8 message
//! - 0x02: ERROR     - payload is a UTF-8 message
//! - 0x03: EXISTS    - stream already exists; payload is its name
//! - 0x04: ENDED     - stream has ended; payload is its name
//! - 0x05: INVALID   - malformed request; payload is a message

mod command;
mod response;
mod codec;

pub use command::{Command, CommandType};
pub use response::{Reply, Response, Status};
pub use codec::{
    decode_command, decode_response, encode_command, encode_response, read_command,
    read_response, write_command, write_response, HEADER_SIZE, MAX_BATCH_BYTES,
    MAX_PAYLOAD_SIZE,
};
