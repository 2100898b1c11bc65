//! Protocol codec
//!
//! Encoding and decoding functions for the wire protocol.
//!
//! ## Wire Format
//! ```text
//! ┌──────────┬──────────┬──────────┬─────────────────────────┐
//! │ Type (1) │ Len (4)  │ CRC (4)  │         Payload         │
//! └──────────┴──────────┴──────────┴─────────────────────────┘
//! ```
//!
//! - Requests: type is the [`CommandType`], payload is the bincode command.
//! - Responses: type is the [`Status`], payload is a bincode [`Reply`] for
//!   OK and a UTF-8 message for failures.
//!
//! [`Reply`]: super::Reply

use std::io::{Read, Write};

use crate::error::{Result, RiverError};
use super::{Command, CommandType, Response, Status};

/// Header size: 1 byte type/status + 4 bytes length + 4 bytes CRC
pub const HEADER_SIZE: usize = 9;

/// Maximum payload size (16 MB)
pub const MAX_PAYLOAD_SIZE: u32 = 16 * 1024 * 1024;

/// Largest sample data a FETCH reply may carry, leaving room for the
/// bincode `Reply::Batch` envelope inside one frame
pub const MAX_BATCH_BYTES: usize = MAX_PAYLOAD_SIZE as usize - 4096;

// =============================================================================
// Framing
// =============================================================================

fn encode_frame(kind: u8, payload: &[u8]) -> Vec<u8> {
    let mut message = Vec::with_capacity(HEADER_SIZE + payload.len());
    message.push(kind);
    message.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    message.extend_from_slice(&crc32fast::hash(payload).to_be_bytes());
    message.extend_from_slice(payload);
    message
}

/// Parsed frame header
struct FrameHeader {
    kind: u8,
    payload_len: usize,
    crc: u32,
}

fn parse_header(header: &[u8]) -> Result<FrameHeader> {
    let payload_len = u32::from_be_bytes([header[1], header[2], header[3], header[4]]);

    if payload_len > MAX_PAYLOAD_SIZE {
        return Err(RiverError::Protocol(format!(
            "Payload too large: {} bytes (max {})",
            payload_len, MAX_PAYLOAD_SIZE
        )));
    }

    Ok(FrameHeader {
        kind: header[0],
        payload_len: payload_len as usize,
        crc: u32::from_be_bytes([header[5], header[6], header[7], header[8]]),
    })
}

/// Split a complete frame into (header, payload) after checking length and CRC
fn split_frame(bytes: &[u8]) -> Result<(FrameHeader, &[u8])> {
    if bytes.len() < HEADER_SIZE {
        return Err(RiverError::Protocol(format!(
            "Incomplete header: expected {} bytes, got {}",
            HEADER_SIZE,
            bytes.len()
        )));
    }

    let header = parse_header(&bytes[..HEADER_SIZE])?;
    let total_len = HEADER_SIZE + header.payload_len;
    if bytes.len() < total_len {
        return Err(RiverError::Protocol(format!(
            "Incomplete payload: expected {} bytes, got {}",
            total_len,
            bytes.len()
        )));
    }

    let payload = &bytes[HEADER_SIZE..total_len];
    verify_crc(&header, payload)?;
    Ok((header, payload))
}

fn verify_crc(header: &FrameHeader, payload: &[u8]) -> Result<()> {
    let actual = crc32fast::hash(payload);
    if actual != header.crc {
        return Err(RiverError::Protocol(format!(
            "Checksum mismatch: expected {:08x}, got {:08x}",
            header.crc, actual
        )));
    }
    Ok(())
}

/// Read one frame's header and payload from a stream
fn read_frame<R: Read>(reader: &mut R) -> Result<(FrameHeader, Vec<u8>)> {
    let mut raw = [0u8; HEADER_SIZE];
    reader.read_exact(&mut raw)?;
    let header = parse_header(&raw)?;

    let mut payload = vec![0u8; header.payload_len];
    if header.payload_len > 0 {
        reader.read_exact(&mut payload)?;
    }

    verify_crc(&header, &payload)?;
    Ok((header, payload))
}

// =============================================================================
// Command Encoding/Decoding
// =============================================================================

/// Encode a command to bytes
pub fn encode_command(command: &Command) -> Result<Vec<u8>> {
    let payload = bincode::serialize(command)?;
    if payload.len() > MAX_PAYLOAD_SIZE as usize {
        return Err(RiverError::InvalidArgument(format!(
            "command payload of {} bytes exceeds {} bytes",
            payload.len(),
            MAX_PAYLOAD_SIZE
        )));
    }
    Ok(encode_frame(command.command_type() as u8, &payload))
}

fn command_from_payload(kind: u8, payload: &[u8]) -> Result<Command> {
    let expected = CommandType::from_byte(kind).ok_or_else(|| {
        RiverError::Protocol(format!("Unknown command type: 0x{:02x}", kind))
    })?;

    let command: Command = bincode::deserialize(payload)?;
    if command.command_type() != expected {
        return Err(RiverError::Protocol(format!(
            "Command type mismatch: header says {:?}, payload is {:?}",
            expected,
            command.command_type()
        )));
    }
    Ok(command)
}

/// Decode a command from a complete frame
pub fn decode_command(bytes: &[u8]) -> Result<Command> {
    let (header, payload) = split_frame(bytes)?;
    command_from_payload(header.kind, payload)
}

// =============================================================================
// Response Encoding/Decoding
// =============================================================================

/// Encode a response to bytes
pub fn encode_response(response: &Response) -> Vec<u8> {
    let payload = response.payload.as_deref().unwrap_or(&[]);
    encode_frame(response.status as u8, payload)
}

fn response_from_payload(kind: u8, payload: Vec<u8>) -> Result<Response> {
    let status = Status::from_byte(kind).ok_or_else(|| {
        RiverError::Protocol(format!("Unknown response status: 0x{:02x}", kind))
    })?;

    let payload = if payload.is_empty() { None } else { Some(payload) };
    Ok(Response { status, payload })
}

/// Decode a response from a complete frame
pub fn decode_response(bytes: &[u8]) -> Result<Response> {
    let (header, payload) = split_frame(bytes)?;
    response_from_payload(header.kind, payload.to_vec())
}

// =============================================================================
// Stream-based I/O helpers
// =============================================================================

/// Read a complete command from a stream
///
/// Blocks until a complete command is received or an error occurs
pub fn read_command<R: Read>(reader: &mut R) -> Result<Command> {
    let (header, payload) = read_frame(reader)?;
    command_from_payload(header.kind, &payload)
}

/// Write a command to a stream
pub fn write_command<W: Write>(writer: &mut W, command: &Command) -> Result<()> {
    let bytes = encode_command(command)?;
    writer.write_all(&bytes)?;
    writer.flush()?;
    Ok(())
}

/// Read a complete response from a stream
pub fn read_response<R: Read>(reader: &mut R) -> Result<Response> {
    let (header, payload) = read_frame(reader)?;
    response_from_payload(header.kind, payload)
}

/// Write a response to a stream
pub fn write_response<W: Write>(writer: &mut W, response: &Response) -> Result<()> {
    let bytes = encode_response(response);
    writer.write_all(&bytes)?;
    writer.flush()?;
    Ok(())
}
