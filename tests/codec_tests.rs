//! Codec Tests
//!
//! Tests for command and response framing.

use std::collections::BTreeMap;
use std::io::Cursor;

use river::protocol::{
    decode_command, decode_response, encode_command, encode_response, read_command,
    read_response, write_command, write_response, Command, Reply, Response, Status,
    HEADER_SIZE,
};
use river::record::{encode_records, SpikeRecord};
use river::{RiverError, Record};

// =============================================================================
// Command Encoding/Decoding Tests
// =============================================================================

#[test]
fn test_encode_decode_fetch() {
    let cmd = Command::Fetch {
        name: "Red-769".to_string(),
        cursor: 12,
        max_samples: 256,
        wait_ms: 1000,
    };
    let encoded = encode_command(&cmd).unwrap();
    let decoded = decode_command(&encoded).unwrap();

    assert_eq!(decoded, cmd);
    assert_eq!(decoded.wait_ms(), 1000);
}

#[test]
fn test_encode_decode_create_with_schema() {
    let mut metadata = BTreeMap::new();
    metadata.insert("sample_rate".to_string(), "30000".to_string());
    let cmd = Command::CreateStream {
        name: "spikes".to_string(),
        schema: Some(SpikeRecord::schema()),
        metadata,
    };
    let decoded = decode_command(&encode_command(&cmd).unwrap()).unwrap();

    match decoded {
        Command::CreateStream {
            name,
            schema,
            metadata,
        } => {
            assert_eq!(name, "spikes");
            assert_eq!(schema, Some(SpikeRecord::schema()));
            assert_eq!(metadata.get("sample_rate").map(String::as_str), Some("30000"));
        }
        _ => panic!("Expected CREATE_STREAM command"),
    }
}

#[test]
fn test_encode_decode_append_payload() {
    let records = [SpikeRecord::new(7, 2, 12345), SpikeRecord::new(1, 0, 99)];
    let cmd = Command::Append {
        name: "spikes".to_string(),
        sample_count: 2,
        data: encode_records(&records),
    };
    let decoded = decode_command(&encode_command(&cmd).unwrap()).unwrap();

    match decoded {
        Command::Append {
            sample_count, data, ..
        } => {
            assert_eq!(sample_count, 2);
            assert_eq!(data.len(), 2 * SpikeRecord::SIZE);
        }
        _ => panic!("Expected APPEND command"),
    }
}

#[test]
fn test_frame_header_layout() {
    let encoded = encode_command(&Command::Ping).unwrap();

    assert_eq!(encoded[0], 0x01);
    let len = u32::from_be_bytes([encoded[1], encoded[2], encoded[3], encoded[4]]) as usize;
    assert_eq!(encoded.len(), HEADER_SIZE + len);
}

#[test]
fn test_decode_incomplete_header() {
    let result = decode_command(&[0x01, 0x00, 0x00]);
    assert!(matches!(result, Err(RiverError::Protocol(_))));
}

#[test]
fn test_decode_incomplete_payload() {
    let cmd = Command::EndStream {
        name: "spikes".to_string(),
    };
    let encoded = encode_command(&cmd).unwrap();

    let result = decode_command(&encoded[..encoded.len() - 1]);
    assert!(matches!(result, Err(RiverError::Protocol(_))));
}

#[test]
fn test_decode_detects_corrupt_payload() {
    let cmd = Command::DeleteStream {
        name: "spikes".to_string(),
    };
    let mut encoded = encode_command(&cmd).unwrap();
    let last = encoded.len() - 1;
    encoded[last] ^= 0xff;

    match decode_command(&encoded) {
        Err(RiverError::Protocol(msg)) => assert!(msg.contains("Checksum")),
        other => panic!("Expected checksum error, got {:?}", other),
    }
}

#[test]
fn test_decode_rejects_unknown_command_type() {
    let mut encoded = encode_command(&Command::Ping).unwrap();
    encoded[0] = 0x7f;

    assert!(matches!(decode_command(&encoded), Err(RiverError::Protocol(_))));
}

#[test]
fn test_decode_rejects_type_mismatch() {
    let mut encoded = encode_command(&Command::ListStreams).unwrap();
    encoded[0] = 0x01; // PING header on a LIST_STREAMS payload

    match decode_command(&encoded) {
        Err(RiverError::Protocol(msg)) => assert!(msg.contains("mismatch")),
        other => panic!("Expected type mismatch, got {:?}", other),
    }
}

#[test]
fn test_decode_rejects_oversized_length() {
    let mut encoded = encode_command(&Command::Ping).unwrap();
    encoded[1..5].copy_from_slice(&u32::MAX.to_be_bytes());

    assert!(matches!(decode_command(&encoded), Err(RiverError::Protocol(_))));
}

// =============================================================================
// Response Encoding/Decoding Tests
// =============================================================================

#[test]
fn test_encode_decode_batch_reply() {
    let reply = Reply::Batch {
        data: encode_records(&[SpikeRecord::new(7, 2, 12345)]),
        count: 1,
        next_cursor: 1,
        ended: true,
    };
    let response = Response::ok(&reply).unwrap();
    let decoded = decode_response(&encode_response(&response)).unwrap();

    assert_eq!(decoded.status, Status::Ok);
    assert_eq!(decoded.into_reply().unwrap(), reply);
}

#[test]
fn test_failure_statuses_map_back_to_errors() {
    let cases = [
        (RiverError::StreamNotFound("a".into()), Status::NotFound),
        (RiverError::StreamExists("a".into()), Status::Exists),
        (RiverError::StreamEnded("a".into()), Status::Ended),
        (RiverError::InvalidArgument("bad".into()), Status::Invalid),
        (RiverError::Schema("bad".into()), Status::Invalid),
        (RiverError::Protocol("bad".into()), Status::Error),
    ];

    for (err, status) in cases {
        let response = Response::from_error(&err);
        assert_eq!(response.status, status);

        let decoded = decode_response(&encode_response(&response)).unwrap();
        let rebuilt = decoded.into_reply().unwrap_err();
        match (&err, &rebuilt) {
            (RiverError::StreamNotFound(a), RiverError::StreamNotFound(b)) => assert_eq!(a, b),
            (RiverError::StreamExists(a), RiverError::StreamExists(b)) => assert_eq!(a, b),
            (RiverError::StreamEnded(a), RiverError::StreamEnded(b)) => assert_eq!(a, b),
            (RiverError::InvalidArgument(a), RiverError::InvalidArgument(b)) => assert_eq!(a, b),
            (RiverError::Schema(a), RiverError::InvalidArgument(b)) => assert_eq!(a, b),
            (RiverError::Protocol(_), RiverError::Server(msg)) => assert!(msg.contains("bad")),
            _ => panic!("{:?} came back as {:?}", err, rebuilt),
        }
    }
}

#[test]
fn test_decode_rejects_unknown_status() {
    let mut encoded = encode_response(&Response::error("boom"));
    encoded[0] = 0x42;

    assert!(matches!(decode_response(&encoded), Err(RiverError::Protocol(_))));
}

// =============================================================================
// Stream I/O Tests
// =============================================================================

#[test]
fn test_stream_commands_back_to_back() {
    let mut buffer = Vec::new();
    write_command(&mut buffer, &Command::Ping).unwrap();
    write_command(
        &mut buffer,
        &Command::WaitReady {
            name: "spikes".to_string(),
            wait_ms: 0,
        },
    )
    .unwrap();

    let mut cursor = Cursor::new(buffer);
    assert_eq!(read_command(&mut cursor).unwrap(), Command::Ping);
    assert!(matches!(
        read_command(&mut cursor).unwrap(),
        Command::WaitReady { wait_ms: 0, .. }
    ));
    assert!(read_command(&mut cursor).is_err());
}

#[test]
fn test_stream_response_round_trip() {
    let mut buffer = Vec::new();
    write_response(&mut buffer, &Response::ok(&Reply::Pong).unwrap()).unwrap();
    write_response(&mut buffer, &Response::not_found("missing")).unwrap();

    let mut cursor = Cursor::new(buffer);
    assert_eq!(read_response(&mut cursor).unwrap().into_reply().unwrap(), Reply::Pong);

    let failure = read_response(&mut cursor).unwrap();
    assert_eq!(failure.status, Status::NotFound);
    assert!(matches!(failure.into_reply(), Err(RiverError::StreamNotFound(name)) if name == "missing"));
}
