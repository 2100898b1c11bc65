//! Writer Tests
//!
//! End-to-end tests for stream creation, appends, and batching.

mod common;

use std::collections::BTreeMap;

use common::{connect, eventually, start_server};
use river::store::StreamState;
use river::{
    BatchConfig, BatchWriter, ConnectionState, EventRecord, FieldType, ReadResult, RiverError,
    SpikeRecord, StreamReader, StreamSchema, StreamWriter,
};

fn drain_all(server: &river::network::ServerHandle, name: &str) -> Vec<SpikeRecord> {
    let mut reader = StreamReader::<SpikeRecord>::new(connect(server));
    reader.initialize(name, 1000).unwrap();
    let mut buffer = reader.new_buffer(64);
    let mut seen = Vec::new();
    loop {
        match reader.read(&mut buffer, 1000).unwrap() {
            ReadResult::Filled(count) => seen.extend_from_slice(buffer.filled(count)),
            ReadResult::Empty => panic!("Stream '{}' was never ended", name),
            ReadResult::EndOfStream => return seen,
        }
    }
}

// =============================================================================
// StreamWriter Tests
// =============================================================================

#[test]
fn test_write_before_initialize() {
    let server = start_server();
    let mut writer = StreamWriter::<SpikeRecord>::new(connect(&server));

    assert!(matches!(
        writer.write(&[SpikeRecord::default()]),
        Err(RiverError::NotInitialized(_))
    ));
}

#[test]
fn test_initialize_twice_fails() {
    let server = start_server();
    let mut writer = StreamWriter::<SpikeRecord>::new(connect(&server));
    writer.initialize("spikes", BTreeMap::new()).unwrap();

    assert!(matches!(
        writer.initialize("other", BTreeMap::new()),
        Err(RiverError::InvalidArgument(_))
    ));
}

#[test]
fn test_duplicate_stream_rejected() {
    let server = start_server();
    let mut first = StreamWriter::<SpikeRecord>::new(connect(&server));
    first.initialize("spikes", BTreeMap::new()).unwrap();

    let mut second = StreamWriter::<SpikeRecord>::new(connect(&server));
    assert!(matches!(
        second.initialize("spikes", BTreeMap::new()),
        Err(RiverError::StreamExists(name)) if name == "spikes"
    ));
}

#[test]
fn test_write_after_stop() {
    let server = start_server();
    let mut writer = StreamWriter::<SpikeRecord>::new(connect(&server));
    writer.initialize("spikes", BTreeMap::new()).unwrap();
    writer.stop().unwrap();
    writer.stop().unwrap();

    assert!(writer.is_stopped());
    assert!(matches!(
        writer.write(&[SpikeRecord::default()]),
        Err(RiverError::StreamEnded(_))
    ));
}

#[test]
fn test_write_bytes_checks_length() {
    let server = start_server();
    let mut writer = StreamWriter::<SpikeRecord>::new(connect(&server));
    writer.initialize("raw", BTreeMap::new()).unwrap();

    assert!(matches!(
        writer.write_bytes(&[0u8; 15], 1),
        Err(RiverError::InvalidArgument(_))
    ));

    assert!(matches!(
        writer.write_bytes(&[], usize::MAX),
        Err(RiverError::InvalidArgument(_))
    ));

    let packed = river::record::encode_records(&[SpikeRecord::new(9, 9, 9)]);
    writer.write_bytes(&packed, 1).unwrap();
    writer.stop().unwrap();

    assert_eq!(drain_all(&server, "raw"), vec![SpikeRecord::new(9, 9, 9)]);
}

#[test]
fn test_event_stream_round_trip() {
    let server = start_server();
    let mut writer = StreamWriter::<EventRecord>::new(connect(&server));
    writer.initialize("ttl", BTreeMap::new()).unwrap();
    writer
        .write(&[EventRecord::ttl(0, 3, true, 10), EventRecord::ttl(0, 3, false, 20)])
        .unwrap();
    writer.stop().unwrap();

    let mut reader = StreamReader::<EventRecord>::new(connect(&server));
    reader.initialize("ttl", 1000).unwrap();
    let mut buffer = reader.new_buffer(4);

    assert_eq!(reader.read(&mut buffer, 1000).unwrap(), ReadResult::Filled(2));
    assert_eq!(buffer[0].state, 4);
    assert_eq!(buffer[1].state, -4);
    assert_eq!(buffer[1].line(), 3);
    assert!(!buffer[1].is_rising());
}

#[test]
fn test_writer_scope_ends_stream_and_closes() {
    let server = start_server();
    let connection = connect(&server);
    let mut writer = StreamWriter::<SpikeRecord>::new(connection.clone());
    {
        let mut scope = writer.scope().unwrap();
        scope.initialize("scoped", BTreeMap::new()).unwrap();
        scope.write(&[SpikeRecord::new(1, 2, 3)]).unwrap();
    }

    assert_eq!(connection.state(), ConnectionState::Closed);
    assert_eq!(drain_all(&server, "scoped"), vec![SpikeRecord::new(1, 2, 3)]);
}

// =============================================================================
// Administration Tests
// =============================================================================

#[test]
fn test_stream_info_and_listing() {
    let server = start_server();
    let admin = connect(&server);
    assert_eq!(admin.stream_info("b").unwrap().state, StreamState::Absent);

    for name in ["b", "a"] {
        let mut writer = StreamWriter::<SpikeRecord>::new(connect(&server));
        writer.initialize(name, BTreeMap::new()).unwrap();
        writer.write(&[SpikeRecord::default(); 3]).unwrap();
    }
    admin.end_stream("a").unwrap();

    let streams = admin.list_streams().unwrap();
    let names: Vec<&str> = streams.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["a", "b"]);
    assert!(streams[0].ended);
    assert!(!streams[1].ended);
    assert_eq!(streams[1].length, 3);
    assert_eq!(streams[1].schema, Some(<SpikeRecord as river::Record>::schema()));

    admin.delete_stream("a").unwrap();
    assert!(matches!(
        admin.delete_stream("a"),
        Err(RiverError::StreamNotFound(_))
    ));
    assert_eq!(admin.list_streams().unwrap().len(), 1);
}

#[test]
fn test_create_stream_from_json_schema() {
    let server = start_server();
    let admin = connect(&server);
    let json = r#"{"field_definitions":[
        {"name":"sample_number","type":"INT64","size":8},
        {"name":"voltage","type":"DOUBLE","size":8}
    ]}"#;
    let schema = StreamSchema::from_json(json).unwrap();

    let mut metadata = BTreeMap::new();
    metadata.insert("units".to_string(), "uV".to_string());
    let info = admin.create_stream("lfp", schema.clone(), metadata).unwrap();
    assert!(info.is_ready());

    let info = admin.stream_info("lfp").unwrap();
    let stored = info.schema.unwrap();
    assert_eq!(stored, schema);
    assert_eq!(stored.sample_size(), 16);
    assert_eq!(stored.field_definitions[1].field_type, FieldType::Double);
    assert_eq!(StreamSchema::from_json(&stored.to_json().unwrap()).unwrap(), schema);

    // A spike reader cannot bind to a differently shaped stream
    let mut reader = StreamReader::<SpikeRecord>::new(connect(&server));
    assert!(matches!(
        reader.initialize("lfp", 0),
        Err(RiverError::SchemaMismatch { .. })
    ));
}

#[test]
fn test_store_rejects_invalid_schema() {
    let server = start_server();
    let admin = connect(&server);
    let empty = StreamSchema {
        field_definitions: vec![],
    };

    assert!(matches!(
        admin.create_stream("empty", empty, BTreeMap::new()),
        Err(RiverError::InvalidArgument(_))
    ));
    assert_eq!(admin.stream_info("empty").unwrap().state, StreamState::Absent);
    // The session survives the rejected request
    admin.ping().unwrap();
}

// =============================================================================
// BatchWriter Tests
// =============================================================================

#[test]
fn test_batch_writer_requires_initialized_writer() {
    let server = start_server();
    let writer = StreamWriter::<SpikeRecord>::new(connect(&server));

    assert!(matches!(
        BatchWriter::new(writer, BatchConfig::default()),
        Err(RiverError::NotInitialized(_))
    ));
}

#[test]
fn test_batch_writer_sync_mode() {
    let server = start_server();
    let mut writer = StreamWriter::<SpikeRecord>::new(connect(&server));
    writer.initialize("sync", BTreeMap::new()).unwrap();

    let mut batch = BatchWriter::new(writer, BatchConfig::new(0, 0)).unwrap();
    batch.enqueue(SpikeRecord::new(1, 0, 1)).unwrap();
    assert_eq!(batch.total_samples_written(), 1);

    let mut writer = batch.finish().unwrap();
    writer.stop().unwrap();
    assert_eq!(drain_all(&server, "sync").len(), 1);
}

#[test]
fn test_batch_writer_async_preserves_order() {
    let server = start_server();
    let mut writer = StreamWriter::<SpikeRecord>::new(connect(&server));
    writer.initialize("async", BTreeMap::new()).unwrap();

    let spikes: Vec<SpikeRecord> = (0..1000).map(|i| SpikeRecord::new(i % 8, 0, i as i64)).collect();
    let mut batch = BatchWriter::new(writer, BatchConfig::new(64, 2)).unwrap();
    batch.enqueue_all(&spikes).unwrap();
    assert!(eventually(|| batch.total_samples_written() == 1000));

    let mut writer = batch.finish().unwrap();
    assert_eq!(writer.total_samples_written(), 1000);
    writer.stop().unwrap();

    assert_eq!(drain_all(&server, "async"), spikes);
}

#[test]
fn test_batch_writer_surfaces_background_failure() {
    let server = start_server();
    let connection = connect(&server);
    let mut writer = StreamWriter::<SpikeRecord>::new(connection.clone());
    writer.initialize("failing", BTreeMap::new()).unwrap();

    let mut batch = BatchWriter::new(writer, BatchConfig::new(16, 1)).unwrap();
    connection.close().unwrap();
    let _ = batch.enqueue(SpikeRecord::default());

    assert!(matches!(batch.finish(), Err(RiverError::Closed)));
}
