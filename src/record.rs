//! Records and record buffers
//!
//! A [`Record`] is a plain fixed-layout struct whose byte form matches its
//! [`StreamSchema`]: fields packed in declaration order, little-endian, no
//! padding. Readers decode straight into a caller-owned [`RecordBuffer`].

use crate::error::{Result, RiverError};
use crate::schema::{FieldDefinition, StreamSchema};

/// A single field value, as returned by dynamic field access
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldValue {
    Int32(i32),
    Int64(i64),
    Float(f32),
    Double(f64),
}

impl FieldValue {
    /// Integer view of the value, if it is an integer field
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            FieldValue::Int32(v) => Some(v as i64),
            FieldValue::Int64(v) => Some(v),
            _ => None,
        }
    }
}

/// A fixed-layout sample type
pub trait Record: Copy + Default + Send + 'static {
    /// Encoded size in bytes; equals `schema().sample_size()`
    const SIZE: usize;

    /// Field layout of this record type
    fn schema() -> StreamSchema;

    /// Write exactly `SIZE` bytes into `out`
    fn encode(&self, out: &mut [u8]);

    /// Read a record from exactly `SIZE` bytes
    fn decode(bytes: &[u8]) -> Self;

    /// Value of the field at `index` in schema order
    fn field_at(&self, index: usize) -> Option<FieldValue>;

    /// Value of the field called `name`
    fn field(&self, name: &str) -> Option<FieldValue> {
        Self::schema()
            .index_of(name)
            .and_then(|index| self.field_at(index))
    }
}

fn read_i32(bytes: &[u8], at: usize) -> i32 {
    let mut raw = [0u8; 4];
    raw.copy_from_slice(&bytes[at..at + 4]);
    i32::from_le_bytes(raw)
}

fn read_i64(bytes: &[u8], at: usize) -> i64 {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&bytes[at..at + 8]);
    i64::from_le_bytes(raw)
}

// =============================================================================
// Spike records
// =============================================================================

/// A sorted spike: which electrode, which unit, and when
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct SpikeRecord {
    pub channel_index: i32,
    pub unit_index: i32,
    pub sample_number: i64,
}

impl SpikeRecord {
    pub fn new(channel_index: i32, unit_index: i32, sample_number: i64) -> Self {
        Self {
            channel_index,
            unit_index,
            sample_number,
        }
    }
}

impl Record for SpikeRecord {
    const SIZE: usize = 16;

    fn schema() -> StreamSchema {
        StreamSchema {
            field_definitions: vec![
                FieldDefinition::int32("channel_index"),
                FieldDefinition::int32("unit_index"),
                FieldDefinition::int64("sample_number"),
            ],
        }
    }

    fn encode(&self, out: &mut [u8]) {
        out[0..4].copy_from_slice(&self.channel_index.to_le_bytes());
        out[4..8].copy_from_slice(&self.unit_index.to_le_bytes());
        out[8..16].copy_from_slice(&self.sample_number.to_le_bytes());
    }

    fn decode(bytes: &[u8]) -> Self {
        Self {
            channel_index: read_i32(bytes, 0),
            unit_index: read_i32(bytes, 4),
            sample_number: read_i64(bytes, 8),
        }
    }

    fn field_at(&self, index: usize) -> Option<FieldValue> {
        match index {
            0 => Some(FieldValue::Int32(self.channel_index)),
            1 => Some(FieldValue::Int32(self.unit_index)),
            2 => Some(FieldValue::Int64(self.sample_number)),
            _ => None,
        }
    }
}

// =============================================================================
// TTL event records
// =============================================================================

/// A TTL transition. `state` is `(line + 1)` signed by the edge direction:
/// positive for rising, negative for falling.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct EventRecord {
    pub channel_index: i32,
    pub state: i32,
    pub sample_number: i64,
}

impl EventRecord {
    pub fn ttl(channel_index: i32, line: i32, rising: bool, sample_number: i64) -> Self {
        let sign = if rising { 1 } else { -1 };
        Self {
            channel_index,
            state: (line + 1) * sign,
            sample_number,
        }
    }

    /// Zero-based TTL line
    pub fn line(&self) -> i32 {
        self.state.abs() - 1
    }

    pub fn is_rising(&self) -> bool {
        self.state > 0
    }
}

impl Record for EventRecord {
    const SIZE: usize = 16;

    fn schema() -> StreamSchema {
        StreamSchema {
            field_definitions: vec![
                FieldDefinition::int32("channel_index"),
                FieldDefinition::int32("state"),
                FieldDefinition::int64("sample_number"),
            ],
        }
    }

    fn encode(&self, out: &mut [u8]) {
        out[0..4].copy_from_slice(&self.channel_index.to_le_bytes());
        out[4..8].copy_from_slice(&self.state.to_le_bytes());
        out[8..16].copy_from_slice(&self.sample_number.to_le_bytes());
    }

    fn decode(bytes: &[u8]) -> Self {
        Self {
            channel_index: read_i32(bytes, 0),
            state: read_i32(bytes, 4),
            sample_number: read_i64(bytes, 8),
        }
    }

    fn field_at(&self, index: usize) -> Option<FieldValue> {
        match index {
            0 => Some(FieldValue::Int32(self.channel_index)),
            1 => Some(FieldValue::Int32(self.state)),
            2 => Some(FieldValue::Int64(self.sample_number)),
            _ => None,
        }
    }
}

// =============================================================================
// Buffers
// =============================================================================

/// Encode a slice of records into their packed byte form
pub fn encode_records<R: Record>(records: &[R]) -> Vec<u8> {
    let mut out = vec![0u8; records.len() * R::SIZE];
    for (record, chunk) in records.iter().zip(out.chunks_exact_mut(R::SIZE)) {
        record.encode(chunk);
    }
    out
}

/// Caller-owned, fixed-capacity storage for one batch of records
///
/// The reader never resizes a buffer. After a read that filled `n` slots,
/// only `[0, n)` are meaningful; later slots may hold stale records from an
/// earlier call.
#[derive(Debug, Clone)]
pub struct RecordBuffer<R: Record> {
    slots: Vec<R>,
}

impl<R: Record> RecordBuffer<R> {
    /// Pre-allocate `capacity` default-initialized slots
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: vec![R::default(); capacity],
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Slot `index`, valid or not
    pub fn get(&self, index: usize) -> Option<&R> {
        self.slots.get(index)
    }

    /// The first `count` slots, i.e. what a read reported as filled
    pub fn filled(&self, count: usize) -> &[R] {
        &self.slots[..count.min(self.slots.len())]
    }

    pub fn as_slice(&self) -> &[R] {
        &self.slots
    }

    /// Decode packed records from `bytes` into the leading slots
    ///
    /// Returns the number of slots written.
    pub(crate) fn fill_from(&mut self, bytes: &[u8]) -> Result<usize> {
        if bytes.len() % R::SIZE != 0 {
            return Err(RiverError::Protocol(format!(
                "batch of {} bytes is not a multiple of the {}-byte record size",
                bytes.len(),
                R::SIZE
            )));
        }
        let count = bytes.len() / R::SIZE;
        if count > self.slots.len() {
            return Err(RiverError::Protocol(format!(
                "batch of {} records exceeds buffer capacity {}",
                count,
                self.slots.len()
            )));
        }
        for (slot, chunk) in self.slots.iter_mut().zip(bytes.chunks_exact(R::SIZE)) {
            *slot = R::decode(chunk);
        }
        Ok(count)
    }
}

impl<R: Record> std::ops::Index<usize> for RecordBuffer<R> {
    type Output = R;

    fn index(&self, index: usize) -> &R {
        &self.slots[index]
    }
}
