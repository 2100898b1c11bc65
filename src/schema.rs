//! Stream schemas
//!
//! Every stream carries one schema: an ordered list of fixed-size fields.
//! Samples are packed back to back with no padding, so a sample's byte size
//! is the sum of its field sizes.

use serde::{Deserialize, Serialize};

use crate::error::{Result, RiverError};

/// Type of a single field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FieldType {
    Double,
    Float,
    Int32,
    Int64,
    FixedWidthBytes,
}

impl FieldType {
    /// Natural size of the type, if it has one
    pub fn natural_size(&self) -> Option<usize> {
        match self {
            FieldType::Double | FieldType::Int64 => Some(8),
            FieldType::Float | FieldType::Int32 => Some(4),
            FieldType::FixedWidthBytes => None,
        }
    }
}

/// A named, typed field of a sample
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDefinition {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    pub size: usize,
}

impl FieldDefinition {
    /// Create a field; `size` must match the type unless it is FixedWidthBytes
    pub fn new(name: impl Into<String>, field_type: FieldType, size: usize) -> Result<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(RiverError::Schema("field name must not be empty".into()));
        }
        match field_type.natural_size() {
            Some(expected) if expected != size => {
                return Err(RiverError::Schema(format!(
                    "field '{}': {:?} must be {} bytes, got {}",
                    name, field_type, expected, size
                )));
            }
            None if size == 0 => {
                return Err(RiverError::Schema(format!(
                    "field '{}': fixed-width bytes need a non-zero size",
                    name
                )));
            }
            _ => {}
        }
        Ok(Self {
            name,
            field_type,
            size,
        })
    }

    pub fn int32(name: &str) -> Self {
        Self {
            name: name.to_string(),
            field_type: FieldType::Int32,
            size: 4,
        }
    }

    pub fn int64(name: &str) -> Self {
        Self {
            name: name.to_string(),
            field_type: FieldType::Int64,
            size: 8,
        }
    }

    pub fn double(name: &str) -> Self {
        Self {
            name: name.to_string(),
            field_type: FieldType::Double,
            size: 8,
        }
    }

    pub fn float(name: &str) -> Self {
        Self {
            name: name.to_string(),
            field_type: FieldType::Float,
            size: 4,
        }
    }
}

/// Ordered field layout of a stream's samples
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamSchema {
    pub field_definitions: Vec<FieldDefinition>,
}

impl StreamSchema {
    /// Build a schema, rejecting empty layouts and duplicate names
    pub fn new(field_definitions: Vec<FieldDefinition>) -> Result<Self> {
        let schema = Self { field_definitions };
        schema.validate()?;
        Ok(schema)
    }

    /// Check a schema built field-by-field or received off the wire
    ///
    /// Every field must have a name and a size consistent with its type,
    /// names must be unique, and the layout must not be empty.
    pub fn validate(&self) -> Result<()> {
        let fields = &self.field_definitions;
        if fields.is_empty() {
            return Err(RiverError::Schema("schema has no fields".into()));
        }
        for (i, field) in fields.iter().enumerate() {
            FieldDefinition::new(field.name.clone(), field.field_type, field.size)?;
            if fields[..i].iter().any(|f| f.name == field.name) {
                return Err(RiverError::Schema(format!(
                    "duplicate field name '{}'",
                    field.name
                )));
            }
        }
        Ok(())
    }

    /// Bytes per sample
    pub fn sample_size(&self) -> usize {
        self.field_definitions.iter().map(|f| f.size).sum()
    }

    /// Position of a field by name
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.field_definitions.iter().position(|f| f.name == name)
    }

    /// Byte offset of a field within a sample
    pub fn offset_of(&self, index: usize) -> Option<usize> {
        if index >= self.field_definitions.len() {
            return None;
        }
        Some(self.field_definitions[..index].iter().map(|f| f.size).sum())
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let parsed: StreamSchema = serde_json::from_str(json)?;
        parsed.validate()?;
        Ok(parsed)
    }
}

impl std::fmt::Display for StreamSchema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let fields: Vec<String> = self
            .field_definitions
            .iter()
            .map(|d| format!("{}:{:?}", d.name, d.field_type))
            .collect();
        write!(f, "[{}]", fields.join(", "))
    }
}
