//! Frame encoding of container records.
//!
//! A frame is a little-endian `u32` payload length followed by a bincode
//! payload. Metadata values lose their column type on the wire: strings
//! travel as raw bytes and only the schema says how to read them back.

use std::path::Path;

use bincode::{Decode, Encode};

use crate::error::{SearchError, SearchResult};
use crate::records::record::{Metadata, MetadataValue};
use crate::records::schema::{ColumnType, Schema};

/// Size of the length prefix in front of every payload.
pub(crate) const FRAME_HEADER_SIZE: usize = 4;

/// Upper bound on a single payload, guarding against corrupt length prefixes.
pub(crate) const MAX_FRAME_SIZE: usize = 256 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Encode, Decode)]
pub(crate) enum WireValue {
    Int(i64),
    Float(f64),
    Bytes(Vec<u8>),
}

#[derive(Debug, Clone, PartialEq, Encode, Decode)]
pub(crate) struct WireRecord {
    pub(crate) text: Option<String>,
    pub(crate) embedding: Vec<f32>,
    pub(crate) fields: Vec<WireValue>,
}

impl WireValue {
    fn from_metadata(value: &MetadataValue) -> Self {
        match value {
            MetadataValue::Int(v) => Self::Int(*v),
            MetadataValue::Float(v) => Self::Float(*v),
            MetadataValue::String(v) => Self::Bytes(v.as_bytes().to_vec()),
        }
    }

    /// Restores the typed value using the column's declared type.
    fn restore(self, dtype: ColumnType) -> Result<MetadataValue, String> {
        match (self, dtype) {
            (Self::Int(v), ColumnType::Int) => Ok(MetadataValue::Int(v)),
            (Self::Float(v), ColumnType::Float) => Ok(MetadataValue::Float(v)),
            (Self::Bytes(raw), ColumnType::String) => String::from_utf8(raw)
                .map(MetadataValue::String)
                .map_err(|e| format!("string value is not valid UTF-8: {e}")),
            (wire, dtype) => Err(format!("stored {} value where {dtype} expected", wire.kind())),
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Bytes(_) => "bytes",
        }
    }
}

/// Checks a record against the schema before it is written.
pub(crate) fn validate(
    schema: &Schema,
    text: Option<&str>,
    embedding: &[f32],
    metadata: &Metadata,
) -> Result<(), String> {
    if embedding.len() != schema.embedding_size {
        return Err(format!(
            "embedding has {} values but the container holds {}-dimensional vectors",
            embedding.len(),
            schema.embedding_size
        ));
    }
    if schema.has_text && text.is_none() {
        return Err("container stores text but the record has none".to_string());
    }
    if metadata.len() != schema.columns.len() {
        return Err(format!(
            "record has {} metadata fields, schema declares {}",
            metadata.len(),
            schema.columns.len()
        ));
    }
    for ((name, value), column) in metadata.iter().zip(&schema.columns) {
        if name != column.name {
            return Err(format!(
                "metadata field '{name}' found where column '{}' was declared",
                column.name
            ));
        }
        if value.dtype() != column.dtype {
            return Err(format!(
                "column '{name}' is declared {} but the value is {}",
                column.dtype,
                value.dtype()
            ));
        }
    }
    Ok(())
}

/// Encodes one record into a complete frame.
pub(crate) fn encode_frame(
    schema: &Schema,
    text: Option<&str>,
    embedding: &[f32],
    metadata: &Metadata,
) -> Result<Vec<u8>, String> {
    let wire = WireRecord {
        text: if schema.has_text {
            text.map(str::to_string)
        } else {
            None
        },
        embedding: embedding.to_vec(),
        fields: metadata.values().map(WireValue::from_metadata).collect(),
    };

    let payload = bincode::encode_to_vec(&wire, bincode::config::standard())
        .map_err(|e| format!("failed to encode record: {e}"))?;
    let len = u32::try_from(payload.len())
        .ok()
        .filter(|&len| len as usize <= MAX_FRAME_SIZE)
        .ok_or_else(|| format!("record of {} bytes is too large", payload.len()))?;

    let mut frame = Vec::with_capacity(FRAME_HEADER_SIZE + payload.len());
    frame.extend_from_slice(&len.to_le_bytes());
    frame.extend_from_slice(&payload);
    Ok(frame)
}

/// Decodes a payload and rebuilds typed metadata from the schema.
pub(crate) fn decode_payload(
    schema: &Schema,
    payload: &[u8],
    path: &Path,
    position: usize,
) -> SearchResult<(Option<String>, Vec<f32>, Metadata)> {
    let corrupt = |reason: String| SearchError::schema(path, format!("record {position}: {reason}"));

    let (wire, used): (WireRecord, usize) =
        bincode::decode_from_slice(payload, bincode::config::standard())
            .map_err(|e| corrupt(format!("undecodable payload: {e}")))?;
    if used != payload.len() {
        return Err(corrupt(format!(
            "{} trailing bytes after payload",
            payload.len() - used
        )));
    }

    if wire.embedding.len() != schema.embedding_size {
        return Err(corrupt(format!(
            "embedding has {} values, schema declares {}",
            wire.embedding.len(),
            schema.embedding_size
        )));
    }
    if schema.has_text && wire.text.is_none() {
        return Err(corrupt("schema declares text but the record has none".to_string()));
    }
    if wire.fields.len() != schema.columns.len() {
        return Err(corrupt(format!(
            "record has {} metadata fields, schema declares {}",
            wire.fields.len(),
            schema.columns.len()
        )));
    }

    let mut metadata = Metadata::new();
    for (field, column) in wire.fields.into_iter().zip(&schema.columns) {
        let value = field
            .restore(column.dtype)
            .map_err(|reason| corrupt(format!("column '{}': {reason}", column.name)))?;
        metadata.push(column.name.clone(), value);
    }

    Ok((wire.text, wire.embedding, metadata))
}
