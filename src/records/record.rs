//! In-memory record types of the vector record store.

use std::fmt;

use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::records::schema::{ColumnType, Schema};

/// A typed metadata scalar.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Int(i64),
    Float(f64),
    String(String),
}

impl MetadataValue {
    #[must_use]
    pub fn dtype(&self) -> ColumnType {
        match self {
            Self::Int(_) => ColumnType::Int,
            Self::Float(_) => ColumnType::Float,
            Self::String(_) => ColumnType::String,
        }
    }

    /// Parses a raw corpus cell as the declared type. Returns `None` when
    /// the cell does not hold a value of that type.
    #[must_use]
    pub fn parse(raw: &str, dtype: ColumnType) -> Option<Self> {
        match dtype {
            ColumnType::Int => raw.trim().parse().ok().map(Self::Int),
            ColumnType::Float => raw.trim().parse().ok().map(Self::Float),
            ColumnType::String => Some(Self::String(raw.to_string())),
        }
    }

    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Display for MetadataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::String(v) => f.write_str(v),
        }
    }
}

impl From<i64> for MetadataValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for MetadataValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for MetadataValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

/// Ordered column name to value mapping. Column order drives the schema.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Metadata {
    entries: Vec<(String, MetadataValue)>,
}

impl Metadata {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a column, keeping insertion order.
    pub fn push(&mut self, name: impl Into<String>, value: impl Into<MetadataValue>) {
        self.entries.push((name.into(), value.into()));
    }

    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<MetadataValue>) -> Self {
        self.push(name, value);
        self
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&MetadataValue> {
        self.entries
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &MetadataValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn values(&self) -> impl Iterator<Item = &MetadataValue> {
        self.entries.iter().map(|(_, v)| v)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Serialize for Metadata {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, value) in &self.entries {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

/// A corpus row: the text to embed plus its metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct TextRecord {
    pub text: String,
    pub metadata: Metadata,
}

impl TextRecord {
    pub fn new(text: impl Into<String>, metadata: Metadata) -> Self {
        Self {
            text: text.into(),
            metadata,
        }
    }
}

/// One `(text, embedding, metadata)` triple as stored in a container.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct StoredRecord {
    pub text: Option<String>,
    pub embedding: Vec<f32>,
    pub metadata: Metadata,
}

impl StoredRecord {
    pub fn new(text: Option<String>, embedding: Vec<f32>, metadata: Metadata) -> Self {
        Self {
            text,
            embedding,
            metadata,
        }
    }
}

/// A whole container read back into memory.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorContainer {
    pub schema: Schema,
    pub records: Vec<StoredRecord>,
}

impl VectorContainer {
    pub fn new(schema: Schema, records: Vec<StoredRecord>) -> Self {
        Self { schema, records }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Embeddings in stored order.
    pub fn embeddings(&self) -> impl Iterator<Item = &[f32]> {
        self.records.iter().map(|r| r.embedding.as_slice())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_keeps_column_order() {
        let metadata = Metadata::new()
            .with("Title", "Rain")
            .with("Artist", "A")
            .with("id", 7i64);

        let names: Vec<&str> = metadata.iter().map(|(k, _)| k).collect();
        assert_eq!(names, vec!["Title", "Artist", "id"]);
        assert_eq!(metadata.get("id"), Some(&MetadataValue::Int(7)));
        assert_eq!(metadata.get("missing"), None);
    }

    #[test]
    fn test_parse_by_declared_type() {
        assert_eq!(
            MetadataValue::parse(" 42 ", ColumnType::Int),
            Some(MetadataValue::Int(42))
        );
        assert_eq!(
            MetadataValue::parse("0.5", ColumnType::Float),
            Some(MetadataValue::Float(0.5))
        );
        // Strings are kept verbatim, including numeric-looking ones
        assert_eq!(
            MetadataValue::parse("3", ColumnType::String),
            Some(MetadataValue::String("3".to_string()))
        );
        assert_eq!(MetadataValue::parse("three", ColumnType::Int), None);
    }

    #[test]
    fn test_metadata_serializes_as_ordered_object() {
        let metadata = Metadata::new().with("b", 1i64).with("a", "x");
        let json = serde_json::to_string(&metadata).unwrap();
        assert_eq!(json, r#"{"b":1,"a":"x"}"#);
    }
}
