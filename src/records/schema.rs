//! Schema sidecar describing a vector container.
//!
//! The sidecar is a flat JSON object stored next to the data file at
//! `<data path>.schema.json`:
//!
//! ```json
//! {
//!   "embedding_size": 384,
//!   "has_text": true,
//!   "metadata_columns": ["Artist", "index"],
//!   "dtype_Artist": "string",
//!   "dtype_index": "int"
//! }
//! ```

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{IoContext, SearchError, SearchResult};

/// Suffix appended to a data file path to locate its schema.
pub const SCHEMA_SUFFIX: &str = ".schema.json";

/// Column assumed when a schema does not list its metadata columns.
pub const DEFAULT_METADATA_COLUMN: &str = "index";

/// Declared type of a metadata column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Int,
    Float,
    String,
}

impl ColumnType {
    /// Name used in the schema sidecar.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Int => "int",
            Self::Float => "float",
            Self::String => "string",
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ColumnType {
    type Err = SearchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "int" | "integer" | "int64" | "i64" => Ok(Self::Int),
            "float" | "double" | "float64" | "f64" => Ok(Self::Float),
            "string" | "str" | "text" => Ok(Self::String),
            other => Err(SearchError::invalid_argument(format!(
                "unknown column type '{other}' (expected int, float or string)"
            ))),
        }
    }
}

/// A metadata column declared up front by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub name: String,
    pub dtype: ColumnType,
}

impl ColumnSpec {
    pub fn new(name: impl Into<String>, dtype: ColumnType) -> Self {
        Self {
            name: name.into(),
            dtype,
        }
    }
}

/// Parses `name:dtype`; a bare `name` is a string column.
impl FromStr for ColumnSpec {
    type Err = SearchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, dtype) = match s.rsplit_once(':') {
            Some((name, dtype)) => (name, dtype.parse()?),
            None => (s, ColumnType::String),
        };
        if name.is_empty() {
            return Err(SearchError::invalid_argument(format!(
                "column spec '{s}' has an empty name"
            )));
        }
        Ok(Self::new(name, dtype))
    }
}

/// Self-description of a vector container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    pub embedding_size: usize,
    pub has_text: bool,
    pub columns: Vec<ColumnSpec>,
}

impl Schema {
    pub fn new(embedding_size: usize, has_text: bool, columns: Vec<ColumnSpec>) -> Self {
        Self {
            embedding_size,
            has_text,
            columns,
        }
    }

    /// Location of the sidecar for a given data file.
    #[must_use]
    pub fn sidecar_path(data_path: &Path) -> PathBuf {
        let mut raw = data_path.as_os_str().to_os_string();
        raw.push(SCHEMA_SUFFIX);
        PathBuf::from(raw)
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    /// Encodes the schema in the flat sidecar layout.
    #[must_use]
    pub fn to_json(&self) -> Value {
        let mut object = Map::new();
        object.insert("embedding_size".into(), Value::from(self.embedding_size));
        object.insert("has_text".into(), Value::from(self.has_text));
        object.insert(
            "metadata_columns".into(),
            Value::from(self.column_names().collect::<Vec<_>>()),
        );
        for column in &self.columns {
            object.insert(
                format!("dtype_{}", column.name),
                Value::from(column.dtype.as_str()),
            );
        }
        Value::Object(object)
    }

    /// Decodes a sidecar. `path` is only used for error messages.
    ///
    /// Missing `metadata_columns` means a single `index` column, missing
    /// `has_text` means false, and a column without a `dtype_` key is a string.
    pub fn from_json(value: &Value, path: &Path) -> SearchResult<Self> {
        let object = value
            .as_object()
            .ok_or_else(|| SearchError::schema(path, "schema must be a JSON object"))?;

        let embedding_size = object
            .get("embedding_size")
            .ok_or_else(|| SearchError::schema(path, "missing 'embedding_size'"))?
            .as_u64()
            .filter(|&size| size > 0)
            .ok_or_else(|| {
                SearchError::schema(path, "'embedding_size' must be a positive integer")
            })? as usize;

        let has_text = match object.get("has_text") {
            None => false,
            Some(v) => v
                .as_bool()
                .ok_or_else(|| SearchError::schema(path, "'has_text' must be a boolean"))?,
        };

        let names: Vec<String> = match object.get("metadata_columns") {
            None => vec![DEFAULT_METADATA_COLUMN.to_string()],
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| {
                    item.as_str().map(str::to_string).ok_or_else(|| {
                        SearchError::schema(path, "'metadata_columns' must hold strings")
                    })
                })
                .collect::<SearchResult<_>>()?,
            Some(_) => {
                return Err(SearchError::schema(
                    path,
                    "'metadata_columns' must be an array",
                ));
            }
        };

        let columns = names
            .into_iter()
            .map(|name| {
                let dtype = match object.get(&format!("dtype_{name}")) {
                    None => ColumnType::String,
                    Some(Value::String(raw)) => raw.parse().map_err(|_| {
                        SearchError::schema(path, format!("column '{name}' has unknown dtype '{raw}'"))
                    })?,
                    Some(_) => {
                        return Err(SearchError::schema(
                            path,
                            format!("dtype of column '{name}' must be a string"),
                        ));
                    }
                };
                Ok(ColumnSpec::new(name, dtype))
            })
            .collect::<SearchResult<Vec<_>>>()?;

        Ok(Self {
            embedding_size,
            has_text,
            columns,
        })
    }

    /// Writes the sidecar for `data_path`.
    pub fn save(&self, data_path: &Path) -> SearchResult<()> {
        let path = Self::sidecar_path(data_path);
        let json = serde_json::to_string_pretty(&self.to_json())
            .map_err(|e| SearchError::schema(&path, format!("failed to serialize schema: {e}")))?;
        std::fs::write(&path, json).with_path(&path)
    }

    /// Reads the sidecar for `data_path`. A missing sidecar is a schema error.
    pub fn load(data_path: &Path) -> SearchResult<Self> {
        let path = Self::sidecar_path(data_path);
        let json = match std::fs::read_to_string(&path) {
            Ok(json) => json,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(SearchError::schema(&path, "schema sidecar not found"));
            }
            Err(e) => return Err(SearchError::io(&path, e)),
        };

        let value: Value = serde_json::from_str(&json)
            .map_err(|e| SearchError::schema(&path, format!("malformed schema JSON: {e}")))?;
        Self::from_json(&value, &path)
    }
}
