//! Vector record store.
//!
//! Persists `(text, embedding, metadata)` triples to an append-only binary
//! data file plus a JSON schema sidecar, and reads them back with the
//! declared metadata types restored.

mod codec;
mod record;
mod schema;
mod store;

pub use record::{Metadata, MetadataValue, StoredRecord, TextRecord, VectorContainer};
pub use schema::{ColumnSpec, ColumnType, DEFAULT_METADATA_COLUMN, SCHEMA_SUFFIX, Schema};
pub use store::{RecordReader, RecordWriter};
