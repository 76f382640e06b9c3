//! Semantic search over song lyrics.
//!
//! Lyrics are embedded into vectors, stored in self-describing containers,
//! indexed by a forest of random-projection trees and queried with free text.

pub mod config;
pub mod display;
pub mod error;
pub mod io;
pub mod pipeline;
pub mod query;
pub mod records;
pub mod vector;

pub use config::Settings;
pub use error::{IoContext, SearchError, SearchResult};
pub use pipeline::{Corpus, EmbeddingPipeline, PipelineOptions, load_corpus};
pub use query::QueryEngine;
pub use records::{
    ColumnSpec, ColumnType, Metadata, MetadataValue, RecordReader, RecordWriter, Schema,
    StoredRecord, TextRecord, VectorContainer,
};
pub use vector::{
    AnnIndex, EmbeddingGenerator, FastEmbedGenerator, IndexBuilder, ItemId, TreeCount,
    VectorDimension,
};
