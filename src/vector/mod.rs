//! Vector search for lyrics embeddings.
//!
//! This module holds everything that deals with raw vectors: the embedding
//! capability, the forest of random projection trees used for approximate
//! nearest neighbor search, and the forest's on-disk format.
//!
//! # Architecture
//! Items are inserted with dense positional ids, the forest is built once in
//! parallel, and the built index is immutable. Distance is angular, so
//! vectors are expected to be L2-normalized before insertion.

mod builder;
mod clustering;
mod embedding;
mod forest;
mod storage;
mod types;

// Re-export core types for public API
pub use builder::IndexBuilder;
pub use clustering::{
    angular_distance, cosine_similarity, l2_norm, normalize_vector, normalize_vector_copy,
};
pub use embedding::{
    EmbeddingGenerator, FastEmbedGenerator, model_to_string, parse_embedding_model,
};
pub use forest::{AnnIndex, DEFAULT_SEED, LEAF_CAPACITY};
pub use storage::{IndexFileInfo, inspect_index_file};
pub use types::{ItemId, TreeCount, VECTOR_DIMENSION_384, VectorDimension};
