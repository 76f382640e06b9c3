//! Composition of containers into a built forest.
//!
//! Ids follow enumeration order: every record of the first container in
//! stored order, then the second container, and so on. Downstream lookups
//! by id rely on this order.

use std::path::Path;

use tracing::{debug, info};

use crate::error::{SearchError, SearchResult};
use crate::records::{RecordReader, Schema, VectorContainer};
use crate::vector::{AnnIndex, DEFAULT_SEED, TreeCount, VectorDimension};

/// Builds forests from vector containers.
#[derive(Debug, Clone, Copy)]
pub struct IndexBuilder {
    dimension: VectorDimension,
    tree_count: TreeCount,
    seed: u64,
}

impl IndexBuilder {
    #[must_use]
    pub fn new(dimension: VectorDimension, tree_count: TreeCount) -> Self {
        Self {
            dimension,
            tree_count,
            seed: DEFAULT_SEED,
        }
    }

    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Inserts every vector of every container, in order, then builds.
    pub fn build_from_containers(&self, containers: &[VectorContainer]) -> SearchResult<AnnIndex> {
        let mut index = self.empty_index();
        for (n, container) in containers.iter().enumerate() {
            self.check_schema(&container.schema)?;
            for embedding in container.embeddings() {
                index.insert(embedding)?;
            }
            debug!(container = n, records = container.len(), "container inserted");
        }
        self.finish(index, containers.len())
    }

    /// Streams containers from disk in the given order, then builds.
    ///
    /// Files are read record by record, so only the forest itself is held
    /// in memory.
    pub fn build_from_files<P: AsRef<Path>>(&self, paths: &[P]) -> SearchResult<AnnIndex> {
        let mut index = self.empty_index();
        for (n, path) in paths.iter().enumerate() {
            let path = path.as_ref();
            info!(
                file = n + 1,
                of = paths.len(),
                path = %path.display(),
                "loading embeddings"
            );

            let reader = RecordReader::open(path)?;
            self.check_schema(reader.schema())?;
            let before = index.len();
            for record in reader {
                index.insert(&record?.embedding)?;
            }
            debug!(path = %path.display(), records = index.len() - before, "container inserted");
        }
        self.finish(index, paths.len())
    }

    fn empty_index(&self) -> AnnIndex {
        AnnIndex::new(self.dimension, self.tree_count).with_seed(self.seed)
    }

    fn check_schema(&self, schema: &Schema) -> SearchResult<()> {
        if schema.embedding_size != self.dimension.get() {
            return Err(SearchError::DimensionMismatch {
                expected: self.dimension.get(),
                actual: schema.embedding_size,
            });
        }
        Ok(())
    }

    fn finish(&self, mut index: AnnIndex, containers: usize) -> SearchResult<AnnIndex> {
        info!(
            containers,
            items = index.len(),
            trees = self.tree_count.get(),
            "building forest"
        );
        index.build()?;
        Ok(index)
    }
}
