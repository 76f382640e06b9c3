//! Query engine: free text in, nearest item ids out.
//!
//! The engine is built once (for example at service start) and passed by
//! reference. It holds no mutable state, so one instance serves any number
//! of threads.

use std::sync::Arc;

use tracing::debug;

use crate::error::{SearchError, SearchResult};
use crate::vector::{AnnIndex, EmbeddingGenerator, ItemId};

/// Default number of results returned by a query.
pub const DEFAULT_LIMIT: usize = 5;

/// Embeds queries and searches a built index.
#[derive(Clone)]
pub struct QueryEngine {
    index: Arc<AnnIndex>,
    generator: Arc<dyn EmbeddingGenerator>,
    search_k: Option<usize>,
}

impl std::fmt::Debug for QueryEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryEngine")
            .field("items", &self.index.len())
            .field("dimension", &self.index.dimension())
            .field("search_k", &self.search_k)
            .finish()
    }
}

impl QueryEngine {
    /// Creates an engine over `index` using `generator` for query text.
    ///
    /// The generator must be the one (or equivalent to the one) that
    /// produced the indexed vectors.
    pub fn new(index: Arc<AnnIndex>, generator: Arc<dyn EmbeddingGenerator>) -> Self {
        Self {
            index,
            generator,
            search_k: None,
        }
    }

    /// Overrides the candidate budget per query (`None` is `tree_count * k`).
    #[must_use]
    pub fn with_search_k(mut self, search_k: Option<usize>) -> Self {
        self.search_k = search_k;
        self
    }

    #[must_use]
    pub fn index(&self) -> &AnnIndex {
        &self.index
    }

    /// Ids of the `k` items nearest to `text`, nearest first.
    ///
    /// Returns fewer than `k` ids when the index is smaller than `k`.
    pub fn query(&self, text: &str, k: usize) -> SearchResult<Vec<ItemId>> {
        Ok(self
            .query_with_distances(text, k)?
            .into_iter()
            .map(|(id, _)| id)
            .collect())
    }

    /// Like [`query`](Self::query), with the angular distance of each hit.
    pub fn query_with_distances(&self, text: &str, k: usize) -> SearchResult<Vec<(ItemId, f32)>> {
        if k == 0 {
            return Err(SearchError::invalid_argument(
                "number of results must be at least 1",
            ));
        }
        if !self.index.is_built() {
            return Err(SearchError::state("index must be built before querying"));
        }

        let vector = self.embed_query(text)?;
        let hits = self.index.search_with_budget(&vector, k, self.search_k)?;
        debug!(k, hits = hits.len(), "query answered");
        Ok(hits)
    }

    /// Embeds one string, collapsing the provider's batch of one.
    fn embed_query(&self, text: &str) -> SearchResult<Vec<f32>> {
        let mut batch = self.generator.generate_embeddings(&[text])?;
        match batch.len() {
            1 => Ok(batch.swap_remove(0)),
            0 => Err(SearchError::Embedding(
                "provider returned no vector for the query".to_string(),
            )),
            n => Err(SearchError::Embedding(format!(
                "provider returned {n} vectors for a single query"
            ))),
        }
    }
}
