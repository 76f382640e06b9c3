//! Forest of randomized projection trees for approximate nearest neighbor search.
//!
//! Every tree recursively splits the item set with a hyperplane through the
//! origin chosen by two-means clustering, until a node holds at most
//! [`LEAF_CAPACITY`] items. A query walks all trees at once, best-first by
//! distance to the hyperplanes, gathers candidate ids and reranks them by exact
//! angular distance.
//!
//! # Lifecycle
//! `new` (empty) -> `insert`* -> `build` (once) -> `search`*.
//! Inserting after `build`, building twice, or searching before `build` is a
//! [`SearchError::State`] error.
//!
//! # Concurrency
//! Trees are built in parallel with rayon. A built index is immutable and can
//! be shared behind an `Arc` for concurrent queries without locking.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rayon::prelude::*;
use tracing::{debug, info};

use crate::error::{SearchError, SearchResult};
use crate::vector::clustering::{angular_distance, dot, l2_norm, two_means_normal};
use crate::vector::{ItemId, TreeCount, VectorDimension};

/// Maximum number of item ids held by a leaf.
pub const LEAF_CAPACITY: usize = 16;

/// Seed used when the caller does not pick one.
pub const DEFAULT_SEED: u64 = 0x1F5E_A7C4_0B3D_2291;

/// Mixes the tree number into the base seed so trees differ but stay reproducible.
const SEED_STRIDE: u64 = 0x9E37_79B9_7F4A_7C15;

/// One node of a projection tree, addressed by its position in the tree's arena.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Node {
    Leaf {
        items: Vec<u32>,
    },
    Split {
        normal: Vec<f32>,
        /// Child holding items with a non-positive margin.
        left: u32,
        /// Child holding items with a positive margin.
        right: u32,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Tree {
    pub(crate) root: u32,
    pub(crate) nodes: Vec<Node>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum IndexState {
    Building,
    Built,
}

/// Approximate nearest neighbor index over fixed-dimension vectors.
///
/// Item ids are dense and positional: the n-th inserted vector gets id n-1.
#[derive(Debug, Clone)]
pub struct AnnIndex {
    pub(crate) dimension: VectorDimension,
    pub(crate) tree_count: TreeCount,
    pub(crate) seed: u64,
    /// Row-major item vectors, `dimension` floats per item.
    pub(crate) items: Vec<f32>,
    pub(crate) trees: Vec<Tree>,
    pub(crate) state: IndexState,
}

/// Entry of the best-first traversal queue.
#[derive(Debug)]
struct Frontier {
    priority: f32,
    tree: u32,
    node: u32,
}

impl PartialEq for Frontier {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Frontier {}

impl PartialOrd for Frontier {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Frontier {
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority
            .total_cmp(&other.priority)
            .then_with(|| other.tree.cmp(&self.tree))
            .then_with(|| other.node.cmp(&self.node))
    }
}

impl AnnIndex {
    /// Creates an empty index.
    ///
    /// Vectors are not normalized here; supply unit vectors for angular
    /// semantics (the embedding pipeline does this by default).
    #[must_use]
    pub fn new(dimension: VectorDimension, tree_count: TreeCount) -> Self {
        Self {
            dimension,
            tree_count,
            seed: DEFAULT_SEED,
            items: Vec::new(),
            trees: Vec::new(),
            state: IndexState::Building,
        }
    }

    /// Fixes the random seed used by `build`, for reproducible forests.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Adds a vector and returns its id, the next position in insertion order.
    pub fn insert(&mut self, vector: &[f32]) -> SearchResult<ItemId> {
        if self.state == IndexState::Built {
            return Err(SearchError::state(
                "cannot insert into an index that has already been built",
            ));
        }
        self.dimension.validate_vector(vector)?;

        let id = u32::try_from(self.len())
            .map_err(|_| SearchError::invalid_argument("index is full (u32 item ids)"))?;
        self.items.extend_from_slice(vector);
        Ok(ItemId::new(id))
    }

    /// Builds the forest. Must be called exactly once, after all insertions.
    ///
    /// A second call fails with [`SearchError::State`] and leaves the built
    /// forest untouched.
    pub fn build(&mut self) -> SearchResult<()> {
        if self.state == IndexState::Built {
            return Err(SearchError::state("index has already been built"));
        }

        let item_count = self.len();
        let dim = self.dimension.get();
        let items = &self.items;
        let seed = self.seed;

        self.trees = (0..self.tree_count.get())
            .into_par_iter()
            .map(|tree_no| {
                let mut rng =
                    StdRng::seed_from_u64(seed ^ (tree_no as u64 + 1).wrapping_mul(SEED_STRIDE));
                let all: Vec<u32> = (0..item_count as u32).collect();
                let mut nodes = Vec::new();
                let root = build_node(&mut nodes, all, items, dim, &mut rng);
                Tree { root, nodes }
            })
            .collect();

        self.state = IndexState::Built;
        info!(
            items = item_count,
            trees = self.trees.len(),
            nodes = self.trees.iter().map(|t| t.nodes.len()).sum::<usize>(),
            "forest built"
        );
        Ok(())
    }

    /// Returns up to `k` nearest item ids, nearest first.
    pub fn search(&self, query: &[f32], k: usize) -> SearchResult<Vec<ItemId>> {
        Ok(self
            .search_with_distances(query, k)?
            .into_iter()
            .map(|(id, _)| id)
            .collect())
    }

    /// Returns up to `k` nearest items with their angular distances, nearest first.
    pub fn search_with_distances(
        &self,
        query: &[f32],
        k: usize,
    ) -> SearchResult<Vec<(ItemId, f32)>> {
        self.search_with_budget(query, k, None)
    }

    /// Search with an explicit candidate budget.
    ///
    /// `search_k` bounds how many candidate ids are collected from the trees
    /// before reranking; `None` uses `tree_count * k`. Larger budgets trade
    /// latency for recall. The walk never stops before `k` distinct
    /// candidates are found, and a `k` covering the whole index ranks every
    /// item.
    pub fn search_with_budget(
        &self,
        query: &[f32],
        k: usize,
        search_k: Option<usize>,
    ) -> SearchResult<Vec<(ItemId, f32)>> {
        self.ensure_built()?;
        self.dimension.validate_vector(query)?;
        if k == 0 {
            return Err(SearchError::invalid_argument(
                "number of neighbors must be at least 1",
            ));
        }
        if self.is_empty() {
            return Ok(Vec::new());
        }

        let budget = search_k
            .unwrap_or_else(|| self.tree_count.get().saturating_mul(k))
            .max(k);
        let candidates: Vec<u32> = if k >= self.len() {
            (0..self.len() as u32).collect()
        } else {
            self.collect_candidates(query, budget, k).into_iter().collect()
        };

        let mut scored: Vec<(ItemId, f32)> = candidates
            .into_iter()
            .map(|id| {
                let item = ItemId::new(id);
                (item, angular_distance(query, self.vector_at(item.index())))
            })
            .collect();
        scored.sort_by(|a, b| a.1.total_cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
        scored.truncate(k);

        debug!(k, budget, returned = scored.len(), "forest search");
        Ok(scored)
    }

    /// Nearest neighbors of an already indexed item (the item itself included).
    pub fn nearest_to_item(&self, id: ItemId, k: usize) -> SearchResult<Vec<ItemId>> {
        let vector = self.item_vector(id)?.to_vec();
        self.search(&vector, k)
    }

    /// Stored vector of an item.
    pub fn item_vector(&self, id: ItemId) -> SearchResult<&[f32]> {
        if id.index() >= self.len() {
            return Err(SearchError::invalid_argument(format!(
                "item {id} is out of range (index holds {} items)",
                self.len()
            )));
        }
        Ok(self.vector_at(id.index()))
    }

    /// Angular distance between two indexed items.
    pub fn distance(&self, a: ItemId, b: ItemId) -> SearchResult<f32> {
        Ok(angular_distance(self.item_vector(a)?, self.item_vector(b)?))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len() / self.dimension.get()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[must_use]
    pub fn is_built(&self) -> bool {
        self.state == IndexState::Built
    }

    #[must_use]
    pub fn dimension(&self) -> VectorDimension {
        self.dimension
    }

    #[must_use]
    pub fn tree_count(&self) -> TreeCount {
        self.tree_count
    }

    #[must_use]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub(crate) fn ensure_built(&self) -> SearchResult<()> {
        if self.state != IndexState::Built {
            return Err(SearchError::state(
                "index must be built before it can be queried or saved",
            ));
        }
        Ok(())
    }

    fn vector_at(&self, index: usize) -> &[f32] {
        let dim = self.dimension.get();
        &self.items[index * dim..(index + 1) * dim]
    }

    /// Best-first walk over all trees until `budget` leaf entries are seen
    /// and at least `min_distinct` different ids are gathered.
    fn collect_candidates(
        &self,
        query: &[f32],
        budget: usize,
        min_distinct: usize,
    ) -> HashSet<u32> {
        let mut queue = BinaryHeap::with_capacity(self.trees.len() * 2);
        for (tree_no, tree) in self.trees.iter().enumerate() {
            queue.push(Frontier {
                priority: f32::INFINITY,
                tree: tree_no as u32,
                node: tree.root,
            });
        }

        let mut seen = 0usize;
        let mut candidates = HashSet::with_capacity(budget);
        while seen < budget || candidates.len() < min_distinct {
            let Some(Frontier {
                priority,
                tree,
                node,
            }) = queue.pop()
            else {
                break;
            };

            match &self.trees[tree as usize].nodes[node as usize] {
                Node::Leaf { items } => {
                    seen += items.len();
                    candidates.extend(items.iter().copied());
                }
                Node::Split {
                    normal,
                    left,
                    right,
                } => {
                    let margin = dot(normal, query);
                    queue.push(Frontier {
                        priority: priority.min(margin),
                        tree,
                        node: *right,
                    });
                    queue.push(Frontier {
                        priority: priority.min(-margin),
                        tree,
                        node: *left,
                    });
                }
            }
        }
        candidates
    }
}

/// Recursively builds the subtree over `ids`, returning its arena position.
fn build_node(
    nodes: &mut Vec<Node>,
    mut ids: Vec<u32>,
    items: &[f32],
    dim: usize,
    rng: &mut StdRng,
) -> u32 {
    let position = nodes.len() as u32;
    if ids.len() <= LEAF_CAPACITY {
        nodes.push(Node::Leaf { items: ids });
        return position;
    }

    let vector = |id: u32| &items[id as usize * dim..(id as usize + 1) * dim];
    let points: Vec<&[f32]> = ids.iter().map(|&id| vector(id)).collect();
    let normal = two_means_normal(&points, rng);

    let (mut left_ids, mut right_ids): (Vec<u32>, Vec<u32>) = if l2_norm(&normal) > 0.0 {
        ids.iter()
            .copied()
            .partition(|&id| dot(&normal, vector(id)) <= 0.0)
    } else {
        (Vec::new(), Vec::new())
    };

    // Duplicates or colinear points: fall back to a random halving
    if left_ids.is_empty() || right_ids.is_empty() {
        ids.shuffle(rng);
        let half = ids.len() / 2;
        right_ids = ids.split_off(half);
        left_ids = ids;
    }

    // Reserve the slot so children land after their parent
    nodes.push(Node::Leaf { items: Vec::new() });
    let left = build_node(nodes, left_ids, items, dim, rng);
    let right = build_node(nodes, right_ids, items, dim, rng);
    nodes[position as usize] = Node::Split {
        normal,
        left,
        right,
    };
    position
}
