//! Type-safe wrappers and core types for the vector index.
//!
//! Newtypes here keep item ids, tree counts and dimensions from being
//! mixed up with each other or with plain counters.

use std::num::NonZeroUsize;

use crate::error::{SearchError, SearchResult};

/// Output dimension of the default multilingual sentence encoder.
pub const VECTOR_DIMENSION_384: usize = 384;

/// Dense, positional identifier of an indexed item.
///
/// Ids are assigned in insertion order starting at 0 with no gaps, so an
/// id is also the item's position in the concatenated source containers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemId(u32);

impl ItemId {
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Returns the underlying u32 value.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }

    /// Position of this item in the index's item table.
    #[must_use]
    pub const fn index(&self) -> usize {
        self.0 as usize
    }

    /// Converts to little-endian bytes for storage.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; 4] {
        self.0.to_le_bytes()
    }

    /// Creates from little-endian bytes.
    #[must_use]
    pub fn from_bytes(bytes: [u8; 4]) -> Self {
        Self(u32::from_le_bytes(bytes))
    }
}

impl std::fmt::Display for ItemId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Number of randomized trees in the forest.
///
/// More trees raise recall at the cost of build time and file size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeCount(NonZeroUsize);

impl TreeCount {
    /// Creates a tree count, rejecting zero.
    pub fn new(count: usize) -> SearchResult<Self> {
        NonZeroUsize::new(count)
            .map(Self)
            .ok_or_else(|| SearchError::invalid_argument("tree count must be at least 1"))
    }

    #[must_use]
    pub const fn get(&self) -> usize {
        self.0.get()
    }
}

/// Type-safe wrapper for vector dimensions.
///
/// Ensures runtime validation of vector dimensions
/// to prevent dimension mismatches during operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VectorDimension(usize);

impl VectorDimension {
    /// Creates a new `VectorDimension` with validation.
    ///
    /// Returns an error if the dimension is zero.
    pub fn new(dim: usize) -> SearchResult<Self> {
        if dim == 0 {
            return Err(SearchError::invalid_argument(
                "vector dimension cannot be zero",
            ));
        }
        Ok(Self(dim))
    }

    /// Returns the underlying dimension value.
    #[must_use]
    pub const fn get(&self) -> usize {
        self.0
    }

    /// Validates that a vector has the expected dimension.
    pub fn validate_vector(&self, vector: &[f32]) -> SearchResult<()> {
        if vector.len() != self.0 {
            return Err(SearchError::DimensionMismatch {
                expected: self.0,
                actual: vector.len(),
            });
        }
        Ok(())
    }
}

impl std::fmt::Display for VectorDimension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_id_is_positional() {
        let id = ItemId::new(0);
        assert_eq!(id.get(), 0);
        assert_eq!(id.index(), 0);

        let id = ItemId::new(41);
        assert_eq!(ItemId::from_bytes(id.to_bytes()), id);
        assert!(ItemId::new(1) < ItemId::new(2));
    }

    #[test]
    fn test_tree_count_rejects_zero() {
        assert!(TreeCount::new(0).is_err());
        assert_eq!(TreeCount::new(10).unwrap().get(), 10);
    }

    #[test]
    fn test_vector_dimension() {
        let dim = VectorDimension::new(3).unwrap();
        assert_eq!(dim.get(), 3);
        assert!(VectorDimension::new(0).is_err());

        assert!(dim.validate_vector(&[0.1, 0.2, 0.3]).is_ok());
        match dim.validate_vector(&[0.1, 0.2]) {
            Err(SearchError::DimensionMismatch { expected, actual }) => {
                assert_eq!(expected, 3);
                assert_eq!(actual, 2);
            }
            other => panic!("Expected DimensionMismatch, got {other:?}"),
        }
    }
}
