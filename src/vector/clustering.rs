//! Two-means clustering used to pick split hyperplanes for the forest.
//!
//! Each internal tree node separates its items with the hyperplane halfway
//! between two centroids found by a short two-means run over a random sample.
//! Centroids live on the unit sphere, so the split follows angular distance.
//!
//! # Algorithm Details
//! - Distance metric: cosine similarity
//! - Initialization: two distinct random items
//! - Refinement passes: [`REFINEMENT_ITERATIONS`] over random samples

use rand::Rng;
use rand::rngs::StdRng;

/// Number of refinement steps when computing a two-means split.
pub const REFINEMENT_ITERATIONS: usize = 200;

/// Epsilon for floating-point comparisons.
const EPSILON: f32 = 1e-12;

/// Computes cosine similarity between two vectors.
///
/// # Returns
/// * Cosine similarity in range [-1, 1], where 1 is most similar.
///   Zero vectors have similarity 0.0 to everything.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len(), "Vectors must have same dimension");

    let norm_a = l2_norm(a);
    let norm_b = l2_norm(b);

    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot(a, b) / (norm_a * norm_b)
    }
}

/// Angular distance `sqrt(2 - 2 cos(a, b))`, the Euclidean distance between
/// the two vectors after projecting them onto the unit sphere.
///
/// Range is [0, 2]; 0 means same direction.
pub fn angular_distance(a: &[f32], b: &[f32]) -> f32 {
    (2.0 - 2.0 * cosine_similarity(a, b)).max(0.0).sqrt()
}

pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Euclidean (L2) norm.
pub fn l2_norm(vector: &[f32]) -> f32 {
    vector.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Normalizes a vector in-place to unit length.
///
/// Vectors whose norm is below epsilon are left unchanged, so a zero
/// vector stays a zero vector instead of turning into NaNs.
pub fn normalize_vector(vector: &mut [f32]) {
    let norm = l2_norm(vector);
    if norm > EPSILON {
        for value in vector.iter_mut() {
            *value /= norm;
        }
    }
}

/// Creates a normalized copy of a vector.
pub fn normalize_vector_copy(vector: &[f32]) -> Vec<f32> {
    let mut normalized = vector.to_vec();
    normalize_vector(&mut normalized);
    normalized
}

/// Computes the normal of the hyperplane separating `points` into two groups.
///
/// The returned vector has unit length when the points are not all
/// colinear; otherwise it may be the zero vector, which callers treat as
/// a degenerate split.
///
/// # Panics
/// Panics in debug builds if fewer than two points are given.
pub fn two_means_normal(points: &[&[f32]], rng: &mut StdRng) -> Vec<f32> {
    debug_assert!(points.len() >= 2, "two-means needs at least two points");

    let count = points.len();
    let first = rng.random_range(0..count);
    let mut second = rng.random_range(0..count - 1);
    // Skip over the first pick so the seeds are distinct
    if second >= first {
        second += 1;
    }

    let mut p = normalize_vector_copy(points[first]);
    let mut q = normalize_vector_copy(points[second]);
    let mut p_weight = 1.0f32;
    let mut q_weight = 1.0f32;

    for _ in 0..REFINEMENT_ITERATIONS {
        let candidate = normalize_vector_copy(points[rng.random_range(0..count)]);
        let to_p = p_weight * angular_distance(&p, &candidate);
        let to_q = q_weight * angular_distance(&q, &candidate);

        if to_p < to_q {
            move_centroid(&mut p, &mut p_weight, &candidate);
        } else if to_q < to_p {
            move_centroid(&mut q, &mut q_weight, &candidate);
        }
    }

    let mut normal: Vec<f32> = p.iter().zip(q.iter()).map(|(a, b)| a - b).collect();
    normalize_vector(&mut normal);
    normal
}

/// Running-mean update of a centroid toward a new point.
fn move_centroid(centroid: &mut [f32], weight: &mut f32, point: &[f32]) {
    for (c, &x) in centroid.iter_mut().zip(point.iter()) {
        *c = (*c * *weight + x) / (*weight + 1.0);
    }
    *weight += 1.0;
}
