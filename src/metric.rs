//! # Normalized City-Block Distance
//!
//! The single metric used throughout the index: the Manhattan (L1) distance
//! between two equal-length integer vectors divided by their length.
//!
//! ```text
//! distance(a, b) = Σ |a[i] - b[i]| / D
//! ```
//!
//! Per-element differences are accumulated in `i64`, so the sum is exact and
//! the only rounding happens in the final division. The same function computes
//! both the approximate distance to the reference vector (bucket keys, query
//! windows) and the exact distance between a query and a candidate.
//!
//! ## Thread Safety
//!
//! Pure functions with no shared state.

use crate::error::IndexError;

/// Computes the normalized L1 distance, rejecting vectors of different length.
pub fn city_block(a: &[i32], b: &[i32]) -> Result<f64, IndexError> {
    if a.len() != b.len() {
        return Err(IndexError::DimensionMismatch {
            expected: a.len(),
            actual: b.len(),
        });
    }
    Ok(city_block_unchecked(a, b))
}

/// Caller must ensure `a.len() == b.len()`. Empty vectors are at distance 0.
pub fn city_block_unchecked(a: &[i32], b: &[i32]) -> f64 {
    debug_assert_eq!(a.len(), b.len());

    if a.is_empty() {
        return 0.0;
    }

    let total: i64 = a
        .iter()
        .zip(b.iter())
        .map(|(&x, &y)| (i64::from(x) - i64::from(y)).abs())
        .sum();

    total as f64 / a.len() as f64
}
