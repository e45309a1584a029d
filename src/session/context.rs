//! # Session Context
//!
//! The read-only state shared by every component of one indexing session:
//! the dimensionality D fixed by the first dataset record, and the reference
//! vector (D copies of [`MAX_CHANNEL_VALUE`]) that anchors every approximate
//! distance. A context is built once and only borrowed afterwards, so
//! independent sessions never share state.

use crate::config::MAX_CHANNEL_VALUE;
use crate::error::IndexError;
use crate::metric::city_block_unchecked;
use crate::partition::{bucket_key, BucketKey};
use crate::record::Vector;

#[derive(Debug, Clone, PartialEq)]
pub struct SessionContext {
    reference: Vector,
}

impl SessionContext {
    pub fn new(dimensionality: usize) -> Self {
        Self {
            reference: Vector::new(vec![MAX_CHANNEL_VALUE; dimensionality]),
        }
    }

    pub fn dimensionality(&self) -> usize {
        self.reference.len()
    }

    pub fn reference(&self) -> &Vector {
        &self.reference
    }

    pub fn check_dimensionality(&self, vector: &Vector) -> Result<(), IndexError> {
        if vector.len() != self.dimensionality() {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimensionality(),
                actual: vector.len(),
            });
        }
        Ok(())
    }

    /// Distance from the reference vector to `vector`.
    pub fn reference_distance(&self, vector: &Vector) -> Result<f64, IndexError> {
        self.check_dimensionality(vector)?;
        Ok(city_block_unchecked(
            self.reference.as_slice(),
            vector.as_slice(),
        ))
    }

    pub fn locate(&self, vector: &Vector) -> Result<(f64, BucketKey), IndexError> {
        let distance = self.reference_distance(vector)?;
        Ok((distance, bucket_key(distance)))
    }
}
