//! # Range Index
//!
//! Maps bucket keys to partition locations and answers interval lookups.
//! The query engine only needs two operations, captured by [`RangeIndex`]:
//!
//! - `insert(key, location)`
//! - `search_range(low, low_policy, high, high_policy)`
//!
//! ## Entry Policy
//!
//! One entry per distinct `(key, location)` pair. Inserting the same pair
//! again is a no-op, so callers may register a partition once per key or
//! once per record without producing duplicate candidates. Distinct
//! locations under one key are all kept, in insertion order.
//!
//! ## Implementations
//!
//! | Type               | Structure                         | Insert     | Search           |
//! |--------------------|-----------------------------------|------------|------------------|
//! | `BTreeRangeIndex`  | ordered map of key → locations    | O(log n)   | O(log n + k)     |
//! | `SortedArrayIndex` | sorted `(key, location)` array    | O(n)       | O(log n + k)     |
//!
//! Both return matches in ascending key order.

use std::collections::BTreeMap;
use std::ops::Bound;

use smallvec::SmallVec;

use crate::partition::{BucketKey, PartitionRef};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangePolicy {
    Inclusive,
    Exclusive,
}

impl RangePolicy {
    fn bound(self, key: BucketKey) -> Bound<BucketKey> {
        match self {
            RangePolicy::Inclusive => Bound::Included(key),
            RangePolicy::Exclusive => Bound::Excluded(key),
        }
    }
}

/// True when no key can satisfy the interval.
fn is_empty_interval(
    low: BucketKey,
    low_policy: RangePolicy,
    high: BucketKey,
    high_policy: RangePolicy,
) -> bool {
    low > high
        || (low == high
            && (low_policy == RangePolicy::Exclusive || high_policy == RangePolicy::Exclusive))
}

pub trait RangeIndex {
    fn insert(&mut self, key: BucketKey, location: PartitionRef);

    fn search_range(
        &self,
        low: BucketKey,
        low_policy: RangePolicy,
        high: BucketKey,
        high_policy: RangePolicy,
    ) -> Vec<&PartitionRef>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Default, Clone)]
pub struct BTreeRangeIndex {
    entries: BTreeMap<BucketKey, SmallVec<[PartitionRef; 1]>>,
    len: usize,
}

impl BTreeRangeIndex {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RangeIndex for BTreeRangeIndex {
    fn insert(&mut self, key: BucketKey, location: PartitionRef) {
        let locations = self.entries.entry(key).or_default();
        if !locations.contains(&location) {
            locations.push(location);
            self.len += 1;
        }
    }

    fn search_range(
        &self,
        low: BucketKey,
        low_policy: RangePolicy,
        high: BucketKey,
        high_policy: RangePolicy,
    ) -> Vec<&PartitionRef> {
        if is_empty_interval(low, low_policy, high, high_policy) {
            return Vec::new();
        }

        self.entries
            .range((low_policy.bound(low), high_policy.bound(high)))
            .flat_map(|(_, locations)| locations.iter())
            .collect()
    }

    fn len(&self) -> usize {
        self.len
    }
}

#[derive(Debug, Default, Clone)]
pub struct SortedArrayIndex {
    entries: Vec<(BucketKey, PartitionRef)>,
}

impl SortedArrayIndex {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RangeIndex for SortedArrayIndex {
    fn insert(&mut self, key: BucketKey, location: PartitionRef) {
        let start = self.entries.partition_point(|(k, _)| *k < key);
        let end = self.entries.partition_point(|(k, _)| *k <= key);
        if self.entries[start..end].iter().any(|(_, l)| *l == location) {
            return;
        }
        self.entries.insert(end, (key, location));
    }

    fn search_range(
        &self,
        low: BucketKey,
        low_policy: RangePolicy,
        high: BucketKey,
        high_policy: RangePolicy,
    ) -> Vec<&PartitionRef> {
        if is_empty_interval(low, low_policy, high, high_policy) {
            return Vec::new();
        }

        let start = match low_policy {
            RangePolicy::Inclusive => self.entries.partition_point(|(k, _)| *k < low),
            RangePolicy::Exclusive => self.entries.partition_point(|(k, _)| *k <= low),
        };
        let end = match high_policy {
            RangePolicy::Inclusive => self.entries.partition_point(|(k, _)| *k <= high),
            RangePolicy::Exclusive => self.entries.partition_point(|(k, _)| *k < high),
        };

        self.entries[start..end.max(start)]
            .iter()
            .map(|(_, location)| location)
            .collect()
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}
