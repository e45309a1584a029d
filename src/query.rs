//! # Query Engine
//!
//! Answers "all vectors within distance τ of Q" in two phases.
//!
//! ## Phase 1: Windowing
//!
//! The normalized L1 distance is a metric, so for any vector v
//! `|d(ref, Q) - d(ref, v)| <= d(Q, v)`. Every match therefore has a
//! reference distance inside `[a - τ, a + τ]` where `a = d(ref, Q)`:
//!
//! ```text
//! a            = d(ref, Q)
//! min_threshold = a - τ           key_low  = trunc(min_threshold)
//! max_threshold = a + τ           key_high = trunc(max_threshold)
//!
//! candidates   = index.search_range(key_low, Inclusive, key_high, Inclusive)
//! ```
//!
//! Keys are truncated toward zero here while bucket keys are floored at
//! indexing time. The two agree for non-negative thresholds; a negative
//! `min_threshold` truncates up to a key no larger than 0, and bucket keys
//! are never negative, so no partition is missed.
//!
//! ## Phase 2: Scan and Verify
//!
//! Each candidate partition is read in ascending stored distance:
//!
//! ```text
//! d > max_threshold   -> stop this partition (everything after is larger)
//! d < min_threshold   -> skip record (boundary partition)
//! otherwise           -> decode vector, exact = d(Q, v), keep if exact <= τ
//! ```
//!
//! Matches are emitted in partition visit order, then stored-distance order.
//! They are collected for the whole query and handed to the sink once the
//! scan has succeeded.

use std::path::Path;

use eyre::{Result, WrapErr};
use tracing::debug;

use crate::error::IndexError;
use crate::metric::city_block_unchecked;
use crate::partition::{BucketKey, PartitionRef};
use crate::range_index::{RangeIndex, RangePolicy};
use crate::record::{RecordReader, Vector};
use crate::session::SessionContext;
use crate::sink::MatchSink;

/// The float and integer windows derived from a query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QueryWindow {
    pub approximate_distance: f64,
    pub threshold: f64,
    pub min_threshold: f64,
    pub max_threshold: f64,
    pub key_low: BucketKey,
    pub key_high: BucketKey,
}

impl QueryWindow {
    pub fn new(context: &SessionContext, query: &Vector, threshold: f64) -> Result<Self, IndexError> {
        if !threshold.is_finite() || threshold < 0.0 {
            return Err(IndexError::InvalidThreshold(threshold));
        }

        let approximate_distance = context.reference_distance(query)?;
        let min_threshold = approximate_distance - threshold;
        let max_threshold = approximate_distance + threshold;

        // `as` truncates toward zero.
        Ok(Self {
            approximate_distance,
            threshold,
            min_threshold,
            max_threshold,
            key_low: min_threshold as BucketKey,
            key_high: max_threshold as BucketKey,
        })
    }

    pub fn candidates<'a, I: RangeIndex + ?Sized>(&self, index: &'a I) -> Vec<&'a PartitionRef> {
        index.search_range(
            self.key_low,
            RangePolicy::Inclusive,
            self.key_high,
            RangePolicy::Inclusive,
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QueryStats {
    /// Partitions returned by the range index.
    pub candidates: usize,
    /// Records read, including the one that ended a partition early.
    pub scanned: usize,
    /// Records below the float window.
    pub skipped: usize,
    /// Records whose exact distance was computed.
    pub verified: usize,
    pub matches: usize,
    /// Partitions left before their end.
    pub early_stops: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueryOutcome {
    pub window: QueryWindow,
    pub matches: Vec<Vector>,
    pub stats: QueryStats,
}

pub struct QueryEngine<'a, I: RangeIndex + ?Sized> {
    context: &'a SessionContext,
    index: &'a I,
}

impl<'a, I: RangeIndex + ?Sized> QueryEngine<'a, I> {
    pub fn new(context: &'a SessionContext, index: &'a I) -> Self {
        Self { context, index }
    }

    pub fn search(&self, query: &Vector, threshold: f64) -> Result<QueryOutcome> {
        let window = QueryWindow::new(self.context, query, threshold)?;
        let candidates = window.candidates(self.index);

        let mut stats = QueryStats {
            candidates: candidates.len(),
            ..QueryStats::default()
        };
        let mut matches = Vec::new();

        for partition in candidates {
            scan_partition(partition.path(), query, &window, &mut matches, &mut stats)
                .wrap_err_with(|| format!("failed to scan partition: {:?}", partition.path()))?;
        }
        stats.matches = matches.len();

        debug!(
            approximate_distance = window.approximate_distance,
            threshold,
            key_low = window.key_low,
            key_high = window.key_high,
            candidates = stats.candidates,
            scanned = stats.scanned,
            verified = stats.verified,
            matches = stats.matches,
            "query completed"
        );

        Ok(QueryOutcome {
            window,
            matches,
            stats,
        })
    }

    /// Runs the query and appends every match to `sink`.
    pub fn run<S: MatchSink + ?Sized>(
        &self,
        query: &Vector,
        threshold: f64,
        sink: &mut S,
    ) -> Result<QueryStats> {
        let outcome = self.search(query, threshold)?;
        sink.append(&outcome.matches)?;
        Ok(outcome.stats)
    }
}

fn scan_partition(
    path: &Path,
    query: &Vector,
    window: &QueryWindow,
    matches: &mut Vec<Vector>,
    stats: &mut QueryStats,
) -> Result<()> {
    let mut reader = RecordReader::open(path)?;

    while let Some(entry) = reader.next_entry()? {
        stats.scanned += 1;

        if entry.distance > window.max_threshold {
            stats.early_stops += 1;
            break;
        }
        if entry.distance < window.min_threshold {
            stats.skipped += 1;
            continue;
        }

        let candidate = entry.vector()?;
        if candidate.len() != query.len() {
            return Err(IndexError::DimensionMismatch {
                expected: query.len(),
                actual: candidate.len(),
            }
            .into());
        }

        stats.verified += 1;
        let exact = city_block_unchecked(query.as_slice(), candidate.as_slice());
        if exact <= window.threshold {
            matches.push(candidate);
        }
    }

    Ok(())
}
