//! # cityblock - Distance-Bucketed Range Search over Integer Vectors
//!
//! cityblock answers "find every vector within city-block distance τ of a
//! query" over datasets that do not fit in memory. Vectors are bucketed by
//! their distance to a fixed reference vector, each bucket is sorted on disk,
//! and a query only opens the buckets its triangle-inequality window can
//! reach.
//!
//! ## Quick Start
//!
//! ```ignore
//! use cityblock::{FileSink, Session};
//!
//! let session = Session::builder()
//!     .chunk_capacity(10_000)
//!     .index_file("datasets/images.csv")?;
//!
//! let query = session.parse_query("248,248,248")?;
//! let mut sink = FileSink::new("datasets/ImagesWithinThreshold.csv");
//! session.query(&query, 5.0, &mut sink)?;
//!
//! session.close()?;
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │      CLI (bin/cityblock.rs, cli/)        │
//! ├─────────────────────────────────────────┤
//! │     Session / SessionBuilder             │
//! ├────────────────────┬────────────────────┤
//! │   Query Engine     │    Range Index     │
//! ├────────────────────┴────────────────────┤
//! │   Bucketizer       │  External Sorter   │
//! ├─────────────────────────────────────────┤
//! │   Record Codec     │  Partition Files   │
//! ├─────────────────────────────────────────┤
//! │   Distance Metric  │  Session Context   │
//! └─────────────────────────────────────────┘
//! ```
//!
//! ## File Layout
//!
//! ```text
//! workspace/
//! ├── images.csv                      # dataset (input, untouched)
//! ├── .cityblock-XXXXXX/              # one per session, removed with it
//! │   ├── keyFile0.csv                # partition: 0 <= d(ref, v) < 1
//! │   ├── keyFile5.csv                # partition: 5 <= d(ref, v) < 6
//! │   ├── ...
//! │   └── .cityblock-sort-XXXX.tmp    # sort scratch (only during indexing)
//! └── ImagesWithinThreshold.csv       # match sink (append-only, survives the session)
//! ```
//!
//! ## Module Overview
//!
//! - [`metric`]: normalized L1 distance
//! - [`record`]: vectors, distance records and the partition line format
//! - [`partition`]: bucket keys, partition naming and file lifetime
//! - [`bucketizer`]: dataset → unsorted partitions
//! - [`sorter`]: bounded-memory external sort of one partition
//! - [`range_index`]: bucket key → partition lookup
//! - [`query`]: windowing, early-terminating scan, exact verification
//! - [`sink`]: match destinations
//! - [`session`]: indexing pipeline and session lifetime
//! - [`cli`]: interactive shell

pub mod bucketizer;
pub mod cli;
pub mod config;
pub mod error;
pub mod metric;
pub mod partition;
pub mod query;
pub mod range_index;
pub mod record;
pub mod session;
pub mod sink;
pub mod sorter;

pub use error::{classify, ErrorKind, IndexError};
pub use metric::city_block;
pub use partition::{BucketKey, PartitionRef};
pub use query::{QueryEngine, QueryOutcome, QueryStats, QueryWindow};
pub use range_index::{BTreeRangeIndex, RangeIndex, RangePolicy, SortedArrayIndex};
pub use record::{DistanceRecord, Vector};
pub use session::{IndexStats, Session, SessionBuilder, SessionContext};
pub use sink::{FileSink, MatchSink};
pub use sorter::{ExternalSorter, MergeStrategy, SortStats};
