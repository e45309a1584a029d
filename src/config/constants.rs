//! # cityblock Configuration Constants
//!
//! This module centralizes the numeric and naming constants shared by the
//! bucketizer, the external sorter and the query engine. Constants that
//! depend on each other are co-located and their relationships are enforced
//! through compile-time assertions.
//!
//! ## Dependency Graph
//!
//! ```text
//! MAX_CHANNEL_VALUE (255)
//!       │
//!       └─> MAX_BUCKET_KEY (== MAX_CHANNEL_VALUE)
//!             The distance to the all-255 reference is bounded by 255 for
//!             channel values in [0, 255], so bucket keys lie in [0, 255].
//!             Out-of-range channel values are accepted and simply produce
//!             keys outside this range.
//!
//! DEFAULT_CHUNK_CAPACITY (10,000 records)
//!       │
//!       └─> MIN_CHUNK_CAPACITY (1, must be <=)
//!             A chunk must hold at least one record or the sorter
//!             cannot make progress.
//!
//! MAX_MERGE_FAN_IN (64 runs)
//!       │
//!       └─> MIN_MERGE_FAN_IN (2, must be <=)
//!             A merge pass must combine at least two runs.
//!
//! MAX_OPEN_PARTITION_WRITERS (64 files)
//!       Writers beyond this are closed and reopened in append mode.
//!
//! PARTITION_DIR_PREFIX
//!       │
//!       └─> <workspace>/.cityblock-XXXXXX/keyFile<key>.csv
//!             One private directory per session.
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! use crate::config::{DEFAULT_CHUNK_CAPACITY, MAX_CHANNEL_VALUE};
//! ```

// ============================================================================
// REFERENCE VECTOR
// ============================================================================

/// Value of every element of the reference vector (a fully white pixel).
pub const MAX_CHANNEL_VALUE: i32 = 255;

/// Largest bucket key produced by in-range channel values.
pub const MAX_BUCKET_KEY: i64 = MAX_CHANNEL_VALUE as i64;

const _: () = assert!(
    MAX_BUCKET_KEY == MAX_CHANNEL_VALUE as i64,
    "MAX_BUCKET_KEY must track MAX_CHANNEL_VALUE"
);

// ============================================================================
// EXTERNAL SORT
// ============================================================================

/// Number of records sorted in memory at once by the external sorter.
pub const DEFAULT_CHUNK_CAPACITY: usize = 10_000;

/// Smallest accepted chunk capacity.
pub const MIN_CHUNK_CAPACITY: usize = 1;

const _: () = assert!(
    DEFAULT_CHUNK_CAPACITY >= MIN_CHUNK_CAPACITY,
    "DEFAULT_CHUNK_CAPACITY must be at least MIN_CHUNK_CAPACITY"
);

/// Runs a k-way merge reads at once before folding them into one run.
pub const MAX_MERGE_FAN_IN: usize = 64;

pub const MIN_MERGE_FAN_IN: usize = 2;

const _: () = assert!(
    MAX_MERGE_FAN_IN >= MIN_MERGE_FAN_IN,
    "MAX_MERGE_FAN_IN must be at least MIN_MERGE_FAN_IN"
);

/// Partition files the bucketizer keeps open at once.
pub const MAX_OPEN_PARTITION_WRITERS: usize = 64;

const _: () = assert!(
    MAX_OPEN_PARTITION_WRITERS >= 1,
    "the bucketizer needs at least one open writer"
);

/// Buffer size for partition readers and writers (64KB).
pub const IO_BUFFER_SIZE: usize = 64 * 1024;

// ============================================================================
// FILE NAMING
// ============================================================================

/// Partition files are named `keyFile<key>.csv`.
pub const PARTITION_FILE_PREFIX: &str = "keyFile";

pub const PARTITION_FILE_EXTENSION: &str = "csv";

/// Prefix of the per-session directory created inside the workspace.
pub const PARTITION_DIR_PREFIX: &str = ".cityblock-";

/// Prefix of merge scratch files created next to the partition being sorted.
pub const SCRATCH_FILE_PREFIX: &str = ".cityblock-sort-";

/// Default name of the append-only match sink.
pub const MATCH_SINK_FILE_NAME: &str = "ImagesWithinThreshold.csv";

// ============================================================================
// RECORD FORMAT
// ============================================================================

/// Separates the distance field from the vector field in a partition line.
pub const FIELD_DELIMITER: char = ' ';

/// Separates vector elements.
pub const ELEMENT_DELIMITER: char = ',';

const _: () = assert!(
    FIELD_DELIMITER != ELEMENT_DELIMITER,
    "field and element delimiters must differ"
);
