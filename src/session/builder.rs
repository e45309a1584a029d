//! # Session Builder
//!
//! `SessionBuilder` configures and runs the indexing pipeline that turns a
//! dataset into a queryable [`Session`].
//!
//! ## Pipeline
//!
//! ```text
//! dataset ──> Bucketizer ──> .cityblock-XXXXXX/keyFile{k}.csv (unsorted)
//!                                 │
//!                          ExternalSorter (per partition)
//!                                 │
//!                                 ▼
//!                   keyFile{k}.csv (sorted) ──> RangeIndex.insert(k, ref)
//! ```
//!
//! Every stage runs to completion before the next begins. The partitions
//! go into a fresh `.cityblock-XXXXXX` directory inside the workspace, so
//! several sessions can share one workspace. If any stage fails, that
//! directory and everything in it are removed before the error is returned.
//!
//! ## Configuration Options
//!
//! | Option          | Default                    | Description                          |
//! |-----------------|----------------------------|--------------------------------------|
//! | workspace       | dataset's directory        | Parent of the partition directory    |
//! | chunk_capacity  | 10_000                     | Records held in memory while sorting |
//! | merge_strategy  | `MergeStrategy::Pairwise`  | How sorted chunks are combined       |
//!
//! ## Usage Examples
//!
//! ```ignore
//! let session = Session::builder()
//!     .chunk_capacity(1_000)
//!     .index_file("datasets/images.csv")?;
//! ```
//!
//! ```ignore
//! let session = Session::builder()
//!     .workspace("/tmp/cityblock")
//!     .merge_strategy(MergeStrategy::KWay)
//!     .index_reader(Cursor::new("250,250,250\n0,0,0\n"))?;
//! ```

use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::time::Instant;

use eyre::{eyre, Result, WrapErr};
use tracing::info;

use crate::bucketizer::Bucketizer;
use crate::config::{DEFAULT_CHUNK_CAPACITY, IO_BUFFER_SIZE, PARTITION_DIR_PREFIX};
use crate::range_index::{BTreeRangeIndex, RangeIndex};
use crate::sorter::{ExternalSorter, MergeStrategy, SortStats};

use super::{IndexStats, Session};

#[derive(Debug, Clone)]
pub struct SessionBuilder {
    workspace: Option<PathBuf>,
    chunk_capacity: usize,
    merge_strategy: MergeStrategy,
}

impl Default for SessionBuilder {
    fn default() -> Self {
        Self {
            workspace: None,
            chunk_capacity: DEFAULT_CHUNK_CAPACITY,
            merge_strategy: MergeStrategy::default(),
        }
    }
}

impl SessionBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn workspace<P: AsRef<Path>>(mut self, dir: P) -> Self {
        self.workspace = Some(dir.as_ref().to_path_buf());
        self
    }

    pub fn chunk_capacity(mut self, records: usize) -> Self {
        self.chunk_capacity = records;
        self
    }

    pub fn merge_strategy(mut self, strategy: MergeStrategy) -> Self {
        self.merge_strategy = strategy;
        self
    }

    /// Indexes the dataset at `path`. Without an explicit workspace the
    /// partitions are written next to the dataset.
    pub fn index_file<P: AsRef<Path>>(self, path: P) -> Result<Session> {
        self.index_file_with(path, BTreeRangeIndex::new())
    }

    pub fn index_file_with<P: AsRef<Path>, I: RangeIndex>(
        mut self,
        path: P,
        index: I,
    ) -> Result<Session<I>> {
        let path = path.as_ref();
        if self.workspace.is_none() {
            let parent = match path.parent() {
                Some(parent) if !parent.as_os_str().is_empty() => parent,
                _ => Path::new("."),
            };
            self.workspace = Some(parent.to_path_buf());
        }

        let file =
            File::open(path).wrap_err_with(|| format!("failed to open dataset: {:?}", path))?;
        self.index_reader_with(BufReader::with_capacity(IO_BUFFER_SIZE, file), index)
    }

    /// Indexes a dataset from any buffered reader. The workspace must be set.
    pub fn index_reader<R: BufRead>(self, reader: R) -> Result<Session> {
        self.index_reader_with(reader, BTreeRangeIndex::new())
    }

    pub fn index_reader_with<R: BufRead, I: RangeIndex>(
        self,
        reader: R,
        mut index: I,
    ) -> Result<Session<I>> {
        let start = Instant::now();
        let workspace = self
            .workspace
            .ok_or_else(|| eyre!("a workspace directory is required to index a reader"))?;
        let sorter =
            ExternalSorter::new(self.chunk_capacity)?.with_strategy(self.merge_strategy);

        fs::create_dir_all(&workspace)
            .wrap_err_with(|| format!("failed to create workspace: {:?}", workspace))?;

        let partition_dir = tempfile::Builder::new()
            .prefix(PARTITION_DIR_PREFIX)
            .tempdir_in(&workspace)
            .wrap_err_with(|| format!("failed to create partition directory in: {:?}", workspace))?;

        let output = Bucketizer::new(partition_dir.path()).run(reader)?;

        let mut sorted = SortStats::default();
        for partition in output.partitions.iter() {
            let stats = sorter.sort_partition(partition.path())?;
            sorted.chunks += stats.chunks;
            sorted.merge_rounds += stats.merge_rounds;
        }

        for partition in output.partitions.iter() {
            index.insert(partition.key(), partition.clone());
        }

        let stats = IndexStats {
            records: output.record_count(),
            partitions: output.partitions.len(),
            chunks: sorted.chunks,
            merge_rounds: sorted.merge_rounds,
            elapsed: start.elapsed(),
        };

        info!(
            dir = ?partition_dir.path(),
            records = stats.records,
            partitions = stats.partitions,
            chunks = stats.chunks,
            merge_rounds = stats.merge_rounds,
            strategy = ?sorter.strategy(),
            elapsed_ms = stats.elapsed.as_millis() as u64,
            "dataset indexed"
        );

        Ok(Session {
            workspace,
            context: output.context,
            keys: output.keys,
            partitions: output.partitions,
            partition_dir,
            index,
            stats,
        })
    }
}
