//! # Sessions
//!
//! A [`Session`] is one indexed dataset: its [`SessionContext`], the sorted
//! partition files in its private directory, and the range index over them. It is
//! produced by [`SessionBuilder`] and answers any number of queries.
//!
//! ## Lifetime
//!
//! ```text
//! SessionBuilder::index_file ──> Session ──> query, query, ... ──> close / drop
//!                                   │                                   │
//!                         partitions created                  partitions removed
//! ```
//!
//! The partitions live in a directory of their own inside the workspace,
//! created fresh for each session and removed with it:
//!
//! ```text
//! workspace/
//! ├── images.csv
//! ├── .cityblock-a1B2c3/        # session A
//! │   ├── keyFile5.csv
//! │   └── keyFile255.csv
//! └── .cityblock-x9Y8z7/        # session B, same workspace
//!     └── keyFile4.csv
//! ```
//!
//! Sessions sharing a workspace never see each other's files. Queries never
//! modify the partitions or the index. Match sinks live outside the session
//! and survive it.
//!
//! ## Empty Datasets
//!
//! A dataset with no records yields a session with no context and an empty
//! index. Queries against it return no matches and skip the dimensionality
//! check; callers that consider this an error can test [`Session::is_empty`].

mod builder;
mod context;

pub use builder::SessionBuilder;
pub use context::SessionContext;

use std::path::{Path, PathBuf};
use std::time::Duration;

use eyre::{Result, WrapErr};
use tempfile::TempDir;

use crate::error::IndexError;
use crate::partition::{BucketKey, PartitionSet};
use crate::query::{QueryEngine, QueryStats};
use crate::range_index::{BTreeRangeIndex, RangeIndex};
use crate::record::Vector;
use crate::sink::MatchSink;

/// Counters gathered while indexing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IndexStats {
    pub records: usize,
    pub partitions: usize,
    pub chunks: usize,
    pub merge_rounds: usize,
    /// Wall time of the whole indexing pipeline.
    pub elapsed: Duration,
}

#[derive(Debug)]
pub struct Session<I: RangeIndex = BTreeRangeIndex> {
    workspace: PathBuf,
    context: Option<SessionContext>,
    keys: Vec<BucketKey>,
    partitions: PartitionSet,
    // Declared after `partitions` so the files go before their directory.
    partition_dir: TempDir,
    index: I,
    stats: IndexStats,
}

impl Session {
    pub fn builder() -> SessionBuilder {
        SessionBuilder::new()
    }
}

impl<I: RangeIndex> Session<I> {
    pub fn context(&self) -> Option<&SessionContext> {
        self.context.as_ref()
    }

    pub fn dimensionality(&self) -> Option<usize> {
        self.context.as_ref().map(SessionContext::dimensionality)
    }

    pub fn is_empty(&self) -> bool {
        self.context.is_none()
    }

    pub fn record_count(&self) -> usize {
        self.keys.len()
    }

    /// Bucket key of every dataset record, in dataset order.
    pub fn produced_keys(&self) -> &[BucketKey] {
        &self.keys
    }

    pub fn partitions(&self) -> &PartitionSet {
        &self.partitions
    }

    pub fn index(&self) -> &I {
        &self.index
    }

    pub fn workspace(&self) -> &Path {
        &self.workspace
    }

    /// Directory holding this session's partition files.
    pub fn partition_dir(&self) -> &Path {
        self.partition_dir.path()
    }

    pub fn stats(&self) -> IndexStats {
        self.stats
    }

    /// Parses one query line and checks it against the session's
    /// dimensionality.
    pub fn parse_query(&self, line: &str) -> Result<Vector, IndexError> {
        let vector = Vector::parse(line.trim(), 1)?;
        if let Some(context) = &self.context {
            context.check_dimensionality(&vector)?;
        }
        Ok(vector)
    }

    /// Returns every indexed vector within `threshold` of `query`.
    pub fn search(&self, query: &Vector, threshold: f64) -> Result<Vec<Vector>> {
        let mut matches = Vec::new();
        self.query(query, threshold, &mut matches)?;
        Ok(matches)
    }

    /// Runs a query and appends its matches to `sink`.
    pub fn query<S: MatchSink + ?Sized>(
        &self,
        query: &Vector,
        threshold: f64,
        sink: &mut S,
    ) -> Result<QueryStats> {
        match &self.context {
            Some(context) => QueryEngine::new(context, &self.index).run(query, threshold, sink),
            None => {
                if !threshold.is_finite() || threshold < 0.0 {
                    return Err(IndexError::InvalidThreshold(threshold).into());
                }
                sink.append(&[])?;
                Ok(QueryStats::default())
            }
        }
    }

    /// Removes every partition file and the partition directory. Dropping a
    /// session does the same on a best-effort basis; `close` reports the
    /// first failure.
    pub fn close(self) -> Result<()> {
        let Session {
            mut partitions,
            partition_dir,
            ..
        } = self;
        partitions.remove_all()?;
        let path = partition_dir.path().to_path_buf();
        partition_dir
            .close()
            .wrap_err_with(|| format!("failed to remove partition directory: {:?}", path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use std::io::Cursor;
    use tempfile::tempdir;

    fn index(dir: &Path, dataset: &str) -> Session {
        Session::builder()
            .workspace(dir)
            .index_reader(Cursor::new(dataset.to_string()))
            .unwrap()
    }

    #[test]
    fn session_reports_produced_keys_in_dataset_order() {
        let dir = tempdir().unwrap();
        let session = index(dir.path(), "250,250,250\n0,0,0\n200,200,200\n251,251,251\n");

        assert_eq!(session.produced_keys(), &[5, 255, 55, 4]);
        assert_eq!(session.record_count(), 4);
        assert_eq!(session.dimensionality(), Some(3));
        assert_eq!(session.partitions().keys().collect::<Vec<_>>(), vec![4, 5, 55, 255]);
        assert_eq!(session.index().len(), 4);
    }

    #[test]
    fn parse_query_checks_dimensionality() {
        let dir = tempdir().unwrap();
        let session = index(dir.path(), "1,2,3\n");

        assert_eq!(session.parse_query(" 4,5,6\n").unwrap(), Vector::new(vec![4, 5, 6]));
        assert_eq!(
            session.parse_query("4,5").unwrap_err(),
            IndexError::DimensionMismatch {
                expected: 3,
                actual: 2
            }
        );
        assert_eq!(
            session.parse_query("4,x,6").unwrap_err().kind(),
            ErrorKind::MalformedRecord
        );
    }

    #[test]
    fn empty_session_answers_nothing() {
        let dir = tempdir().unwrap();
        let session = index(dir.path(), "\n\n");

        assert!(session.is_empty());
        assert!(session.index().is_empty());
        let matches = session.search(&Vector::new(vec![1, 2]), 10.0).unwrap();
        assert!(matches.is_empty());
        assert!(session.search(&Vector::new(vec![1]), -1.0).is_err());
    }

    #[test]
    fn close_removes_partitions_and_keeps_other_files() {
        let dir = tempdir().unwrap();
        let sink_path = dir.path().join("matches.csv");
        std::fs::write(&sink_path, "").unwrap();
        let session = index(dir.path(), "250,250,250\n0,0,0\n");
        let paths: Vec<PathBuf> = session
            .partitions()
            .iter()
            .map(|p| p.path().to_path_buf())
            .collect();
        assert_eq!(paths.len(), 2);

        let partition_dir = session.partition_dir().to_path_buf();
        assert!(paths.iter().all(|p| p.parent() == Some(partition_dir.as_path())));

        session.close().unwrap();

        assert!(paths.iter().all(|p| !p.exists()));
        assert!(!partition_dir.exists());
        assert!(sink_path.exists());
    }

    #[test]
    fn drop_removes_partitions() {
        let dir = tempdir().unwrap();
        let (path, partition_dir) = {
            let session = index(dir.path(), "250,250,250\n");
            (
                session.partitions().get(5).unwrap().path().to_path_buf(),
                session.partition_dir().to_path_buf(),
            )
        };
        assert!(!path.exists());
        assert!(!partition_dir.exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn sessions_in_one_workspace_keep_separate_partitions() {
        let dir = tempdir().unwrap();
        let first = index(dir.path(), "250,250,250\n");
        let second = index(dir.path(), "251,249,250\n");

        assert_ne!(first.partition_dir(), second.partition_dir());
        let target = Vector::new(vec![250, 250, 250]);
        assert_eq!(first.search(&target, 0.0).unwrap(), vec![target.clone()]);

        second.close().unwrap();

        assert_eq!(first.search(&target, 0.0).unwrap(), vec![target.clone()]);
    }
}
