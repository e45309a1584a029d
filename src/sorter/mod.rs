//! # External Sorter
//!
//! Brings a partition file into ascending-distance order while holding at
//! most `chunk_capacity` records in memory. Partitions can be arbitrarily
//! larger than that bound.
//!
//! ## Algorithm (pairwise, default)
//!
//! ```text
//! partition:  [ chunk 1 ][ chunk 2 ][ chunk 3 ] ... [ chunk K ]
//!                  │          │          │
//!                sort       sort       sort          (stable, in memory)
//!                  │          │          │
//!                  ▼          │          │
//!              acc_1 ──merge──┘          │
//!                  ▼                     │
//!              acc_2 ───────merge────────┘
//!                  ▼
//!                 ...  ──> acc_K replaces the partition file
//! ```
//!
//! Each chunk is read, sorted with a stable sort and merged into the
//! accumulated run; ties favor the accumulated side, so equal distances keep
//! their original file order across all rounds.
//!
//! ## Algorithm (k-way)
//!
//! [`MergeStrategy::KWay`] writes every sorted chunk as its own run and merges
//! runs through a binary heap. Ties go to the earlier run. At most
//! `max_fan_in` runs are open at once: when that many have accumulated they
//! are merged into a single run that takes their place at the front.
//!
//! ```text
//! runs: [r1 r2 r3 r4]  --fan-in reached-->  [m1]  ->  [m1 r5 r6 r7]  -> ...
//! ```
//!
//! The output is byte-identical to the pairwise strategy.
//!
//! ## Failure Behavior
//!
//! Runs and the final stream are `tempfile` scratch files next to the
//! partition. The final stream is renamed over the partition only after it
//! is complete, so a failed sort leaves the original file untouched, and
//! every scratch file is deleted on every exit path. The replacement takes
//! over the original file's permissions.
//!
//! ## Memory Bound
//!
//! One chunk of records plus, for k-way, one record per run.

mod merge;

use std::fs;
use std::io::BufRead;
use std::path::Path;

use eyre::{ensure, Result, WrapErr};
use tempfile::NamedTempFile;
use tracing::debug;

use crate::config::{
    DEFAULT_CHUNK_CAPACITY, MAX_MERGE_FAN_IN, MIN_CHUNK_CAPACITY, MIN_MERGE_FAN_IN,
};
use crate::record::{DistanceRecord, RecordReader};

use merge::{merge_runs, merge_two, write_run};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MergeStrategy {
    /// Sort chunk i, then merge it into the accumulated run.
    #[default]
    Pairwise,
    /// Write every sorted chunk as a run, then merge runs through a heap,
    /// at most `max_fan_in` at a time.
    KWay,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SortStats {
    pub records: usize,
    pub chunks: usize,
    pub merge_rounds: usize,
}

#[derive(Debug, Clone, Copy)]
pub struct ExternalSorter {
    chunk_capacity: usize,
    strategy: MergeStrategy,
    max_fan_in: usize,
}

impl Default for ExternalSorter {
    fn default() -> Self {
        Self {
            chunk_capacity: DEFAULT_CHUNK_CAPACITY,
            strategy: MergeStrategy::default(),
            max_fan_in: MAX_MERGE_FAN_IN,
        }
    }
}

impl ExternalSorter {
    pub fn new(chunk_capacity: usize) -> Result<Self> {
        ensure!(
            chunk_capacity >= MIN_CHUNK_CAPACITY,
            "chunk capacity must be at least {}, got {}",
            MIN_CHUNK_CAPACITY,
            chunk_capacity
        );
        Ok(Self {
            chunk_capacity,
            ..Self::default()
        })
    }

    pub fn with_strategy(mut self, strategy: MergeStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Caps the number of runs a k-way merge reads at once. Values below
    /// 2 are raised to 2.
    pub fn with_max_fan_in(mut self, runs: usize) -> Self {
        self.max_fan_in = runs.max(MIN_MERGE_FAN_IN);
        self
    }

    pub fn max_fan_in(&self) -> usize {
        self.max_fan_in
    }

    pub fn chunk_capacity(&self) -> usize {
        self.chunk_capacity
    }

    pub fn strategy(&self) -> MergeStrategy {
        self.strategy
    }

    /// Sorts the partition file at `path` in place.
    pub fn sort_partition(&self, path: &Path) -> Result<SortStats> {
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let (sorted, stats) = {
            let mut reader = RecordReader::open(path)?;
            match self.strategy {
                MergeStrategy::Pairwise => self.sort_pairwise(dir, &mut reader)?,
                MergeStrategy::KWay => self.sort_kway(dir, &mut reader)?,
            }
        };

        if let Some(sorted) = sorted {
            let permissions = fs::metadata(path)
                .wrap_err_with(|| format!("failed to stat partition file: {:?}", path))?
                .permissions();
            sorted
                .as_file()
                .set_permissions(permissions)
                .wrap_err_with(|| format!("failed to copy partition permissions: {:?}", path))?;
            sorted
                .persist(path)
                .map_err(|err| err.error)
                .wrap_err_with(|| format!("failed to replace partition file: {:?}", path))?;
        }

        debug!(
            path = %path.display(),
            records = stats.records,
            chunks = stats.chunks,
            merge_rounds = stats.merge_rounds,
            strategy = ?self.strategy,
            "partition sorted"
        );

        Ok(stats)
    }

    fn sort_pairwise<R: BufRead>(
        &self,
        dir: &Path,
        reader: &mut RecordReader<R>,
    ) -> Result<(Option<NamedTempFile>, SortStats)> {
        let mut stats = SortStats::default();
        let mut chunk = Vec::with_capacity(self.initial_chunk_allocation());
        let mut accumulated: Option<NamedTempFile> = None;

        while self.fill_chunk(reader, &mut chunk)? {
            stats.chunks += 1;
            stats.records += chunk.len();
            chunk.sort_by(DistanceRecord::cmp_distance);

            accumulated = Some(match accumulated.take() {
                None => write_run(dir, &chunk)?,
                Some(left) => {
                    stats.merge_rounds += 1;
                    merge_two(dir, left, &chunk)?
                }
            });
        }

        Ok((accumulated, stats))
    }

    fn sort_kway<R: BufRead>(
        &self,
        dir: &Path,
        reader: &mut RecordReader<R>,
    ) -> Result<(Option<NamedTempFile>, SortStats)> {
        let mut stats = SortStats::default();
        let mut chunk = Vec::with_capacity(self.initial_chunk_allocation());
        let mut runs = Vec::new();

        while self.fill_chunk(reader, &mut chunk)? {
            stats.chunks += 1;
            stats.records += chunk.len();
            chunk.sort_by(DistanceRecord::cmp_distance);
            runs.push(write_run(dir, &chunk)?);

            if runs.len() >= self.max_fan_in {
                let merged = merge_runs(dir, &runs)?;
                runs.clear();
                runs.push(merged);
                stats.merge_rounds += 1;
            }
        }

        let sorted = match runs.len() {
            0 => None,
            1 => runs.pop(),
            _ => {
                stats.merge_rounds += 1;
                Some(merge_runs(dir, &runs)?)
            }
        };

        Ok((sorted, stats))
    }

    /// Refills `chunk` with up to `chunk_capacity` records. Returns false at EOF.
    fn fill_chunk<R: BufRead>(
        &self,
        reader: &mut RecordReader<R>,
        chunk: &mut Vec<DistanceRecord>,
    ) -> Result<bool> {
        chunk.clear();
        while chunk.len() < self.chunk_capacity {
            match reader.next_record()? {
                Some(record) => chunk.push(record),
                None => break,
            }
        }
        Ok(!chunk.is_empty())
    }

    fn initial_chunk_allocation(&self) -> usize {
        self.chunk_capacity.min(1024)
    }
}

/// Reads a whole partition file. Intended for small partitions and tests.
pub fn read_partition(path: &Path) -> Result<Vec<DistanceRecord>> {
    let mut reader = RecordReader::open(path)?;
    let mut records = Vec::new();
    while let Some(record) = reader.next_record()? {
        records.push(record);
    }
    Ok(records)
}

/// True if the stored distances of the partition never decrease.
pub fn is_sorted(path: &Path) -> Result<bool> {
    let mut reader = RecordReader::open(path)?;
    let mut previous = f64::NEG_INFINITY;
    while let Some(entry) = reader.next_entry()? {
        if entry.distance < previous {
            return Ok(false);
        }
        previous = entry.distance;
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{classify, ErrorKind};
    use crate::record::{RecordWriter, Vector};
    use std::fs::{self, File};
    use std::io::BufWriter;
    use tempfile::tempdir;

    /// Distances cycle through a few values so ties span many chunks;
    /// the single vector element is the original position.
    fn write_partition(path: &Path, count: usize) -> Vec<DistanceRecord> {
        let records: Vec<DistanceRecord> = (0..count)
            .map(|i| {
                let distance = 5.0 + ((i * 7919) % 13) as f64 / 16.0;
                DistanceRecord::new(distance, Vector::new(vec![i as i32]))
            })
            .collect();

        let file = File::create(path).unwrap();
        let mut writer = RecordWriter::new(BufWriter::new(file));
        for record in &records {
            writer.write_record(record).unwrap();
        }
        writer.finish().unwrap();
        records
    }

    fn expected_order(mut records: Vec<DistanceRecord>) -> Vec<DistanceRecord> {
        records.sort_by(DistanceRecord::cmp_distance);
        records
    }

    fn scratch_files_in(dir: &Path) -> usize {
        fs::read_dir(dir)
            .unwrap()
            .filter(|e| {
                e.as_ref()
                    .unwrap()
                    .file_name()
                    .to_string_lossy()
                    .starts_with(crate::config::SCRATCH_FILE_PREFIX)
            })
            .count()
    }

    #[test]
    fn zero_chunk_capacity_is_rejected() {
        assert!(ExternalSorter::new(0).is_err());
    }

    #[test]
    fn single_chunk_partition_sorts_in_memory() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("keyFile5.csv");
        let records = write_partition(&path, 50);

        let stats = ExternalSorter::new(100).unwrap().sort_partition(&path).unwrap();

        assert_eq!(stats, SortStats { records: 50, chunks: 1, merge_rounds: 0 });
        assert_eq!(read_partition(&path).unwrap(), expected_order(records));
    }

    #[test]
    fn chunk_capacity_plus_one_takes_merge_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("keyFile5.csv");
        let records = write_partition(&path, 101);

        let stats = ExternalSorter::new(100).unwrap().sort_partition(&path).unwrap();

        assert_eq!(stats, SortStats { records: 101, chunks: 2, merge_rounds: 1 });
        assert!(is_sorted(&path).unwrap());
        assert_eq!(read_partition(&path).unwrap(), expected_order(records));
        assert_eq!(scratch_files_in(dir.path()), 0);
    }

    #[test]
    fn many_rounds_preserve_stability() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("keyFile5.csv");
        let records = write_partition(&path, 1000);

        let stats = ExternalSorter::new(64).unwrap().sort_partition(&path).unwrap();

        assert_eq!(stats.chunks, 16);
        assert_eq!(stats.merge_rounds, 15);
        assert_eq!(read_partition(&path).unwrap(), expected_order(records));
    }

    #[test]
    fn exact_multiple_of_capacity_has_no_empty_chunk() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("keyFile5.csv");
        write_partition(&path, 300);

        let stats = ExternalSorter::new(100).unwrap().sort_partition(&path).unwrap();
        assert_eq!(stats.chunks, 3);
        assert_eq!(stats.merge_rounds, 2);
    }

    #[test]
    fn kway_matches_pairwise_byte_for_byte() {
        let dir = tempdir().unwrap();
        let pairwise = dir.path().join("keyFile5.csv");
        let kway = dir.path().join("keyFile6.csv");
        write_partition(&pairwise, 777);
        write_partition(&kway, 777);

        ExternalSorter::new(50).unwrap().sort_partition(&pairwise).unwrap();
        let stats = ExternalSorter::new(50)
            .unwrap()
            .with_strategy(MergeStrategy::KWay)
            .sort_partition(&kway)
            .unwrap();

        assert_eq!(stats.chunks, 16);
        assert_eq!(stats.merge_rounds, 1);
        assert_eq!(fs::read(&pairwise).unwrap(), fs::read(&kway).unwrap());
        assert_eq!(scratch_files_in(dir.path()), 0);
    }

    #[test]
    fn kway_bounded_fan_in_merges_in_passes() {
        let dir = tempdir().unwrap();
        let pairwise = dir.path().join("keyFile5.csv");
        let kway = dir.path().join("keyFile6.csv");
        let records = write_partition(&pairwise, 500);
        write_partition(&kway, 500);

        ExternalSorter::new(10).unwrap().sort_partition(&pairwise).unwrap();
        let sorter = ExternalSorter::new(10)
            .unwrap()
            .with_strategy(MergeStrategy::KWay)
            .with_max_fan_in(3);
        let stats = sorter.sort_partition(&kway).unwrap();

        // 50 runs, 3 open at a time: every merge after the first adds 2 runs.
        assert_eq!(stats.chunks, 50);
        assert_eq!(stats.merge_rounds, 25);
        assert_eq!(read_partition(&kway).unwrap(), expected_order(records));
        assert_eq!(fs::read(&pairwise).unwrap(), fs::read(&kway).unwrap());
        assert_eq!(scratch_files_in(dir.path()), 0);
    }

    #[test]
    fn fan_in_has_a_floor_of_two() {
        let sorter = ExternalSorter::default().with_max_fan_in(0);
        assert_eq!(sorter.max_fan_in(), 2);
    }

    #[cfg(unix)]
    #[test]
    fn sorted_partition_keeps_original_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let path = dir.path().join("keyFile5.csv");
        write_partition(&path, 30);
        fs::set_permissions(&path, fs::Permissions::from_mode(0o644)).unwrap();

        ExternalSorter::new(8).unwrap().sort_partition(&path).unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o644);
    }

    #[test]
    fn empty_partition_is_left_as_is() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("keyFile5.csv");
        fs::write(&path, "").unwrap();

        let stats = ExternalSorter::default().sort_partition(&path).unwrap();
        assert_eq!(stats, SortStats::default());
        assert_eq!(fs::read_to_string(&path).unwrap(), "");
    }

    #[test]
    fn malformed_line_leaves_original_untouched() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("keyFile5.csv");
        let content = "5.5 1,1\n5.25 2,2\n5.75 3,3\nbroken\n5.1 4,4\n";
        fs::write(&path, content).unwrap();

        let err = ExternalSorter::new(2).unwrap().sort_partition(&path).unwrap_err();

        assert_eq!(classify(&err), ErrorKind::MalformedRecord);
        assert_eq!(fs::read_to_string(&path).unwrap(), content);
        assert_eq!(scratch_files_in(dir.path()), 0);
    }

    #[test]
    fn missing_partition_is_io_failure() {
        let dir = tempdir().unwrap();
        let err = ExternalSorter::default()
            .sort_partition(&dir.path().join("keyFile9.csv"))
            .unwrap_err();
        assert_eq!(classify(&err), ErrorKind::Io);
    }
}
