//! # Bucketizer
//!
//! Splits a dataset into partition files by bucket key. Each dataset line is
//! parsed into a vector, located relative to the reference vector, and
//! appended as a distance record to `keyFile{key}.csv`.
//!
//! ```text
//! dataset line          distance to ref   key   partition
//! 250,250,250      ->   5.0               5     keyFile5.csv
//! 0,0,0            ->   255.0             255   keyFile255.csv
//! 250,250,0        ->   88.333...         88    keyFile88.csv
//! ```
//!
//! The first non-blank line fixes the dimensionality of the session. Any
//! later line that does not parse into exactly D integers aborts the pass.
//!
//! ## Writers
//!
//! At most `max_open_writers` buffered writers are open at once. When a
//! record needs a writer beyond that, the writer with the lowest key is
//! flushed and closed, and its partition is reopened in append mode the
//! next time a record lands there:
//!
//! ```text
//! open: {4, 5, 55}  + key 88  ->  close 4  ->  open: {5, 55, 88}
//! open: {5, 55, 88} + key 4   ->  close 5  ->  open: {4, 55, 88}  (append)
//! ```
//!
//! Partition files are created with `create_new`, so an existing file is
//! never truncated. They are tracked by a [`PartitionSet`] from the moment
//! they are created, so a pass that fails for any reason deletes everything
//! it wrote.

use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufWriter};
use std::path::PathBuf;

use eyre::{Result, WrapErr};
use tracing::info;

use crate::config::{IO_BUFFER_SIZE, MAX_OPEN_PARTITION_WRITERS};
use crate::error::IndexError;
use crate::partition::{partition_path, BucketKey, PartitionRef, PartitionSet};
use crate::record::{DistanceRecord, RecordWriter, Vector};
use crate::session::SessionContext;

/// Result of a successful bucketize pass.
#[derive(Debug)]
pub struct BucketizeOutput {
    /// `None` when the dataset had no records.
    pub context: Option<SessionContext>,
    /// One key per record, in dataset order.
    pub keys: Vec<BucketKey>,
    /// One unsorted partition file per distinct key.
    pub partitions: PartitionSet,
}

impl BucketizeOutput {
    pub fn record_count(&self) -> usize {
        self.keys.len()
    }
}

type PartitionWriter = RecordWriter<BufWriter<File>>;

/// Writes partition files into one directory.
pub struct Bucketizer {
    dir: PathBuf,
    max_open_writers: usize,
}

impl Bucketizer {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            max_open_writers: MAX_OPEN_PARTITION_WRITERS,
        }
    }

    /// Values below 1 are raised to 1.
    pub fn with_max_open_writers(mut self, writers: usize) -> Self {
        self.max_open_writers = writers.max(1);
        self
    }

    pub fn run<R: BufRead>(&self, reader: R) -> Result<BucketizeOutput> {
        let mut partitions = PartitionSet::new();
        let mut writers: BTreeMap<BucketKey, PartitionWriter> = BTreeMap::new();
        let mut context: Option<SessionContext> = None;
        let mut keys = Vec::new();

        for (idx, line) in reader.lines().enumerate() {
            let line_no = idx + 1;
            let line = line.wrap_err_with(|| format!("failed to read dataset line {}", line_no))?;
            if line.trim().is_empty() {
                continue;
            }

            let vector = match &context {
                Some(ctx) => parse_dataset_line(&line, line_no, ctx.dimensionality())?,
                None => Vector::parse(&line, line_no)?,
            };
            let ctx = context.get_or_insert_with(|| SessionContext::new(vector.len()));
            let (distance, key) = ctx.locate(&vector)?;

            if !writers.contains_key(&key) {
                if writers.len() >= self.max_open_writers {
                    if let Some((evicted, writer)) = writers.pop_first() {
                        close_writer(evicted, writer)?;
                    }
                }
                let writer = self.open_partition(key, &mut partitions)?;
                writers.insert(key, writer);
            }
            if let Some(writer) = writers.get_mut(&key) {
                writer.write_record(&DistanceRecord::new(distance, vector))?;
            }
            keys.push(key);
        }

        for (key, writer) in writers {
            close_writer(key, writer)?;
        }

        info!(
            records = keys.len(),
            partitions = partitions.len(),
            dimensionality = context.as_ref().map(SessionContext::dimensionality),
            "dataset bucketized"
        );

        Ok(BucketizeOutput {
            context,
            keys,
            partitions,
        })
    }

    fn open_partition(
        &self,
        key: BucketKey,
        partitions: &mut PartitionSet,
    ) -> Result<PartitionWriter> {
        let file = match partitions.get(key) {
            Some(partition) => OpenOptions::new()
                .append(true)
                .open(partition.path())
                .wrap_err_with(|| {
                    format!("failed to reopen partition file: {:?}", partition.path())
                })?,
            None => {
                let path = partition_path(&self.dir, key);
                let file = OpenOptions::new()
                    .write(true)
                    .create_new(true)
                    .open(&path)
                    .wrap_err_with(|| format!("failed to create partition file: {:?}", path))?;
                partitions.track(PartitionRef::new(key, path));
                file
            }
        };
        Ok(RecordWriter::new(BufWriter::with_capacity(IO_BUFFER_SIZE, file)))
    }
}

fn close_writer(key: BucketKey, writer: PartitionWriter) -> Result<()> {
    writer
        .finish()
        .wrap_err_with(|| format!("failed to flush partition file for key {}", key))?;
    Ok(())
}

/// Dataset lines of the wrong arity are malformed records, not dimension errors.
fn parse_dataset_line(line: &str, line_no: usize, dimensionality: usize) -> Result<Vector> {
    let vector = Vector::parse(line, line_no)?;
    if vector.len() != dimensionality {
        return Err(IndexError::malformed(
            line_no,
            format!(
                "expected {} elements, found {}",
                dimensionality,
                vector.len()
            ),
        )
        .into());
    }
    Ok(vector)
}
