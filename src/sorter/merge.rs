//! Merge primitives for the external sorter.
//!
//! Every intermediate stream is a [`NamedTempFile`] in the partition's
//! directory. Dropping one deletes it, so an error anywhere in a merge leaves
//! no scratch files behind.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use eyre::{Result, WrapErr};
use tempfile::{Builder, NamedTempFile};

use crate::config::{IO_BUFFER_SIZE, SCRATCH_FILE_PREFIX};
use crate::record::{DistanceRecord, RecordReader, RecordWriter};

pub(crate) fn scratch_file(dir: &Path) -> Result<NamedTempFile> {
    Builder::new()
        .prefix(SCRATCH_FILE_PREFIX)
        .suffix(".tmp")
        .tempfile_in(dir)
        .wrap_err_with(|| format!("failed to create sort scratch file in {:?}", dir))
}

fn scratch_reader(run: &NamedTempFile) -> Result<RecordReader<BufReader<File>>> {
    RecordReader::open(run.path())
}

fn scratch_writer(run: &NamedTempFile) -> RecordWriter<BufWriter<&File>> {
    RecordWriter::new(BufWriter::with_capacity(IO_BUFFER_SIZE, run.as_file()))
}

/// Writes an already sorted chunk to a new scratch run.
pub(crate) fn write_run(dir: &Path, chunk: &[DistanceRecord]) -> Result<NamedTempFile> {
    let run = scratch_file(dir)?;
    {
        let mut writer = scratch_writer(&run);
        for record in chunk {
            writer.write_record(record)?;
        }
        writer.finish()?;
    }
    Ok(run)
}

/// Two-way merge of the accumulated run with the next sorted chunk.
///
/// On equal distances the record from `left` is emitted first. `left` holds
/// only records that preceded `right` in the partition, so this keeps the
/// merge stable.
pub(crate) fn merge_two(
    dir: &Path,
    left: NamedTempFile,
    right: &[DistanceRecord],
) -> Result<NamedTempFile> {
    let merged = scratch_file(dir)?;
    {
        let mut reader = scratch_reader(&left)?;
        let mut writer = scratch_writer(&merged);
        let mut right = right.iter().peekable();
        let mut pending = reader.next_record()?;

        while let Some(left_record) = pending.take() {
            while let Some(right_record) = right.next_if(|r| r.cmp_distance(&left_record).is_lt()) {
                writer.write_record(right_record)?;
            }
            writer.write_record(&left_record)?;
            pending = reader.next_record()?;
        }
        for record in right {
            writer.write_record(record)?;
        }
        writer.finish()?;
    }
    Ok(merged)
}

struct HeapEntry {
    record: DistanceRecord,
    run: usize,
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for HeapEntry {}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.record
            .cmp_distance(&other.record)
            .then(self.run.cmp(&other.run))
    }
}

/// K-way merge of sorted runs. Ties go to the lower run index, and runs are
/// numbered in partition order, so the output matches the pairwise merge.
pub(crate) fn merge_runs(dir: &Path, runs: &[NamedTempFile]) -> Result<NamedTempFile> {
    let merged = scratch_file(dir)?;
    {
        let mut readers = runs
            .iter()
            .map(scratch_reader)
            .collect::<Result<Vec<_>>>()?;
        let mut heap = BinaryHeap::with_capacity(readers.len());

        for (run, reader) in readers.iter_mut().enumerate() {
            if let Some(record) = reader.next_record()? {
                heap.push(Reverse(HeapEntry { record, run }));
            }
        }

        let mut writer = scratch_writer(&merged);
        while let Some(Reverse(HeapEntry { record, run })) = heap.pop() {
            writer.write_record(&record)?;
            if let Some(next) = readers[run].next_record()? {
                heap.push(Reverse(HeapEntry { record: next, run }));
            }
        }
        writer.finish()?;
    }
    Ok(merged)
}
