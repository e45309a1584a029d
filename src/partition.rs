//! # Partitions
//!
//! A partition is the file holding every record that shares a bucket key.
//! This module owns partition naming and the lifetime of the files. The
//! partition directory itself belongs to the session.
//!
//! ## File Naming
//!
//! ```text
//! {partition dir}/keyFile{key}.csv
//!
//! Examples:
//!   datasets/.cityblock-a1B2c3/keyFile5.csv     (records with 5 <= distance < 6)
//!   datasets/.cityblock-a1B2c3/keyFile255.csv   (all-black vectors)
//! ```
//!
//! ## Lifecycle
//!
//! [`PartitionSet`] tracks every partition file created for a session and
//! removes them on [`PartitionSet::remove_all`] or on drop. A bucketize pass
//! or sort that fails therefore never leaves partitions behind, and a
//! finished session cleans up after itself. Removal errors in `Drop` are
//! logged and otherwise ignored.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use eyre::{Result, WrapErr};
use tracing::warn;

use crate::config::{PARTITION_FILE_EXTENSION, PARTITION_FILE_PREFIX};

/// Integer floor of a vector's distance to the reference vector.
pub type BucketKey = i64;

/// Bucket key for a distance. Distances are never negative, so this is `floor`.
pub fn bucket_key(distance: f64) -> BucketKey {
    distance.floor() as BucketKey
}

pub fn partition_path(dir: &Path, key: BucketKey) -> PathBuf {
    dir.join(format!(
        "{}{}.{}",
        PARTITION_FILE_PREFIX, key, PARTITION_FILE_EXTENSION
    ))
}

/// Location of one partition, as registered in the range index.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PartitionRef {
    key: BucketKey,
    path: PathBuf,
}

impl PartitionRef {
    pub fn new(key: BucketKey, path: PathBuf) -> Self {
        Self { key, path }
    }

    pub fn key(&self) -> BucketKey {
        self.key
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Owns the partition files of a session and deletes them when dropped.
#[derive(Debug, Default)]
pub struct PartitionSet {
    partitions: BTreeMap<BucketKey, PartitionRef>,
}

impl PartitionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a partition file. Returns false if the key was already tracked.
    pub fn track(&mut self, partition: PartitionRef) -> bool {
        if self.partitions.contains_key(&partition.key) {
            return false;
        }
        self.partitions.insert(partition.key, partition);
        true
    }

    pub fn get(&self, key: BucketKey) -> Option<&PartitionRef> {
        self.partitions.get(&key)
    }

    pub fn len(&self) -> usize {
        self.partitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.partitions.is_empty()
    }

    /// Partitions in ascending key order.
    pub fn iter(&self) -> impl Iterator<Item = &PartitionRef> {
        self.partitions.values()
    }

    pub fn keys(&self) -> impl Iterator<Item = BucketKey> + '_ {
        self.partitions.keys().copied()
    }

    /// Deletes every tracked file. Files already gone are not an error.
    /// Stops at the first failure; the failed and remaining entries stay tracked.
    pub fn remove_all(&mut self) -> Result<()> {
        while let Some((key, partition)) = self.partitions.pop_first() {
            match fs::remove_file(&partition.path) {
                Ok(()) => {}
                Err(err) if err.kind() == io::ErrorKind::NotFound => {}
                Err(err) => {
                    let path = partition.path.clone();
                    self.partitions.insert(key, partition);
                    return Err(err)
                        .wrap_err_with(|| format!("failed to remove partition file: {:?}", path));
                }
            }
        }
        Ok(())
    }
}

impl Drop for PartitionSet {
    fn drop(&mut self) {
        if let Err(err) = self.remove_all() {
            warn!(error = %err, "partition cleanup incomplete");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn bucket_key_floors_distance() {
        assert_eq!(bucket_key(0.0), 0);
        assert_eq!(bucket_key(1.9999), 1);
        assert_eq!(bucket_key(5.0), 5);
        assert_eq!(bucket_key(255.0), 255);
    }

    #[test]
    fn partition_path_uses_key_file_naming() {
        let path = partition_path(Path::new("/data"), 244);
        assert_eq!(path, PathBuf::from("/data/keyFile244.csv"));
    }

    #[test]
    fn track_rejects_duplicate_keys() {
        let mut set = PartitionSet::new();
        assert!(set.track(PartitionRef::new(3, PathBuf::from("a"))));
        assert!(!set.track(PartitionRef::new(3, PathBuf::from("b"))));
        assert_eq!(set.len(), 1);
        assert_eq!(set.get(3).unwrap().path(), Path::new("a"));
    }

    #[test]
    fn remove_all_deletes_files_and_tolerates_missing() {
        let dir = tempdir().unwrap();
        let present = partition_path(dir.path(), 1);
        fs::write(&present, "1 1,1\n").unwrap();
        let missing = partition_path(dir.path(), 2);

        let mut set = PartitionSet::new();
        set.track(PartitionRef::new(1, present.clone()));
        set.track(PartitionRef::new(2, missing));

        set.remove_all().unwrap();
        assert!(!present.exists());
        assert!(set.is_empty());
    }

    #[test]
    fn drop_removes_tracked_files() {
        let dir = tempdir().unwrap();
        let path = partition_path(dir.path(), 7);
        fs::write(&path, "7 1,1\n").unwrap();

        {
            let mut set = PartitionSet::new();
            set.track(PartitionRef::new(7, path.clone()));
            assert!(path.exists());
        }

        assert!(!path.exists());
    }
}
