//! # Match Sinks
//!
//! Destinations for query matches. A query hands its complete match list to
//! the sink in one call after the scan has finished, so a failed query never
//! appends a partial result.
//!
//! [`FileSink`] is the operator-facing sink: an append-only file of
//! comma-separated vectors, one per line, created on first use and never
//! truncated. The file is opened and closed within each `append` call.

use std::fs::OpenOptions;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use eyre::{Result, WrapErr};

use crate::config::IO_BUFFER_SIZE;
use crate::record::Vector;

pub trait MatchSink {
    fn append(&mut self, matches: &[Vector]) -> Result<()>;
}

impl MatchSink for Vec<Vector> {
    fn append(&mut self, matches: &[Vector]) -> Result<()> {
        self.extend_from_slice(matches);
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct FileSink {
    path: PathBuf,
}

impl FileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl MatchSink for FileSink {
    fn append(&mut self, matches: &[Vector]) -> Result<()> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .wrap_err_with(|| format!("failed to open match sink: {:?}", self.path))?;
        let mut writer = BufWriter::with_capacity(IO_BUFFER_SIZE, file);

        let mut line = String::with_capacity(256);
        for vector in matches {
            line.clear();
            vector.write_into(&mut line);
            line.push('\n');
            writer
                .write_all(line.as_bytes())
                .wrap_err_with(|| format!("failed to write match sink: {:?}", self.path))?;
        }

        writer
            .flush()
            .wrap_err_with(|| format!("failed to flush match sink: {:?}", self.path))
    }
}
