//! # Vector and Distance Record Codec
//!
//! This module defines the two value types that flow through the index and
//! their textual encodings.
//!
//! ## Formats
//!
//! ```text
//! Vector line     := element ("," element)*
//! Partition line  := distance " " Vector line
//!
//! Examples:
//!   250,250,250
//!   5 250,250,250
//!   88.33333333333333 250,250,0
//! ```
//!
//! The distance is written with Rust's shortest round-trip `f64` formatting,
//! so the value read back is bit-identical to the value computed at indexing
//! time. The single space is the only field delimiter; neither a distance nor
//! a comma-separated integer list can contain one, so splitting at the first
//! space is unambiguous.
//!
//! ## Lazy Decoding
//!
//! [`RecordReader::next_entry`] decodes only the distance field and hands out
//! the vector field as text. The query engine uses this to skip records
//! outside its window without parsing their vectors. The reader reuses one
//! line buffer for the whole file.

use std::cmp::Ordering;
use std::fmt::{self, Write as _};
use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use eyre::{Result, WrapErr};

use crate::config::{ELEMENT_DELIMITER, FIELD_DELIMITER, IO_BUFFER_SIZE};
use crate::error::IndexError;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Vector(Vec<i32>);

impl Vector {
    pub fn new(elements: Vec<i32>) -> Self {
        Self(elements)
    }

    /// Parses a comma-separated list of integers. `line` is reported in errors.
    pub fn parse(text: &str, line: usize) -> Result<Self, IndexError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(IndexError::malformed(line, "empty vector"));
        }

        let elements = text
            .split(ELEMENT_DELIMITER)
            .map(|field| {
                let field = field.trim();
                field.parse::<i32>().map_err(|_| {
                    IndexError::malformed(line, format!("expected integer, found {:?}", field))
                })
            })
            .collect::<Result<Vec<i32>, IndexError>>()?;

        Ok(Self(elements))
    }

    /// Parses and checks the arity against the session dimensionality.
    pub fn parse_with_dimensionality(
        text: &str,
        line: usize,
        dimensionality: usize,
    ) -> Result<Self, IndexError> {
        let vector = Self::parse(text, line)?;
        if vector.len() != dimensionality {
            return Err(IndexError::DimensionMismatch {
                expected: dimensionality,
                actual: vector.len(),
            });
        }
        Ok(vector)
    }

    pub fn as_slice(&self) -> &[i32] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_inner(self) -> Vec<i32> {
        self.0
    }

    pub fn write_into(&self, buf: &mut String) {
        for (i, element) in self.0.iter().enumerate() {
            if i > 0 {
                buf.push(ELEMENT_DELIMITER);
            }
            let _ = write!(buf, "{}", element);
        }
    }
}

impl From<Vec<i32>> for Vector {
    fn from(elements: Vec<i32>) -> Self {
        Self(elements)
    }
}

impl AsRef<[i32]> for Vector {
    fn as_ref(&self) -> &[i32] {
        &self.0
    }
}

impl fmt::Display for Vector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut buf = String::with_capacity(self.0.len() * 4);
        self.write_into(&mut buf);
        f.write_str(&buf)
    }
}

/// A vector paired with its distance to the session reference vector.
#[derive(Debug, Clone, PartialEq)]
pub struct DistanceRecord {
    pub distance: f64,
    pub vector: Vector,
}

impl DistanceRecord {
    pub fn new(distance: f64, vector: Vector) -> Self {
        Self { distance, vector }
    }

    /// Ascending distance. Equal distances compare `Equal`, so a stable sort
    /// keeps their original order.
    pub fn cmp_distance(&self, other: &Self) -> Ordering {
        self.distance.total_cmp(&other.distance)
    }

    pub fn decode(line: &str, line_no: usize) -> Result<Self, IndexError> {
        let (distance, vector_text) = split_fields(line, line_no)?;
        let vector = Vector::parse(vector_text, line_no)?;
        Ok(Self { distance, vector })
    }

    pub fn encode_into(&self, buf: &mut String) {
        let _ = write!(buf, "{}", self.distance);
        buf.push(FIELD_DELIMITER);
        self.vector.write_into(buf);
    }
}

impl fmt::Display for DistanceRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.distance, FIELD_DELIMITER, self.vector)
    }
}

/// Splits a partition line into its distance and the undecoded vector text.
pub fn split_fields(line: &str, line_no: usize) -> Result<(f64, &str), IndexError> {
    let (distance_text, vector_text) = line
        .split_once(FIELD_DELIMITER)
        .ok_or_else(|| IndexError::malformed(line_no, "missing distance field delimiter"))?;

    let distance: f64 = distance_text.parse().map_err(|_| {
        IndexError::malformed(line_no, format!("invalid distance {:?}", distance_text))
    })?;

    if !distance.is_finite() || distance < 0.0 {
        return Err(IndexError::malformed(
            line_no,
            format!("distance must be finite and non-negative, found {}", distance),
        ));
    }

    Ok((distance, vector_text))
}

/// A partition line whose vector has not been decoded yet.
#[derive(Debug, Clone, Copy)]
pub struct RecordEntry<'a> {
    pub distance: f64,
    pub line_no: usize,
    vector_text: &'a str,
}

impl<'a> RecordEntry<'a> {
    pub fn vector_text(&self) -> &'a str {
        self.vector_text
    }

    pub fn vector(&self) -> Result<Vector, IndexError> {
        Vector::parse(self.vector_text, self.line_no)
    }

    pub fn to_record(&self) -> Result<DistanceRecord, IndexError> {
        Ok(DistanceRecord::new(self.distance, self.vector()?))
    }
}

/// Streams records from a partition file, skipping blank lines.
pub struct RecordReader<R> {
    reader: R,
    line: String,
    line_no: usize,
    source: PathBuf,
}

impl RecordReader<BufReader<File>> {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .wrap_err_with(|| format!("failed to open partition file: {:?}", path))?;
        Ok(Self::with_source(
            BufReader::with_capacity(IO_BUFFER_SIZE, file),
            path.to_path_buf(),
        ))
    }
}

impl<R: BufRead> RecordReader<R> {
    pub fn new(reader: R) -> Self {
        Self::with_source(reader, PathBuf::new())
    }

    fn with_source(reader: R, source: PathBuf) -> Self {
        Self {
            reader,
            line: String::with_capacity(256),
            line_no: 0,
            source,
        }
    }

    pub fn next_entry(&mut self) -> Result<Option<RecordEntry<'_>>> {
        loop {
            self.line.clear();
            let read = self
                .reader
                .read_line(&mut self.line)
                .wrap_err_with(|| format!("failed to read partition file: {:?}", self.source))?;
            if read == 0 {
                return Ok(None);
            }
            self.line_no += 1;
            if !self.line.trim().is_empty() {
                break;
            }
        }

        let line = self.line.trim_end_matches(['\n', '\r']);
        let (distance, vector_text) = split_fields(line, self.line_no)?;
        Ok(Some(RecordEntry {
            distance,
            line_no: self.line_no,
            vector_text,
        }))
    }

    pub fn next_record(&mut self) -> Result<Option<DistanceRecord>> {
        match self.next_entry()? {
            Some(entry) => Ok(Some(entry.to_record()?)),
            None => Ok(None),
        }
    }
}

/// Buffered partition line writer. Reuses one encode buffer for all records.
pub struct RecordWriter<W: Write> {
    writer: W,
    buf: String,
}

impl<W: Write> RecordWriter<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            buf: String::with_capacity(256),
        }
    }

    pub fn write_record(&mut self, record: &DistanceRecord) -> Result<()> {
        self.buf.clear();
        record.encode_into(&mut self.buf);
        self.buf.push('\n');
        self.writer
            .write_all(self.buf.as_bytes())
            .wrap_err("failed to write partition record")?;
        Ok(())
    }

    pub fn finish(mut self) -> Result<W> {
        self.writer
            .flush()
            .wrap_err("failed to flush partition records")?;
        Ok(self.writer)
    }
}
