//! # Error Taxonomy
//!
//! Public operations return `eyre::Result`. Domain failures are raised as
//! [`IndexError`] values so callers can tell them apart; I/O failures are
//! propagated as the underlying `std::io::Error` wrapped with path context.
//!
//! [`classify`] walks an error chain and maps it onto [`ErrorKind`]:
//!
//! ```text
//! IndexError in chain  ─> its kind
//! io::Error in chain   ─> ErrorKind::Io
//! anything else        ─> ErrorKind::Other
//! ```
//!
//! No operation retries. A failure always aborts the enclosing operation
//! (an indexing pass, a partition sort, or a single query) without
//! returning partial results.

use std::io;

use eyre::Report;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum IndexError {
    #[error("malformed record at line {line}: {reason}")]
    MalformedRecord { line: usize, reason: String },

    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("dataset contains no records")]
    EmptyDataset,

    #[error("invalid threshold {0}: must be finite and non-negative")]
    InvalidThreshold(f64),
}

impl IndexError {
    pub fn malformed(line: usize, reason: impl Into<String>) -> Self {
        IndexError::MalformedRecord {
            line,
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            IndexError::MalformedRecord { .. } => ErrorKind::MalformedRecord,
            IndexError::DimensionMismatch { .. } => ErrorKind::DimensionMismatch,
            IndexError::EmptyDataset => ErrorKind::EmptyDataset,
            IndexError::InvalidThreshold(_) => ErrorKind::InvalidThreshold,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    MalformedRecord,
    DimensionMismatch,
    EmptyDataset,
    InvalidThreshold,
    Io,
    Other,
}

pub fn classify(err: &Report) -> ErrorKind {
    if let Some(index_err) = err.chain().find_map(|e| e.downcast_ref::<IndexError>()) {
        return index_err.kind();
    }
    if err.chain().any(|e| e.downcast_ref::<io::Error>().is_some()) {
        return ErrorKind::Io;
    }
    ErrorKind::Other
}

#[cfg(test)]
mod tests {
    use super::*;
    use eyre::WrapErr;

    #[test]
    fn classify_finds_index_error_under_context() {
        let result: eyre::Result<()> = Err(IndexError::DimensionMismatch {
            expected: 3,
            actual: 4,
        })
        .wrap_err("query failed");

        let err = result.unwrap_err();
        assert_eq!(classify(&err), ErrorKind::DimensionMismatch);
    }

    #[test]
    fn classify_maps_io_errors() {
        let result: eyre::Result<()> =
            Err(io::Error::new(io::ErrorKind::NotFound, "gone")).wrap_err("failed to open");

        assert_eq!(classify(&result.unwrap_err()), ErrorKind::Io);
    }

    #[test]
    fn classify_falls_back_to_other() {
        let err = eyre::eyre!("something else");
        assert_eq!(classify(&err), ErrorKind::Other);
    }

    #[test]
    fn malformed_message_names_line() {
        let err = IndexError::malformed(7, "expected integer, found \"x\"");
        assert_eq!(
            err.to_string(),
            "malformed record at line 7: expected integer, found \"x\""
        );
    }
}
