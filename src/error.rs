//! Error taxonomy for every stage of a hierarchical affinity propagation run.
//!
//! None of these are retried by the library. The orchestrator stops at the
//! first error and no partial cluster output is produced.

use std::path::PathBuf;

use thiserror::Error;

use crate::key::{CellKey, MatrixKind};

#[derive(Debug, Error)]
pub enum HapError {
    /// Bad or missing parameter, detected before any phase runs.
    #[error("Invalid configuration: {message}")]
    Configuration { message: String },

    #[error("Input not found: {}", path.display())]
    InputNotFound { path: PathBuf },

    #[error("Output location already exists: {}", path.display())]
    AlreadyExists { path: PathBuf },

    #[error("Malformed key '{key}': {reason}")]
    MalformedKey { key: String, reason: String },

    /// A message or record carried a matrix kind the receiving step does not consume.
    #[error("Invalid matrix identifier '{kind}' in {stage}")]
    InvalidMatrixIdentifier {
        kind: MatrixKind,
        stage: &'static str,
    },

    #[error("Malformed record at line {line}: {reason}")]
    MalformedRecord { line: usize, reason: String },

    #[error("Seed set is empty, at least one vector is required")]
    EmptySeedSet,

    #[error("Invalid similarity diagonal scale {scale}, must be finite and non-negative")]
    InvalidScale { scale: f64 },

    #[error("Index out of range: {what} {index} is not below {bound}")]
    IndexOutOfRange {
        what: &'static str,
        index: usize,
        bound: usize,
    },

    #[error("Record {key} carries {actual} values, expected {expected}")]
    LengthMismatch {
        key: CellKey,
        expected: usize,
        actual: usize,
    },

    /// A reducer did not receive every entry of a vector it needs.
    #[error("Incomplete {kind} vector (level {level}) at reducer ({index}, {reducer_level}): {actual} of {expected} entries")]
    IncompleteVector {
        kind: MatrixKind,
        level: usize,
        index: usize,
        reducer_level: usize,
        expected: usize,
        actual: usize,
    },

    #[error("Duplicate contribution to {kind} (level {level}) entry {entry}")]
    DuplicateContribution {
        kind: MatrixKind,
        level: usize,
        entry: usize,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unable to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

impl HapError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn malformed_key(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedKey {
            key: key.into(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod test {
    use std::path::PathBuf;

    use crate::key::MatrixKind;
    use crate::HapError;

    #[test]
    fn messages_name_their_subject() {
        let errors = vec![
            HapError::configuration("iterations (1) must be >= levels (2)"),
            HapError::InputNotFound {
                path: PathBuf::from("/missing/input"),
            },
            HapError::malformed_key("1\t2", "expected 3 fields, found 2"),
            HapError::InvalidMatrixIdentifier {
                kind: MatrixKind::Tau,
                stage: "cluster reduce",
            },
            HapError::InvalidScale { scale: -1. },
        ];
        let expected = [
            "iterations (1)",
            "/missing/input",
            "expected 3 fields",
            "'T' in cluster reduce",
            "-1",
        ];
        for (err, substring) in errors.iter().zip(expected.iter()) {
            let display = err.to_string();
            assert!(
                display.contains(substring),
                "'{}' should contain '{}'",
                display,
                substring
            );
        }
    }
}
