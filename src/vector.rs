//! Reduce-side reconstruction of vectors from individually shuffled entries.
//!
//! Entries are placed by index, so arrival order does not matter. A slot that
//! is written twice, or read before every entry arrived, is an error: a
//! silently zero entry would corrupt the matrix.

use ndarray::Array1;
use num_traits::Float;

use crate::key::{MatrixKind, ReduceKey};
use crate::HapError;

pub(crate) struct PartialVector<F> {
    kind: MatrixKind,
    level: usize,
    values: Array1<F>,
    seen: Vec<bool>,
    filled: usize,
}

impl<F> PartialVector<F>
where
    F: Float,
{
    pub(crate) fn new(n: usize, kind: MatrixKind, level: usize) -> Self {
        Self {
            kind,
            level,
            values: Array1::zeros(n),
            seen: vec![false; n],
            filled: 0,
        }
    }

    pub(crate) fn set(&mut self, entry: usize, value: F) -> Result<(), HapError> {
        if entry >= self.seen.len() {
            return Err(HapError::IndexOutOfRange {
                what: "entry",
                index: entry,
                bound: self.seen.len(),
            });
        }
        if self.seen[entry] {
            return Err(HapError::DuplicateContribution {
                kind: self.kind,
                level: self.level,
                entry,
            });
        }
        self.seen[entry] = true;
        self.filled += 1;
        self.values[entry] = value;
        Ok(())
    }

    /// Take the vector, failing unless every entry was written.
    pub(crate) fn complete(self, reducer: ReduceKey) -> Result<Array1<F>, HapError> {
        if self.filled != self.seen.len() {
            return Err(HapError::IncompleteVector {
                kind: self.kind,
                level: self.level,
                index: reducer.index,
                reducer_level: reducer.level,
                expected: self.seen.len(),
                actual: self.filled,
            });
        }
        Ok(self.values)
    }
}

/// Single-value counterpart of [`PartialVector`] for `T`, `P` and `C`.
pub(crate) struct PartialScalar<F> {
    kind: MatrixKind,
    level: usize,
    value: Option<F>,
}

impl<F> PartialScalar<F>
where
    F: Float,
{
    pub(crate) fn new(kind: MatrixKind, level: usize) -> Self {
        Self {
            kind,
            level,
            value: None,
        }
    }

    pub(crate) fn set(&mut self, value: F) -> Result<(), HapError> {
        if self.value.is_some() {
            return Err(HapError::DuplicateContribution {
                kind: self.kind,
                level: self.level,
                entry: 0,
            });
        }
        self.value = Some(value);
        Ok(())
    }

    pub(crate) fn complete(self, reducer: ReduceKey) -> Result<F, HapError> {
        self.value.ok_or(HapError::IncompleteVector {
            kind: self.kind,
            level: self.level,
            index: reducer.index,
            reducer_level: reducer.level,
            expected: 1,
            actual: 0,
        })
    }
}
