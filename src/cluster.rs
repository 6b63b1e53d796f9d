use std::collections::BTreeMap;

use num_traits::Float;

use crate::algorithm::{max_argmax_valid, valid_exemplars};
use crate::engine::{check_record, scatter_column, Emitted, MapReduce};
use crate::key::{MatrixKind, Message, ReduceKey};
use crate::record::{Assignment, Record};
use crate::vector::PartialVector;
use crate::{HapConfig, HapError};

/// Final round: pick an exemplar for every `(row, level)` from the last
/// generation's `A` and `R` column slices.
pub struct ClusterExtractor<F> {
    config: HapConfig<F>,
}

impl<F> ClusterExtractor<F>
where
    F: Float + Send + Sync,
{
    pub fn new(config: &HapConfig<F>) -> Self {
        Self { config: *config }
    }
}

impl<F> MapReduce<F> for ClusterExtractor<F>
where
    F: Float + Send + Sync,
{
    type Output = Assignment;

    fn name(&self) -> &'static str {
        "cluster"
    }

    fn map(&self, record: &Record<F>, emit: &mut Emitted<F>) -> Result<(), HapError> {
        check_record(record, &self.config)?;
        match record.key.kind {
            MatrixKind::Availability => scatter_column(record, MatrixKind::AvailabilityDiag, emit),
            MatrixKind::Responsibility => {
                scatter_column(record, MatrixKind::ResponsibilityDiag, emit)
            }
            // carried along by the last availability round, not needed here
            MatrixKind::Similarity
            | MatrixKind::Tau
            | MatrixKind::Phi
            | MatrixKind::ExemplarPreference => {}
            kind => {
                return Err(HapError::InvalidMatrixIdentifier {
                    kind,
                    stage: "cluster map",
                })
            }
        }
        Ok(())
    }

    fn reduce(
        &self,
        key: ReduceKey,
        messages: &[Message<F>],
        emit: &mut Vec<Assignment>,
    ) -> Result<(), HapError> {
        let n = self.config.n();
        let mut a = PartialVector::new(n, MatrixKind::Availability, key.level);
        let mut diag_a = PartialVector::new(n, MatrixKind::AvailabilityDiag, key.level);
        let mut r = PartialVector::new(n, MatrixKind::Responsibility, key.level);
        let mut diag_r = PartialVector::new(n, MatrixKind::ResponsibilityDiag, key.level);
        for message in messages {
            let index = message.source.index;
            match message.source.kind {
                MatrixKind::Availability => a.set(index, message.value)?,
                MatrixKind::AvailabilityDiag => diag_a.set(index, message.value)?,
                MatrixKind::Responsibility => r.set(index, message.value)?,
                MatrixKind::ResponsibilityDiag => diag_r.set(index, message.value)?,
                kind => {
                    return Err(HapError::InvalidMatrixIdentifier {
                        kind,
                        stage: "cluster reduce",
                    })
                }
            }
        }
        let valid = valid_exemplars(diag_a.complete(key)?.view(), diag_r.complete(key)?.view());
        let sum = a.complete(key)? + r.complete(key)?;
        let (exemplar, _) = max_argmax_valid(sum.view(), &valid);
        emit.push(Assignment {
            exemplar,
            row: key.index,
            level: key.level,
        });
        Ok(())
    }
}

/// Exemplar view over the final assignments, one map per level.
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterHierarchy {
    assignments: Vec<Assignment>,
    levels: Vec<BTreeMap<usize, Vec<usize>>>,
}

impl ClusterHierarchy {
    pub fn new(mut assignments: Vec<Assignment>, levels: usize) -> Self {
        assignments.sort_by_key(|a| (a.level, a.row));
        let mut exemplar_maps = vec![BTreeMap::new(); levels];
        for assignment in assignments.iter() {
            if let Some(map) = exemplar_maps.get_mut(assignment.level) {
                map.entry(assignment.exemplar)
                    .or_insert_with(Vec::new)
                    .push(assignment.row);
            }
        }
        Self {
            assignments,
            levels: exemplar_maps,
        }
    }

    /// Sorted by `(level, row)`.
    pub fn assignments(&self) -> &[Assignment] {
        &self.assignments
    }

    pub fn num_levels(&self) -> usize {
        self.levels.len()
    }

    /// Exemplar id -> member row ids at `level`.
    pub fn level(&self, level: usize) -> Option<&BTreeMap<usize, Vec<usize>>> {
        self.levels.get(level)
    }

    pub fn exemplar_of(&self, row: usize, level: usize) -> Option<usize> {
        self.assignments
            .iter()
            .find(|a| a.row == row && a.level == level)
            .map(|a| a.exemplar)
    }
}
