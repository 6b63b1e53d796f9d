//! Responsibility round: row-wise update of `R`, plus the exemplar
//! preference `C` and the level-above bias `P`.
//!
//! Map input is a full generation with `S`, `A` and `R` stored as column slices; the
//! reducer for `(i, l)` rebuilds row `i` and emits `A`, `S` and the new `R`
//! as row slices for the availability round.

use ndarray::Array1;
use num_traits::Float;

use crate::algorithm::{dampen, max_argmax, max_argmax_valid, max_excluding, valid_exemplars};
use crate::engine::{check_record, scatter_column, Emitted, MapReduce};
use crate::key::{MatrixKind, Message, ReduceKey};
use crate::record::Record;
use crate::vector::{PartialScalar, PartialVector};
use crate::{HapConfig, HapError};

pub struct ResponsibilityPhase<F> {
    config: HapConfig<F>,
    iteration: usize,
}

impl<F> ResponsibilityPhase<F>
where
    F: Float + Send + Sync,
{
    /// `iteration` is zero-based; on iteration 0 `C` and `P` pass through.
    pub fn new(config: &HapConfig<F>, iteration: usize) -> Self {
        Self {
            config: *config,
            iteration,
        }
    }
}

/// Row `i` of every matrix the responsibility reducer reads at level `l`.
struct ResponsibilityInput<F> {
    availability: PartialVector<F>,
    availability_above: PartialVector<F>,
    availability_diag: PartialVector<F>,
    responsibility: PartialVector<F>,
    responsibility_diag: PartialVector<F>,
    similarity: PartialVector<F>,
    tau: PartialScalar<F>,
    phi: PartialScalar<F>,
    preference: PartialScalar<F>,
}

impl<F> ResponsibilityInput<F>
where
    F: Float,
{
    fn collect(n: usize, key: ReduceKey, messages: &[Message<F>]) -> Result<Self, HapError> {
        let level = key.level;
        let mut input = Self {
            availability: PartialVector::new(n, MatrixKind::Availability, level),
            availability_above: PartialVector::new(n, MatrixKind::Availability, level + 1),
            availability_diag: PartialVector::new(n, MatrixKind::AvailabilityDiag, level),
            responsibility: PartialVector::new(n, MatrixKind::Responsibility, level),
            responsibility_diag: PartialVector::new(n, MatrixKind::ResponsibilityDiag, level),
            similarity: PartialVector::new(n, MatrixKind::Similarity, level),
            tau: PartialScalar::new(MatrixKind::Tau, level),
            phi: PartialScalar::new(MatrixKind::Phi, level),
            preference: PartialScalar::new(MatrixKind::ExemplarPreference, level),
        };
        for message in messages {
            let source = message.source;
            let value = message.value;
            match source.kind {
                MatrixKind::Availability if source.level == level => {
                    input.availability.set(source.index, value)?
                }
                MatrixKind::Availability if source.level == level + 1 => {
                    input.availability_above.set(source.index, value)?
                }
                MatrixKind::AvailabilityDiag => input.availability_diag.set(source.index, value)?,
                MatrixKind::Responsibility => input.responsibility.set(source.index, value)?,
                MatrixKind::ResponsibilityDiag => {
                    input.responsibility_diag.set(source.index, value)?
                }
                MatrixKind::Similarity => input.similarity.set(source.index, value)?,
                MatrixKind::Tau => input.tau.set(value)?,
                MatrixKind::Phi => input.phi.set(value)?,
                MatrixKind::ExemplarPreference => input.preference.set(value)?,
                kind => {
                    return Err(HapError::InvalidMatrixIdentifier {
                        kind,
                        stage: "responsibility reduce",
                    })
                }
            }
        }
        Ok(input)
    }
}

impl<F> MapReduce<F> for ResponsibilityPhase<F>
where
    F: Float + Send + Sync,
{
    type Output = Record<F>;

    fn name(&self) -> &'static str {
        "responsibility"
    }

    fn map(&self, record: &Record<F>, emit: &mut Emitted<F>) -> Result<(), HapError> {
        check_record(record, &self.config)?;
        let col = record.key.index;
        let level = record.key.level;
        match record.key.kind {
            MatrixKind::Availability => {
                scatter_column(record, MatrixKind::AvailabilityDiag, emit);
                // the level below reads this level's A for its Phi update
                if level > 0 {
                    for (row, &value) in record.values.iter().enumerate() {
                        emit.push((
                            ReduceKey::new(row, level - 1),
                            Message::new(col, level, MatrixKind::Availability, value),
                        ));
                    }
                }
            }
            MatrixKind::Responsibility => {
                scatter_column(record, MatrixKind::ResponsibilityDiag, emit);
            }
            MatrixKind::Similarity => {
                for l in 0..self.config.levels() {
                    for (row, &value) in record.values.iter().enumerate() {
                        emit.push((
                            ReduceKey::new(row, l),
                            Message::new(col, l, MatrixKind::Similarity, value),
                        ));
                    }
                }
            }
            kind @ (MatrixKind::Tau | MatrixKind::Phi | MatrixKind::ExemplarPreference) => {
                emit.push((
                    ReduceKey::new(col, level),
                    Message::new(col, level, kind, record.values[0]),
                ));
            }
            kind => {
                return Err(HapError::InvalidMatrixIdentifier {
                    kind,
                    stage: "responsibility map",
                })
            }
        }
        Ok(())
    }

    fn reduce(
        &self,
        key: ReduceKey,
        messages: &[Message<F>],
        emit: &mut Vec<Record<F>>,
    ) -> Result<(), HapError> {
        let row = key.index;
        let level = key.level;
        let first_iteration = self.iteration == 0;
        let input = ResponsibilityInput::collect(self.config.n(), key, messages)?;

        let a = input.availability.complete(key)?;
        let r = input.responsibility.complete(key)?;
        let s = input.similarity.complete(key)?;
        let tau = input.tau.complete(key)?;

        emit.push(Record::scalar(row, level, MatrixKind::Tau, tau));

        let preference = if first_iteration {
            input.preference.complete(key)?
        } else {
            let diag_a = input.availability_diag.complete(key)?;
            let diag_r = input.responsibility_diag.complete(key)?;
            update_preference(&a, &r, &diag_a, &diag_r)
        };
        emit.push(Record::scalar(
            row,
            level,
            MatrixKind::ExemplarPreference,
            preference,
        ));

        let phi = if level != self.config.top_level() && !first_iteration {
            let a_above = input.availability_above.complete(key)?;
            update_phi(&a_above, &s)
        } else {
            input.phi.complete(key)?
        };
        emit.push(Record::scalar(row, level, MatrixKind::Phi, phi));

        let r = dampen(
            update_responsibility(&a, &s, tau),
            &r,
            self.config.damping(),
        );

        emit.push(Record::new(row, level, MatrixKind::Availability, a));
        if level == 0 {
            emit.push(Record::new(row, level, MatrixKind::Similarity, s));
        }
        emit.push(Record::new(row, level, MatrixKind::Responsibility, r));
        Ok(())
    }
}

/// `C(i) = max_j (A(i,j) + R(i,j))` over columns that are valid exemplars,
/// or over all columns if none is.
pub(crate) fn update_preference<F>(
    a: &Array1<F>,
    r: &Array1<F>,
    diag_a: &Array1<F>,
    diag_r: &Array1<F>,
) -> F
where
    F: Float,
{
    let valid = valid_exemplars(diag_a.view(), diag_r.view());
    let sum = a + r;
    max_argmax_valid(sum.view(), &valid).1
}

/// `P(i) = max_j (A(i,j,l+1) + S(i,j))`
pub(crate) fn update_phi<F>(a_above: &Array1<F>, s: &Array1<F>) -> F
where
    F: Float,
{
    let sum = a_above + s;
    max_argmax(sum.view()).1
}

/// Undamped responsibility row.
///
/// With `m1 = max(A+S)` at `k1` and `m2` the max over every other column,
/// `R(k) = S(k) + min(-m1, tau)` for `k != k1` and
/// `R(k1) = S(k1) + min(-m2, tau)`. At `tau = +inf` this is the classic
/// `S(i,k) - max_{k' != k} (A(i,k') + S(i,k'))`.
pub(crate) fn update_responsibility<F>(a: &Array1<F>, s: &Array1<F>, tau: F) -> Array1<F>
where
    F: Float,
{
    let sum = a + s;
    let (k1, m1) = max_argmax(sum.view());
    let m2 = max_excluding(sum.view(), k1);
    let bound = (-m1).min(tau);
    let bound_k1 = (-m2).min(tau);
    let mut r = s.mapv(|v| v + bound);
    r[k1] = s[k1] + bound_k1;
    r
}
