//! Availability round: column-wise update of `A` and the level-below bound `T`.
//!
//! Map input is the responsibility round's output (row slices). The reducer
//! for `(k, l)` rebuilds column `k` and emits column slices, which is the
//! layout the next responsibility round and the cluster extractor expect.

use ndarray::Array1;
use num_traits::Float;

use crate::algorithm::dampen;
use crate::engine::{check_record, Emitted, MapReduce};
use crate::key::{MatrixKind, Message, ReduceKey};
use crate::record::Record;
use crate::vector::{PartialScalar, PartialVector};
use crate::{HapConfig, HapError};

pub struct AvailabilityPhase<F> {
    config: HapConfig<F>,
}

impl<F> AvailabilityPhase<F>
where
    F: Float + Send + Sync,
{
    pub fn new(config: &HapConfig<F>) -> Self {
        Self { config: *config }
    }

    /// Send every entry of a row slice to its column reducer at `target_level`.
    fn scatter_row(
        &self,
        record: &Record<F>,
        source_level: usize,
        target_level: usize,
        emit: &mut Emitted<F>,
    ) {
        let row = record.key.index;
        for (col, &value) in record.values.iter().enumerate() {
            emit.push((
                ReduceKey::new(col, target_level),
                Message::new(row, source_level, record.key.kind, value),
            ));
        }
    }
}

struct AvailabilityInput<F> {
    availability: PartialVector<F>,
    responsibility: PartialVector<F>,
    responsibility_below: Option<PartialVector<F>>,
    similarity: PartialVector<F>,
    tau: PartialScalar<F>,
    phi: PartialScalar<F>,
    preference: PartialScalar<F>,
    preference_below: Option<PartialScalar<F>>,
}

impl<F> AvailabilityInput<F>
where
    F: Float,
{
    fn collect(n: usize, key: ReduceKey, messages: &[Message<F>]) -> Result<Self, HapError> {
        let level = key.level;
        let below = level.checked_sub(1);
        let mut input = Self {
            availability: PartialVector::new(n, MatrixKind::Availability, level),
            responsibility: PartialVector::new(n, MatrixKind::Responsibility, level),
            responsibility_below: below
                .map(|l| PartialVector::new(n, MatrixKind::Responsibility, l)),
            similarity: PartialVector::new(n, MatrixKind::Similarity, level),
            tau: PartialScalar::new(MatrixKind::Tau, level),
            phi: PartialScalar::new(MatrixKind::Phi, level),
            preference: PartialScalar::new(MatrixKind::ExemplarPreference, level),
            preference_below: below.map(|l| PartialScalar::new(MatrixKind::ExemplarPreference, l)),
        };
        for message in messages {
            let source = message.source;
            let value = message.value;
            let from_below = below == Some(source.level);
            match source.kind {
                MatrixKind::Responsibility if source.level == level => {
                    input.responsibility.set(source.index, value)?
                }
                MatrixKind::Responsibility if from_below => {
                    if let Some(r_below) = input.responsibility_below.as_mut() {
                        r_below.set(source.index, value)?
                    }
                }
                MatrixKind::ExemplarPreference if source.level == level => {
                    input.preference.set(value)?
                }
                MatrixKind::ExemplarPreference if from_below => {
                    if let Some(c_below) = input.preference_below.as_mut() {
                        c_below.set(value)?
                    }
                }
                MatrixKind::Availability => input.availability.set(source.index, value)?,
                MatrixKind::Similarity => input.similarity.set(source.index, value)?,
                MatrixKind::Tau => input.tau.set(value)?,
                MatrixKind::Phi => input.phi.set(value)?,
                kind => {
                    return Err(HapError::InvalidMatrixIdentifier {
                        kind,
                        stage: "availability reduce",
                    })
                }
            }
        }
        Ok(input)
    }
}

impl<F> MapReduce<F> for AvailabilityPhase<F>
where
    F: Float + Send + Sync,
{
    type Output = Record<F>;

    fn name(&self) -> &'static str {
        "availability"
    }

    fn map(&self, record: &Record<F>, emit: &mut Emitted<F>) -> Result<(), HapError> {
        check_record(record, &self.config)?;
        let row = record.key.index;
        let level = record.key.level;
        let level_above = level + 1;
        match record.key.kind {
            MatrixKind::Availability => self.scatter_row(record, level, level, emit),
            MatrixKind::Responsibility => {
                self.scatter_row(record, level, level, emit);
                // the level above bounds its responsibilities with this one
                if level_above < self.config.levels() {
                    self.scatter_row(record, level, level_above, emit);
                }
            }
            MatrixKind::Similarity => {
                for l in 0..self.config.levels() {
                    self.scatter_row(record, l, l, emit);
                }
            }
            kind @ (MatrixKind::Tau | MatrixKind::Phi) => {
                emit.push((
                    ReduceKey::new(row, level),
                    Message::new(row, level, kind, record.values[0]),
                ));
            }
            MatrixKind::ExemplarPreference => {
                let message = Message::new(row, level, MatrixKind::ExemplarPreference, record.values[0]);
                emit.push((ReduceKey::new(row, level), message));
                if level_above < self.config.levels() {
                    emit.push((ReduceKey::new(row, level_above), message));
                }
            }
            kind => {
                return Err(HapError::InvalidMatrixIdentifier {
                    kind,
                    stage: "availability map",
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
        let col = key.index;
        let level = key.level;
        let input = AvailabilityInput::collect(self.config.n(), key, messages)?;

        let phi = input.phi.complete(key)?;
        let preference = input.preference.complete(key)?;
        emit.push(Record::scalar(col, level, MatrixKind::Phi, phi));
        emit.push(Record::scalar(
            col,
            level,
            MatrixKind::ExemplarPreference,
            preference,
        ));

        let tau = match (input.responsibility_below, input.preference_below) {
            (Some(r_below), Some(c_below)) => {
                update_tau(col, &r_below.complete(key)?, c_below.complete(key)?)
            }
            _ => input.tau.complete(key)?,
        };
        emit.push(Record::scalar(col, level, MatrixKind::Tau, tau));

        let r = input.responsibility.complete(key)?;
        if level == 0 {
            let s = input.similarity.complete(key)?;
            emit.push(Record::new(col, level, MatrixKind::Similarity, s));
        }

        let a = input.availability.complete(key)?;
        let a = dampen(
            update_availability(col, &r, preference + phi),
            &a,
            self.config.damping(),
        );
        emit.push(Record::new(col, level, MatrixKind::Responsibility, r));
        emit.push(Record::new(col, level, MatrixKind::Availability, a));
        Ok(())
    }
}

/// `T(k,l) = C(k,l-1) + R(k,k,l-1) + sum_{i != k} max(0, R(i,k,l-1))`
pub(crate) fn update_tau<F>(col: usize, r_below: &Array1<F>, c_below: F) -> F
where
    F: Float,
{
    let positive_sum = r_below
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != col)
        .fold(F::zero(), |acc, (_, &v)| acc + v.max(F::zero()));
    c_below + r_below[col] + positive_sum
}

/// Undamped availability column `k`.
///
/// Negative off-diagonal responsibilities are zeroed, `R(k,k)` is kept. Then
/// `A(i,k) = min(0, c_hat + sum(RPos) - RPos(i))` for `i != k`, and
/// `A(k,k) = c_hat + sum_{i != k} RPos(i)` without clipping.
pub(crate) fn update_availability<F>(col: usize, r: &Array1<F>, c_hat: F) -> Array1<F>
where
    F: Float,
{
    let mut r_pos = r.mapv(|v| v.max(F::zero()));
    r_pos[col] = r[col];
    let total = c_hat + r_pos.sum();
    let mut a = r_pos.mapv(|v| (total - v).min(F::zero()));
    // R(k,k) is left out of its own entry
    a[col] = r_pos
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != col)
        .fold(c_hat, |acc, (_, v)| acc + *v);
    a
}

#[cfg(test)]
mod test {
    use ndarray::{arr1, Array1};

    use crate::availability::{update_availability, update_tau, AvailabilityPhase};
    use crate::engine::Executor;
    use crate::key::MatrixKind;
    use crate::record::Record;
    use crate::HapConfig;

    #[test]
    fn classic_availability_when_preference_and_phi_are_zero() {
        let r: Array1<f64> = arr1(&[0.5, -1., 2., 3.]);
        let k = 2;
        let a = update_availability(k, &r, 0.);
        for i in 0..4 {
            let others: f64 = (0..4)
                .filter(|&j| j != i && j != k)
                .map(|j| r[j].max(0.))
                .sum();
            let expected = if i == k {
                others
            } else {
                (r[k] + others).min(0.)
            };
            assert!((a[i] - expected).abs() < 1e-12, "entry {}", i);
        }
    }

    #[test]
    fn c_hat_shifts_column() {
        let r = arr1(&[-1., -1., -1.]);
        // r_pos = [0, -1, 0] for k = 1, sum = -1
        let a = update_availability(1, &r, 0.25);
        assert_eq!(a, arr1(&[-0.75, 0.25, -0.75]));
    }

    #[test]
    fn diagonal_ignores_own_responsibility() {
        // a single vector has R(0,0) = +inf after its first round
        let a = update_availability(0, &arr1(&[f64::INFINITY]), 0.5);
        assert_eq!(a, arr1(&[0.5]));

        let r = arr1(&[2., f64::INFINITY, -3.]);
        let a = update_availability(1, &r, -1.);
        assert_eq!(a[1], 1.);
        assert_eq!(a[0], 0.);
        assert_eq!(a[2], 0.);
    }

    #[test]
    fn tau_from_level_below() {
        let r_below = arr1(&[1., -4., 2., -0.5]);
        // C + R(k,k) + positives excluding k
        assert_eq!(update_tau(1, &r_below, 10.), 10. - 4. + 3.);
        assert_eq!(update_tau(2, &r_below, 0.), 2. + 1.);
    }

    /// Responsibility-round output for `levels` levels, rows of R set to `r`.
    fn row_generation(r: &[Vec<f64>], levels: usize) -> Vec<Record<f64>> {
        let n = r.len();
        let mut records = Vec::new();
        for i in 0..n {
            records.push(Record::new(i, 0, MatrixKind::Similarity, Array1::from_elem(n, -1.)));
            for l in 0..levels {
                records.push(Record::new(i, l, MatrixKind::Responsibility, Array1::from(r[i].clone())));
                records.push(Record::new(i, l, MatrixKind::Availability, Array1::zeros(n)));
                records.push(Record::scalar(i, l, MatrixKind::ExemplarPreference, 0.5));
                records.push(Record::scalar(i, l, MatrixKind::Phi, 0.));
                records.push(Record::scalar(i, l, MatrixKind::Tau, f64::INFINITY));
            }
        }
        records
    }

    #[test]
    fn level_zero_tau_is_never_overwritten() {
        let r = vec![vec![1., -2., 3.], vec![0.5, 0.5, -1.], vec![2., 1., 0.]];
        let config = HapConfig::new(3, 2, 2, 0., 2).unwrap();
        let out = Executor::new(2)
            .unwrap()
            .run(&AvailabilityPhase::new(&config), &row_generation(&r, 2))
            .unwrap();
        for record in out.iter().filter(|rec| rec.key.kind == MatrixKind::Tau) {
            if record.key.level == 0 {
                assert_eq!(record.values[0], f64::INFINITY);
            } else {
                // column k of level 0's R, plus C = 0.5 from below
                let k = record.key.index;
                let column: Vec<f64> = r.iter().map(|row| row[k]).collect();
                let expected = update_tau(k, &Array1::from(column), 0.5);
                assert_eq!(record.values[0], expected);
            }
        }
        // S only survives at level 0, as column slices
        assert_eq!(
            out.iter()
                .filter(|rec| rec.key.kind == MatrixKind::Similarity)
                .count(),
            3
        );
        assert!(out
            .iter()
            .filter(|rec| rec.key.kind == MatrixKind::Similarity)
            .all(|rec| rec.key.level == 0));
    }

    #[test]
    fn emits_columns() {
        let r = vec![vec![1., -2., 3.], vec![0.5, 0.5, -1.], vec![2., 1., 0.]];
        let config = HapConfig::new(3, 1, 1, 0., 1).unwrap();
        let out = Executor::new(1)
            .unwrap()
            .run(&AvailabilityPhase::new(&config), &row_generation(&r, 1))
            .unwrap();
        let r_col_2 = out
            .iter()
            .find(|rec| rec.key.kind == MatrixKind::Responsibility && rec.key.index == 2)
            .unwrap();
        assert_eq!(r_col_2.values, arr1(&[3., -1., 0.]));
        let a_col_2 = out
            .iter()
            .find(|rec| rec.key.kind == MatrixKind::Availability && rec.key.index == 2)
            .unwrap();
        assert_eq!(a_col_2.values, update_availability(2, &arr1(&[3., -1., 0.]), 0.5));
    }
}
