use ndarray::{Array1, Array2, Axis, Zip};
use num_traits::Float;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::info;

use crate::key::MatrixKind;
use crate::record::Record;
use crate::similarity::DistanceMeasure;
use crate::HapError;

/// Produces generation 0: the level-0 similarity matrix plus zeroed message
/// matrices for every level.
#[derive(Debug, Clone)]
pub struct SimilarityMatrixBuilder {
    levels: usize,
    diagonal_scale: f64,
    seed: Option<u64>,
}

impl SimilarityMatrixBuilder {
    /// - levels: hierarchy depth L
    /// - diagonal_scale: sigma, self-preferences are drawn from (-sigma, 0]
    pub fn new(levels: usize, diagonal_scale: f64) -> Self {
        Self {
            levels,
            diagonal_scale,
            seed: None,
        }
    }

    /// Fix the diagonal draws. Without a seed the generator is seeded from entropy.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn levels(&self) -> usize {
        self.levels
    }

    fn validate(&self, n: usize) -> Result<(), HapError> {
        if n == 0 {
            return Err(HapError::EmptySeedSet);
        }
        if !self.diagonal_scale.is_finite() || self.diagonal_scale < 0. {
            return Err(HapError::InvalidScale {
                scale: self.diagonal_scale,
            });
        }
        if self.levels == 0 {
            return Err(HapError::configuration("at least one level is required"));
        }
        Ok(())
    }

    /// One self-preference per row, drawn in row order.
    fn diagonal<F>(&self, n: usize) -> Result<Array1<F>, HapError>
    where
        F: Float,
    {
        let mut rng = match self.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };
        let mut diag = Vec::with_capacity(n);
        for _ in 0..n {
            let draw = -(rng.gen::<f64>() * self.diagonal_scale);
            diag.push(F::from(draw).ok_or(HapError::InvalidScale {
                scale: self.diagonal_scale,
            })?);
        }
        Ok(Array1::from(diag))
    }

    /// N x N similarity: `-distance(x_i, x_j)` off the diagonal, a random
    /// self-preference on it. Row `i` of the result is row `i` of `S`.
    pub fn similarity_matrix<F, M>(&self, x: &Array2<F>, measure: &M) -> Result<Array2<F>, HapError>
    where
        F: Float + Send + Sync,
        M: DistanceMeasure<F> + ?Sized,
    {
        let n = x.nrows();
        self.validate(n)?;
        let diag = self.diagonal::<F>(n)?;
        let mut out = Array2::<F>::zeros((n, n));
        Zip::indexed(out.axis_iter_mut(Axis(0)))
            .and(x.axis_iter(Axis(0)))
            .par_for_each(|i, mut row, xi| {
                x.axis_iter(Axis(0)).enumerate().for_each(|(j, xj)| {
                    row[j] = if i == j {
                        diag[i]
                    } else {
                        -measure.distance(&xi, &xj)
                    };
                });
            });
        Ok(out)
    }

    /// Full input generation for the first responsibility round. `S` is stored
    /// as column slices: record `k` holds `S(., k)`.
    pub fn build<F, M>(&self, x: &Array2<F>, measure: &M) -> Result<Vec<Record<F>>, HapError>
    where
        F: Float + Send + Sync,
        M: DistanceMeasure<F> + ?Sized,
    {
        let s = self.similarity_matrix(x, measure)?;
        let n = s.nrows();
        let mut records = Vec::with_capacity(n * (1 + 5 * self.levels));
        s.axis_iter(Axis(1)).enumerate().for_each(|(k, column)| {
            records.push(Record::new(k, 0, MatrixKind::Similarity, column.to_owned()));
        });
        for level in 0..self.levels {
            for i in 0..n {
                records.push(Record::new(i, level, MatrixKind::Responsibility, Array1::zeros(n)));
                records.push(Record::new(i, level, MatrixKind::Availability, Array1::zeros(n)));
                records.push(Record::scalar(i, level, MatrixKind::ExemplarPreference, F::zero()));
                records.push(Record::scalar(i, level, MatrixKind::Phi, F::zero()));
                records.push(Record::scalar(i, level, MatrixKind::Tau, F::infinity()));
            }
        }
        info!(
            n,
            levels = self.levels,
            scale = self.diagonal_scale,
            records = records.len(),
            "similarity matrix built"
        );
        Ok(records)
    }
}
