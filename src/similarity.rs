use ndarray::{ArrayView1, Zip};
use num_traits::Float;

/// Pairwise distance between two input vectors. The similarity matrix
/// stores the negated distance.
pub trait DistanceMeasure<F>: Sync
where
    F: Float + Send + Sync,
{
    fn distance(&self, a: &ArrayView1<F>, b: &ArrayView1<F>) -> F;
}

/// `sqrt(sum((a - b)**2))`
///
///     use ndarray::arr1;
///     use hap::{DistanceMeasure, Euclidean};
///
///     let d = Euclidean::default().distance(&arr1(&[0., 0.]).view(), &arr1(&[3., 4.]).view());
///     assert!((d - 5.0_f64).abs() < 1e-12);
#[derive(Debug, Default, Clone)]
pub struct Euclidean;

impl<F> DistanceMeasure<F> for Euclidean
where
    F: Float + Send + Sync,
{
    fn distance(&self, a: &ArrayView1<F>, b: &ArrayView1<F>) -> F {
        SquaredEuclidean.distance(a, b).sqrt()
    }
}

/// `sum((a - b)**2)`
#[derive(Debug, Default, Clone)]
pub struct SquaredEuclidean;

impl<F> DistanceMeasure<F> for SquaredEuclidean
where
    F: Float + Send + Sync,
{
    fn distance(&self, a: &ArrayView1<F>, b: &ArrayView1<F>) -> F {
        Zip::from(a)
            .and(b)
            .fold(F::zero(), |acc, &x, &y| acc + (x - y).powi(2))
    }
}

/// `sum(|a - b|)`
#[derive(Debug, Default, Clone)]
pub struct Manhattan;

impl<F> DistanceMeasure<F> for Manhattan
where
    F: Float + Send + Sync,
{
    fn distance(&self, a: &ArrayView1<F>, b: &ArrayView1<F>) -> F {
        Zip::from(a)
            .and(b)
            .fold(F::zero(), |acc, &x, &y| acc + (x - y).abs())
    }
}

/// `1 - (a . b)/(|a|*|b|)`, taken as 1 when either vector has zero length
#[derive(Debug, Default, Clone)]
pub struct Cosine;

impl<F> DistanceMeasure<F> for Cosine
where
    F: Float + Send + Sync,
{
    fn distance(&self, a: &ArrayView1<F>, b: &ArrayView1<F>) -> F {
        let dot_product = Zip::from(a)
            .and(b)
            .fold(F::zero(), |acc, &x, &y| acc + x * y);
        let a_magnitude = a.fold(F::zero(), |acc, &x| acc + x * x).sqrt();
        let b_magnitude = b.fold(F::zero(), |acc, &x| acc + x * x).sqrt();
        let denominator = a_magnitude * b_magnitude;
        if denominator == F::zero() {
            return F::one();
        }
        F::one() - dot_product / denominator
    }
}

/// Select a provided measure by name, as used on the command line.
pub fn measure_by_name<F>(name: &str) -> Option<Box<dyn DistanceMeasure<F>>>
where
    F: Float + Send + Sync,
{
    match name {
        "euclidean" => Some(Box::new(Euclidean)),
        "squared" | "squared-euclidean" => Some(Box::new(SquaredEuclidean)),
        "manhattan" => Some(Box::new(Manhattan)),
        "cosine" => Some(Box::new(Cosine)),
        _ => None,
    }
}
