use ndarray::{Array1, ArrayView1, Zip};
use num_traits::Float;

/// Largest value and its position. Ties resolve to the lowest index.
pub(crate) fn max_argmax<F>(data: ArrayView1<F>) -> (usize, F)
where
    F: Float,
{
    let mut max_pos = 0;
    let mut max: F = data[0];
    data.iter().enumerate().for_each(|(idx, val)| {
        if *val > max {
            max = *val;
            max_pos = idx;
        }
    });
    (max_pos, max)
}

/// Largest value over every position except `exclude`; `-inf` when nothing remains.
pub(crate) fn max_excluding<F>(data: ArrayView1<F>, exclude: usize) -> F
where
    F: Float,
{
    data.iter()
        .enumerate()
        .filter(|(idx, _)| *idx != exclude)
        .fold(F::neg_infinity(), |max, (_, &val)| if val > max { val } else { max })
}

/// Columns whose self-availability plus self-responsibility is positive.
pub(crate) fn valid_exemplars<F>(diag_a: ArrayView1<F>, diag_r: ArrayView1<F>) -> Vec<bool>
where
    F: Float,
{
    Zip::from(&diag_a)
        .and(&diag_r)
        .map_collect(|&a, &r| a + r > F::zero())
        .to_vec()
}

/// Argmax restricted to the valid columns, or over every column if none is valid.
pub(crate) fn max_argmax_valid<F>(data: ArrayView1<F>, valid: &[bool]) -> (usize, F)
where
    F: Float,
{
    if !valid.iter().any(|v| *v) {
        return max_argmax(data);
    }
    let mut best: Option<(usize, F)> = None;
    for (idx, (&val, &ok)) in data.iter().zip(valid.iter()).enumerate() {
        if !ok {
            continue;
        }
        if best.map_or(true, |(_, max)| val > max) {
            best = Some((idx, val));
        }
    }
    best.unwrap_or_else(|| max_argmax(data))
}

/// `(1 - damping) * computed + damping * old`
pub(crate) fn dampen<F>(computed: Array1<F>, old: &Array1<F>, damping: F) -> Array1<F>
where
    F: Float,
{
    if damping == F::zero() {
        return computed;
    }
    let inv_damping = F::one() - damping;
    Zip::from(&computed)
        .and(old)
        .map_collect(|&c, &o| inv_damping * c + damping * o)
}

#[cfg(test)]
mod test {
    use ndarray::arr1;

    use crate::algorithm::{dampen, max_argmax, max_argmax_valid, max_excluding, valid_exemplars};

    #[test]
    fn argmax_ties_take_lowest_index() {
        let data = arr1(&[1., 3., 3., -2.]);
        assert_eq!(max_argmax(data.view()), (1, 3.));
        assert_eq!(max_excluding(data.view(), 1), 3.);
        assert_eq!(max_excluding(data.view(), 0), 3.);
        assert_eq!(max_excluding(arr1(&[5.]).view(), 0), f64::NEG_INFINITY);
    }

    #[test]
    fn restricted_argmax() {
        let data = arr1(&[9., 2., 4., 4.]);
        let valid = valid_exemplars(arr1(&[1., -1., 0.5, 0.]).view(), arr1(&[0., 0., 0., 1.]).view());
        assert_eq!(valid, vec![true, false, true, true]);
        assert_eq!(max_argmax_valid(data.view(), &[false, false, true, true]), (2, 4.));
        assert_eq!(max_argmax_valid(data.view(), &[false; 4]), (0, 9.));
    }

    #[test]
    fn damping_identity() {
        let computed: ndarray::Array1<f64> = arr1(&[1., -2., 0.25]);
        let old = arr1(&[7., 8., 9.]);
        assert_eq!(dampen(computed.clone(), &old, 0.), computed);
        let old2 = arr1(&[14., 16., 18.]);
        let a = dampen(computed.clone(), &old, 0.5);
        let b = dampen(computed.clone(), &old2, 0.5);
        // linear in the previous value: b - a == 0.5 * (old2 - old)
        for i in 0..3 {
            assert!(((b[i] - a[i]) - 0.5 * (old2[i] - old[i])).abs() < 1e-12);
        }
    }
}
