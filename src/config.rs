use num_traits::Float;

use crate::HapError;

/// Immutable run parameters, handed by reference to every phase.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HapConfig<F> {
    n: usize,
    levels: usize,
    iterations: usize,
    damping: F,
    threads: usize,
}

impl<F> HapConfig<F>
where
    F: Float,
{
    /// - n: number of vectors, fixed for the whole run
    /// - levels: number of hierarchy levels, level 0 is the finest
    /// - iterations: responsibility/availability rounds, at least `levels`
    /// - damping: lambda in [0, 1)
    /// - threads: worker pool size
    pub fn new(
        n: usize,
        levels: usize,
        iterations: usize,
        damping: F,
        threads: usize,
    ) -> Result<Self, HapError> {
        if n == 0 {
            return Err(HapError::configuration("N must be greater than 0"));
        }
        if levels == 0 {
            return Err(HapError::configuration("at least one level is required"));
        }
        if iterations < levels {
            return Err(HapError::configuration(format!(
                "iterations ({}) must be >= levels ({})",
                iterations, levels
            )));
        }
        if !damping.is_finite() || damping < F::zero() || damping >= F::one() {
            return Err(HapError::configuration(
                "damping must be in the range [0, 1)",
            ));
        }
        if threads == 0 {
            return Err(HapError::configuration("at least one worker thread is required"));
        }
        Ok(Self {
            n,
            levels,
            iterations,
            damping,
            threads,
        })
    }

    pub fn n(&self) -> usize {
        self.n
    }

    pub fn levels(&self) -> usize {
        self.levels
    }

    pub fn iterations(&self) -> usize {
        self.iterations
    }

    pub fn damping(&self) -> F {
        self.damping
    }

    pub fn threads(&self) -> usize {
        self.threads
    }

    pub fn top_level(&self) -> usize {
        self.levels - 1
    }
}
