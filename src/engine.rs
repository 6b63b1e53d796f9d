//! In-process map/shuffle/reduce executor.
//!
//! A phase is anything implementing [`MapReduce`]. [`Executor::run`] is a full
//! barrier: it returns only once every reduce key has been processed, and it
//! returns nothing at all if any single map or reduce invocation fails.

use std::collections::BTreeMap;

use num_traits::Float;
use rayon::prelude::*;
use tracing::debug;

use crate::key::{MatrixKind, Message, ReduceKey};
use crate::record::Record;
use crate::{HapConfig, HapError};

pub type Emitted<F> = Vec<(ReduceKey, Message<F>)>;

pub trait MapReduce<F>: Sync
where
    F: Float + Send + Sync,
{
    type Output: Send;

    fn name(&self) -> &'static str;

    /// Split one input record into keyed messages.
    fn map(&self, record: &Record<F>, emit: &mut Emitted<F>) -> Result<(), HapError>;

    /// Combine every message sharing `key`. Message order is unspecified.
    fn reduce(
        &self,
        key: ReduceKey,
        messages: &[Message<F>],
        emit: &mut Vec<Self::Output>,
    ) -> Result<(), HapError>;
}

pub struct Executor {
    pool: rayon::ThreadPool,
}

impl Executor {
    pub fn new(threads: usize) -> Result<Self, HapError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build()?;
        Ok(Self { pool })
    }

    /// Run one phase over a complete input generation. Output is ordered by
    /// reduce key, then by emission order within the reducer.
    pub fn run<F, P>(&self, phase: &P, input: &[Record<F>]) -> Result<Vec<P::Output>, HapError>
    where
        F: Float + Send + Sync,
        P: MapReduce<F>,
    {
        self.pool.install(|| {
            let mapped: Vec<Emitted<F>> = input
                .par_iter()
                .map(|record| {
                    let mut emit = Vec::new();
                    phase.map(record, &mut emit)?;
                    Ok(emit)
                })
                .collect::<Result<_, HapError>>()?;

            let mut groups: BTreeMap<ReduceKey, Vec<Message<F>>> = BTreeMap::new();
            let mut message_count = 0;
            for (key, message) in mapped.into_iter().flatten() {
                groups.entry(key).or_default().push(message);
                message_count += 1;
            }
            debug!(
                phase = phase.name(),
                records = input.len(),
                messages = message_count,
                keys = groups.len(),
                "shuffle complete"
            );

            let reduced: Vec<Vec<P::Output>> = groups
                .into_par_iter()
                .map(|(key, messages)| {
                    let mut emit = Vec::new();
                    phase.reduce(key, &messages, &mut emit)?;
                    Ok(emit)
                })
                .collect::<Result<_, HapError>>()?;
            Ok(reduced.into_iter().flatten().collect())
        })
    }
}

/// Check a record's coordinates and length against the run configuration.
pub(crate) fn check_record<F>(record: &Record<F>, config: &HapConfig<F>) -> Result<(), HapError>
where
    F: Float,
{
    let key = record.key;
    if key.index >= config.n() {
        return Err(HapError::IndexOutOfRange {
            what: "record index",
            index: key.index,
            bound: config.n(),
        });
    }
    if key.level >= config.levels() {
        return Err(HapError::IndexOutOfRange {
            what: "record level",
            index: key.level,
            bound: config.levels(),
        });
    }
    let expected = if key.kind.is_scalar() { 1 } else { config.n() };
    if record.values.len() != expected {
        return Err(HapError::LengthMismatch {
            key,
            expected,
            actual: record.values.len(),
        });
    }
    Ok(())
}

/// Send a stored column slice of `A` or `R` to every row reducer at its
/// level, together with the column's diagonal entry under the lowercase tag.
pub(crate) fn scatter_column<F>(record: &Record<F>, diagonal: MatrixKind, emit: &mut Emitted<F>)
where
    F: Float + Send + Sync,
{
    let col = record.key.index;
    let level = record.key.level;
    let diag_value = record.values[col];
    for row in 0..record.values.len() {
        emit.push((
            ReduceKey::new(row, level),
            Message::new(col, level, diagonal, diag_value),
        ));
    }
    for (row, &value) in record.values.iter().enumerate() {
        emit.push((
            ReduceKey::new(row, level),
            Message::new(col, level, record.key.kind, value),
        ));
    }
}
