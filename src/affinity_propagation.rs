use std::path::{Path, PathBuf};

use ndarray::Array2;
use num_traits::Float;
use tracing::{info, warn};

use crate::availability::AvailabilityPhase;
use crate::builder::SimilarityMatrixBuilder;
use crate::cluster::{ClusterExtractor, ClusterHierarchy};
use crate::engine::Executor;
use crate::key::MatrixKind;
use crate::record::Assignment;
use crate::responsibility::ResponsibilityPhase;
use crate::similarity::DistanceMeasure;
use crate::storage::{MemoryStore, Storage};
use crate::{HapConfig, HapError};

/// Drives alternating responsibility and availability rounds over durable
/// generations, then extracts one exemplar per `(row, level)`.
pub struct HierarchicalAffinityPropagation<F> {
    config: HapConfig<F>,
}

impl<F> HierarchicalAffinityPropagation<F>
where
    F: Float + Send + Sync,
{
    pub fn new(config: HapConfig<F>) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &HapConfig<F> {
        &self.config
    }

    /// Generation written by the responsibility round of `iteration`.
    pub fn responsibility_generation(working: &Path, iteration: usize) -> PathBuf {
        working.join(format!("RD{}", iteration))
    }

    /// Generation written by the availability round of `iteration`, except the last.
    pub fn availability_generation(working: &Path, iteration: usize) -> PathBuf {
        working.join(format!("AD{}", iteration))
    }

    /// Last availability output, read once by the cluster extractor.
    pub fn cluster_generation(working: &Path) -> PathBuf {
        working.join("CD")
    }

    /// Every generation a run may write under `working`.
    fn working_generations(&self, working: &Path) -> Vec<PathBuf> {
        let mut generations = vec![Self::cluster_generation(working)];
        for i in 0..self.config.iterations() {
            generations.push(Self::responsibility_generation(working, i));
            generations.push(Self::availability_generation(working, i));
        }
        generations
    }

    fn validate<S>(&self, store: &S, input: &Path, working: &Path, output: &Path) -> Result<(), HapError>
    where
        S: Storage<F> + ?Sized,
    {
        if !store.exists(input) {
            return Err(HapError::InputNotFound {
                path: input.to_path_buf(),
            });
        }
        if !store.has_matrix(input, MatrixKind::Similarity)? {
            return Err(HapError::InputNotFound {
                path: input.join(MatrixKind::Similarity.tag().to_string()),
            });
        }
        if store.exists(output) {
            return Err(HapError::AlreadyExists {
                path: output.to_path_buf(),
            });
        }
        match self
            .working_generations(working)
            .into_iter()
            .find(|p| store.exists(p))
        {
            Some(path) => Err(HapError::AlreadyExists { path }),
            None => Ok(()),
        }
    }

    /// Run every configured iteration on the generation at `input` and write the
    /// final assignments to `output`. Intermediate generations live under
    /// `working` and are deleted as soon as the next round has consumed them.
    /// `input` itself is left in place. If any round fails, the working
    /// generations written so far are removed before the error is returned.
    pub fn run<S>(
        &self,
        store: &mut S,
        input: &Path,
        working: &Path,
        output: &Path,
    ) -> Result<Vec<Assignment>, HapError>
    where
        S: Storage<F> + ?Sized,
    {
        self.validate(store, input, working, output)?;
        let executor = Executor::new(self.config.threads())?;
        let iterations = self.config.iterations();
        info!(
            n = self.config.n(),
            levels = self.config.levels(),
            iterations,
            threads = self.config.threads(),
            "starting hierarchical affinity propagation"
        );

        let result = self.iterate(store, &executor, input, working, output);
        if result.is_err() {
            self.discard(store, working);
        }
        result
    }

    /// Remove whatever working generations a failed run left behind. Only
    /// names that `validate` found free are touched.
    fn discard<S>(&self, store: &mut S, working: &Path)
    where
        S: Storage<F> + ?Sized,
    {
        for generation in self.working_generations(working) {
            if !store.exists(&generation) {
                continue;
            }
            warn!(generation = %generation.display(), "removing generation from failed run");
            if let Err(e) = store.delete(&generation) {
                warn!(generation = %generation.display(), error = %e, "unable to remove generation");
            }
        }
    }

    fn iterate<S>(
        &self,
        store: &mut S,
        executor: &Executor,
        input: &Path,
        working: &Path,
        output: &Path,
    ) -> Result<Vec<Assignment>, HapError>
    where
        S: Storage<F> + ?Sized,
    {
        let iterations = self.config.iterations();
        let mut current = input.to_path_buf();
        for i in 0..iterations {
            info!(iteration = i + 1, of = iterations, "responsibility round");
            let records = store.read(&current)?;
            let phase = ResponsibilityPhase::new(&self.config, i);
            let responsibility = executor.run(&phase, &records)?;
            let rd = Self::responsibility_generation(working, i);
            store.write(&rd, &responsibility)?;
            drop(responsibility);
            if i > 0 {
                store.delete(&current)?;
            }

            info!(iteration = i + 1, of = iterations, "availability round");
            let records = store.read(&rd)?;
            let availability = executor.run(&AvailabilityPhase::new(&self.config), &records)?;
            let ad = if i + 1 == iterations {
                Self::cluster_generation(working)
            } else {
                Self::availability_generation(working, i)
            };
            store.write(&ad, &availability)?;
            store.delete(&rd)?;
            current = ad;
        }

        info!("extracting clusters");
        let records = store.read(&current)?;
        let mut assignments = executor.run(&ClusterExtractor::new(&self.config), &records)?;
        assignments.sort_by_key(|a| (a.level, a.row));
        store.write_assignments(output, &assignments)?;
        store.delete(&current)?;
        info!(assignments = assignments.len(), "done");
        Ok(assignments)
    }

    /// Build, iterate and extract entirely in memory.
    ///
    /// The builder's level count must match the configuration, and `x` must
    /// have exactly `n` rows.
    pub fn predict<M>(
        &self,
        x: &Array2<F>,
        builder: &SimilarityMatrixBuilder,
        measure: &M,
    ) -> Result<ClusterHierarchy, HapError>
    where
        M: DistanceMeasure<F> + ?Sized,
    {
        if x.nrows() != self.config.n() {
            return Err(HapError::configuration(format!(
                "configured for {} vectors, received {}",
                self.config.n(),
                x.nrows()
            )));
        }
        if builder.levels() != self.config.levels() {
            return Err(HapError::configuration(format!(
                "builder produces {} levels, configured for {}",
                builder.levels(),
                self.config.levels()
            )));
        }
        let records = builder.build(x, measure)?;
        let mut store = MemoryStore::new();
        let input = Path::new("input");
        let output = Path::new("output");
        store.write(input, &records)?;
        drop(records);
        let assignments = self.run(&mut store, input, Path::new("work"), output)?;
        Ok(ClusterHierarchy::new(assignments, self.config.levels()))
    }
}

#[cfg(test)]
mod test {
    use std::path::Path;

    use ndarray::{arr2, Array2};

    use crate::affinity_propagation::HierarchicalAffinityPropagation;
    use crate::builder::SimilarityMatrixBuilder;
    use crate::key::MatrixKind;
    use crate::record::Record;
    use crate::similarity::Euclidean;
    use crate::storage::{MemoryStore, Storage};
    use crate::{HapConfig, HapError};

    fn points() -> Array2<f64> {
        arr2(&[[0., 0.], [0.5, 0.], [0., 0.5], [10., 10.], [10.5, 10.], [10., 10.5]])
    }

    fn seeded_store(levels: usize) -> MemoryStore<f64> {
        let records = SimilarityMatrixBuilder::new(levels, 1.)
            .seed(3)
            .build(&points(), &Euclidean)
            .unwrap();
        let mut store = MemoryStore::new();
        store.write(Path::new("in"), &records).unwrap();
        store
    }

    #[test]
    fn rejects_missing_input() {
        let hap = HierarchicalAffinityPropagation::new(HapConfig::new(6, 1, 1, 0., 1).unwrap());
        let mut store: MemoryStore<f64> = MemoryStore::new();
        assert!(matches!(
            hap.run(&mut store, Path::new("in"), Path::new("w"), Path::new("out")),
            Err(HapError::InputNotFound { .. })
        ));

        // present, but without a similarity matrix
        store
            .write(Path::new("in"), &[Record::scalar(0, 0, MatrixKind::Tau, 1.)])
            .unwrap();
        assert!(matches!(
            hap.run(&mut store, Path::new("in"), Path::new("w"), Path::new("out")),
            Err(HapError::InputNotFound { .. })
        ));
    }

    #[test]
    fn rejects_existing_output() {
        let hap = HierarchicalAffinityPropagation::new(HapConfig::new(6, 1, 2, 0., 1).unwrap());
        let mut store = seeded_store(1);
        store.write_assignments(Path::new("out"), &[]).unwrap();
        assert!(matches!(
            hap.run(&mut store, Path::new("in"), Path::new("w"), Path::new("out")),
            Err(HapError::AlreadyExists { .. })
        ));
        // nothing was started
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn intermediate_generations_are_removed() {
        let hap = HierarchicalAffinityPropagation::new(HapConfig::new(6, 2, 4, 0.5, 2).unwrap());
        let mut store = seeded_store(2);
        let out = hap
            .run(&mut store, Path::new("in"), Path::new("w"), Path::new("out"))
            .unwrap();
        assert_eq!(store.len(), 2);
        assert!(store.exists(Path::new("in")));
        assert_eq!(store.read_assignments(Path::new("out")).unwrap(), out);
    }

    #[test]
    fn one_assignment_per_row_and_level() {
        let levels = 3;
        let hap = HierarchicalAffinityPropagation::new(HapConfig::new(6, levels, 6, 0.5, 3).unwrap());
        let mut store = seeded_store(levels);
        let out = hap
            .run(&mut store, Path::new("in"), Path::new("w"), Path::new("out"))
            .unwrap();
        assert_eq!(out.len(), 6 * levels);
        for (idx, a) in out.iter().enumerate() {
            assert_eq!(a.level, idx / 6);
            assert_eq!(a.row, idx % 6);
            assert!(a.exemplar < 6);
        }
    }

    #[test]
    fn repeated_runs_are_identical() {
        let hap = HierarchicalAffinityPropagation::new(HapConfig::new(6, 2, 5, 0.7, 4).unwrap());
        let mut first = seeded_store(2);
        let mut second = seeded_store(2);
        let a = hap
            .run(&mut first, Path::new("in"), Path::new("w"), Path::new("out"))
            .unwrap();
        let b = hap
            .run(&mut second, Path::new("in"), Path::new("w"), Path::new("out"))
            .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn predict_checks_shape() {
        let hap = HierarchicalAffinityPropagation::new(HapConfig::new(5, 1, 1, 0., 1).unwrap());
        let builder = SimilarityMatrixBuilder::new(1, 1.).seed(0);
        assert!(matches!(
            hap.predict(&points(), &builder, &Euclidean),
            Err(HapError::Configuration { .. })
        ));
        let hap = HierarchicalAffinityPropagation::new(HapConfig::new(6, 1, 1, 0., 1).unwrap());
        let builder = SimilarityMatrixBuilder::new(2, 1.).seed(0);
        assert!(matches!(
            hap.predict(&points(), &builder, &Euclidean),
            Err(HapError::Configuration { .. })
        ));
    }
}
