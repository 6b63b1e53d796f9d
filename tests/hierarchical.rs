#[cfg(test)]
mod test {
    use std::path::Path;

    use hap::{
        Assignment, AvailabilityPhase, DirectoryStore, DistanceMeasure, Euclidean, Executor,
        HapConfig, HierarchicalAffinityPropagation, MatrixKind, MemoryStore, Record,
        ResponsibilityPhase, SimilarityMatrixBuilder, Storage,
    };
    use ndarray::{arr2, Array1, Array2};
    use num_traits::Float;
    use tempfile::tempdir;

    /// Three tight groups, far apart.
    fn blobs<F: Float>() -> Array2<F> {
        arr2(&[
            [0., 0.],
            [0.4, 0.1],
            [0.1, 0.6],
            [10., 10.],
            [10.5, 10.2],
            [9.8, 10.6],
            [-8., 12.],
            [-8.3, 12.4],
            [-7.6, 11.8],
        ])
        .mapv(|v: f64| F::from(v).unwrap())
    }

    /// Similarity with a fixed self-preference, so the outcome does not depend
    /// on the diagonal draws.
    fn similarity<F: Float + Send + Sync>(x: &Array2<F>, preference: F) -> Array2<F> {
        let n = x.nrows();
        let mut s = Array2::zeros((n, n));
        for i in 0..n {
            for j in 0..n {
                s[[i, j]] = if i == j {
                    preference
                } else {
                    -Euclidean.distance(&x.row(i), &x.row(j))
                };
            }
        }
        s
    }

    fn generation<F: Float>(s: &Array2<F>, levels: usize) -> Vec<Record<F>> {
        let n = s.nrows();
        // stored matrices are column slices
        let mut records: Vec<Record<F>> = (0..n)
            .map(|k| Record::new(k, 0, MatrixKind::Similarity, s.column(k).to_owned()))
            .collect();
        for level in 0..levels {
            for i in 0..n {
                records.push(Record::new(i, level, MatrixKind::Responsibility, Array1::zeros(n)));
                records.push(Record::new(i, level, MatrixKind::Availability, Array1::zeros(n)));
                records.push(Record::scalar(i, level, MatrixKind::ExemplarPreference, F::zero()));
                records.push(Record::scalar(i, level, MatrixKind::Phi, F::zero()));
                records.push(Record::scalar(i, level, MatrixKind::Tau, F::infinity()));
            }
        }
        records
    }

    fn exemplars(assignments: &[Assignment], level: usize) -> Vec<usize> {
        assignments
            .iter()
            .filter(|a| a.level == level)
            .map(|a| a.exemplar)
            .collect()
    }

    fn assert_blob_partition(labels: &[usize]) {
        for group in labels.chunks(3) {
            assert!(group.iter().all(|l| *l == group[0]), "{:?}", labels);
        }
        assert_ne!(labels[0], labels[3]);
        assert_ne!(labels[0], labels[6]);
        assert_ne!(labels[3], labels[6]);
    }

    /// One dense round of standard affinity propagation from zero messages.
    fn classic_first_round(s: &Array2<f64>) -> Vec<usize> {
        let n = s.nrows();
        let mut r = Array2::<f64>::zeros((n, n));
        for i in 0..n {
            for k in 0..n {
                let competitor = (0..n)
                    .filter(|&j| j != k)
                    .map(|j| s[[i, j]])
                    .fold(f64::NEG_INFINITY, f64::max);
                r[[i, k]] = s[[i, k]] - competitor;
            }
        }
        let mut a = Array2::<f64>::zeros((n, n));
        for k in 0..n {
            for i in 0..n {
                let support: f64 = (0..n)
                    .filter(|&j| j != i && j != k)
                    .map(|j| r[[j, k]].max(0.))
                    .sum();
                a[[i, k]] = if i == k {
                    support
                } else {
                    (r[[k, k]] + support).min(0.)
                };
            }
        }
        let valid: Vec<bool> = (0..n).map(|j| a[[j, j]] + r[[j, j]] > 0.).collect();
        let any_valid = valid.iter().any(|v| *v);
        (0..n)
            .map(|i| {
                let mut best: Option<usize> = None;
                for j in 0..n {
                    if any_valid && !valid[j] {
                        continue;
                    }
                    let v = a[[i, j]] + r[[i, j]];
                    match best {
                        Some(b) if a[[i, b]] + r[[i, b]] >= v => {}
                        _ => best = Some(j),
                    }
                }
                best.unwrap()
            })
            .collect()
    }

    #[test]
    fn single_round_on_disk_recovers_groups() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("input");
        let working = dir.path().join("work");
        let output = dir.path().join("output");
        let s = similarity::<f64>(&blobs(), -5.);

        let mut store = DirectoryStore::new();
        store.write(&input, &generation(&s, 1)).unwrap();
        let config = HapConfig::new(9, 1, 1, 0., 4).unwrap();
        let out = HierarchicalAffinityPropagation::new(config)
            .run(&mut store, &input, &working, &output)
            .unwrap();

        assert_eq!(out.len(), 9);
        assert_blob_partition(&exemplars(&out, 0));
        assert_eq!(
            Storage::<f64>::read_assignments(&store, &output).unwrap(),
            out
        );
        // only the final generation is left behind
        assert!(!working.join("RD0").exists());
        assert!(!working.join("CD").exists());
        assert!(input.exists());
    }

    #[test]
    fn levels_one_reduces_to_affinity_propagation() {
        for preference in [-3., -5., -8.] {
            let s = similarity::<f64>(&blobs(), preference);
            let mut store = MemoryStore::new();
            store.write(Path::new("in"), &generation(&s, 1)).unwrap();
            let config = HapConfig::new(9, 1, 1, 0., 2).unwrap();
            let out = HierarchicalAffinityPropagation::new(config)
                .run(&mut store, Path::new("in"), Path::new("w"), Path::new("out"))
                .unwrap();
            assert_eq!(exemplars(&out, 0), classic_first_round(&s));
        }
    }

    #[test]
    fn single_precision_agrees() {
        let s32 = similarity::<f32>(&blobs(), -5.);
        let mut store = MemoryStore::new();
        store.write(Path::new("in"), &generation(&s32, 1)).unwrap();
        let config = HapConfig::new(9, 1, 1, 0f32, 2).unwrap();
        let out32 = HierarchicalAffinityPropagation::new(config)
            .run(&mut store, Path::new("in"), Path::new("w"), Path::new("out"))
            .unwrap();
        let s64 = similarity::<f64>(&blobs(), -5.);
        assert_eq!(exemplars(&out32, 0), classic_first_round(&s64));
    }

    #[test]
    fn thread_count_does_not_change_results() {
        let s = similarity::<f64>(&blobs(), -4.);
        let run = |threads: usize| {
            let mut store = MemoryStore::new();
            store.write(Path::new("in"), &generation(&s, 3)).unwrap();
            let config = HapConfig::new(9, 3, 7, 0.6, threads).unwrap();
            HierarchicalAffinityPropagation::new(config)
                .run(&mut store, Path::new("in"), Path::new("w"), Path::new("out"))
                .unwrap()
        };
        let single = run(1);
        assert_eq!(single.len(), 27);
        assert_eq!(single, run(3));
        assert_eq!(single, run(8));
    }

    #[test]
    fn level_zero_tau_stays_unbounded() {
        let levels = 2;
        let s = similarity::<f64>(&blobs(), -5.);
        let config = HapConfig::new(9, levels, 4, 0.5, 2).unwrap();
        let executor = Executor::new(2).unwrap();
        let mut records = generation(&s, levels);
        for i in 0..config.iterations() {
            let responsibility = executor
                .run(&ResponsibilityPhase::new(&config, i), &records)
                .unwrap();
            records = executor
                .run(&AvailabilityPhase::new(&config), &responsibility)
                .unwrap();
            for r in records.iter().filter(|r| r.key.kind == MatrixKind::Tau) {
                if r.key.level == 0 {
                    assert_eq!(r.values[0], f64::INFINITY);
                } else {
                    assert!(r.values[0].is_finite());
                }
            }
        }
        // every generation is complete: S once, then R, A, C, P, T per row and level
        assert_eq!(records.len(), 9 + 9 * 5 * levels);
    }

    #[test]
    fn single_vector_stays_finite() {
        let s = arr2(&[[-1.]]);
        let config = HapConfig::new(1, 1, 3, 0.5, 1).unwrap();
        let executor = Executor::new(1).unwrap();
        let mut records = generation(&s, 1);
        for i in 0..config.iterations() {
            let responsibility = executor
                .run(&ResponsibilityPhase::new(&config, i), &records)
                .unwrap();
            records = executor
                .run(&AvailabilityPhase::new(&config), &responsibility)
                .unwrap();
            assert!(records.iter().all(|r| !r.values[0].is_nan()), "{:?}", records);
        }

        let mut store = MemoryStore::new();
        store.write(Path::new("in"), &generation(&s, 1)).unwrap();
        let out = HierarchicalAffinityPropagation::new(config)
            .run(&mut store, Path::new("in"), Path::new("w"), Path::new("out"))
            .unwrap();
        assert_eq!(exemplars(&out, 0), vec![0]);
    }

    #[test]
    fn predict_groups_by_level() {
        let levels = 2;
        let config = HapConfig::new(9, levels, 4, 0.5, 2).unwrap();
        let builder = SimilarityMatrixBuilder::new(levels, 2.).seed(5);
        let hap = HierarchicalAffinityPropagation::new(config);
        let clusters = hap.predict(&blobs::<f64>(), &builder, &Euclidean).unwrap();
        assert_eq!(clusters.num_levels(), levels);
        for level in 0..levels {
            let members: usize = clusters.level(level).unwrap().values().map(|m| m.len()).sum();
            assert_eq!(members, 9);
        }
        // seeded builds give the same hierarchy
        assert_eq!(
            clusters,
            hap.predict(&blobs::<f64>(), &builder, &Euclidean).unwrap()
        );
    }
}
