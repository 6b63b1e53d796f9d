//! Hierarchical Affinity Propagation as a sequence of in-process
//! map/shuffle/reduce rounds over durable matrix generations.
//!
//!     use ndarray::arr2;
//!     use hap::{Euclidean, HapConfig, HierarchicalAffinityPropagation, SimilarityMatrixBuilder};
//!
//!     let x = arr2(&[[0., 0.], [0.4, 0.1], [10., 10.], [10.5, 10.2]]);
//!     let config = HapConfig::new(4, 2, 4, 0.5, 2).unwrap();
//!     let builder = SimilarityMatrixBuilder::new(2, 1.).seed(11);
//!     let clusters = HierarchicalAffinityPropagation::new(config)
//!         .predict(&x, &builder, &Euclidean)
//!         .unwrap();
//!     assert_eq!(clusters.assignments().len(), 8);

pub use affinity_propagation::HierarchicalAffinityPropagation;
pub use availability::AvailabilityPhase;
pub use builder::SimilarityMatrixBuilder;
pub use cluster::{ClusterExtractor, ClusterHierarchy};
pub use config::HapConfig;
pub use engine::{Emitted, Executor, MapReduce};
pub use error::HapError;
pub use key::{decode, CellKey, MatrixKind, Message, ReduceKey};
pub use record::{Assignment, Record};
pub use responsibility::ResponsibilityPhase;
pub use similarity::{measure_by_name, Cosine, DistanceMeasure, Euclidean, Manhattan, SquaredEuclidean};
pub use storage::{DirectoryStore, MemoryStore, Storage, PART_FILE};

mod affinity_propagation;
mod algorithm;
mod availability;
mod builder;
mod cluster;
mod config;
mod engine;
mod error;
mod key;
mod record;
mod responsibility;
mod similarity;
mod storage;
mod vector;
