//! VCAL-bench — reproducible ANN datasets and HNSW build/query sweeps.
//!
//! * Library MSRV 1.74  (edition 2021)
//! * Optional SSE/AVX distance kernels behind `--features simd`
//! * Datasets in a packed binary layout (`.bin`) or an HDF5 container (`.hdf5`)
//!
//! ## Quick-start
//! ```rust
//! use std::sync::Arc;
//! use vcal_bench::{Benchmark, BenchmarkConfig, Dataset, DatasetParams, HnswIndexer};
//!
//! let mut d = Dataset::new(DatasetParams {
//!     angular: false, dim: 8, k: 5, test_count: 10, train_count: 200, seed: 1,
//! }).unwrap();
//! d.generate();
//!
//! let cfg = BenchmarkConfig::new(64, vec![10, 40], 8, 1);
//! let mut b = Benchmark::new(Arc::new(d), cfg, HnswIndexer).unwrap();
//! b.run(true).unwrap();
//! let recall = b.query_stats().unwrap().unwrap().get(40).unwrap().avg_recall;
//! assert!((0.0..=1.0).contains(&recall));
//! ```

mod errors;
mod graph;
mod math;
mod node;
mod params;
mod rand_level;

pub mod benchmark;
pub mod codec;
pub mod config;
pub mod dataset;
pub mod generator;
pub mod hnsw;
pub mod index;
pub mod logging;
pub mod matrix;
pub mod oracle;
pub mod simd;
pub mod stats;

pub use benchmark::{Benchmark, BenchmarkConfig};
pub use config::{DatasetRecord, GeneratorConfig, SweepConfig};
pub use dataset::{Dataset, DatasetParams};
pub use errors::{BenchError, Result};
pub use hnsw::{Hnsw, HnswIndexer, SearchHit};
pub use index::{BuildParams, IndexCapability};
pub use math::{Distance, Metric, Space};
pub use matrix::{BenchmarkMatrix, MatrixReport, QueryPolicy, StatsTable, SWEEP_DATASET_SEED};
pub use params::{HnswBuilder, DEF_LEVEL_SEED};
pub use rand_level::LevelGenerator;
pub use simd::SimdLevel;
pub use stats::{BuildStats, QueryBenchmarkStats, QueryStats, Stats};

// ----------------------------------------------------------------------
// Smoke-tests (compile-time verified)
// ----------------------------------------------------------------------
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn smoke_insert_search() {
        let mut h = HnswBuilder::new(Space::Angular).dims(16).build();
        h.insert(vec![1.0; 16]).unwrap();
        h.insert(vec![-1.0; 16]).unwrap();
        let res = h.search(&vec![1.0; 16], 1, 10).unwrap();
        assert_eq!(res[0].0, 0);
    }

    #[test]
    fn smoke_generate_save_load() {
        let dir = tempfile::tempdir().unwrap();
        let mut d = Dataset::new(DatasetParams {
            angular: true, dim: 5, k: 2, test_count: 3, train_count: 20, seed: 9,
        })
        .unwrap();
        d.generate();
        let path = dir.path().join("smoke.bin");
        codec::save(&d, &path).unwrap();
        let back = codec::load(&path).unwrap();
        assert_eq!(back.neighbors(), d.neighbors());
        assert!(back.is_angular());
    }
}
