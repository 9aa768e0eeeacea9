//! matrix.rs — train size × worker count sweep.
//!
//! For every train size one dataset is generated with the fixed
//! `SWEEP_DATASET_SEED`, benchmarked sequentially and then once per worker
//! count. Results are kept in a `StatsTable` whose keys are limited to the
//! swept sizes and worker counts.

use core::fmt;
use core::str::FromStr;
use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
    benchmark::Benchmark,
    config::SweepConfig,
    dataset::{Dataset, DatasetParams},
    errors::{BenchError, Result},
    index::IndexCapability,
    stats::Stats,
};

/// Seed of every sweep dataset; sweeps are comparable across machines.
pub const SWEEP_DATASET_SEED: u64 = 105;

/// Which train sizes collect query statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QueryPolicy {
    /// Only the largest train size.
    #[default]
    LargestOnly,
    Always,
    Never,
}

impl QueryPolicy {
    pub fn collects(self, is_largest: bool) -> bool {
        match self {
            QueryPolicy::LargestOnly => is_largest,
            QueryPolicy::Always => true,
            QueryPolicy::Never => false,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            QueryPolicy::LargestOnly => "largest-only",
            QueryPolicy::Always => "always",
            QueryPolicy::Never => "never",
        }
    }
}

impl fmt::Display for QueryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QueryPolicy {
    type Err = BenchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "largest-only" => Ok(QueryPolicy::LargestOnly),
            "always" => Ok(QueryPolicy::Always),
            "never" => Ok(QueryPolicy::Never),
            other => Err(BenchError::invalid(format!("unknown query policy '{}'", other))),
        }
    }
}

/// Sequential and parallel stats keyed by train size (and worker count).
///
/// Keys outside the declared sizes/worker counts are rejected on insert and
/// reported as `MissingStats` on lookup.
#[derive(Debug, Clone, Default)]
pub struct StatsTable {
    sizes: Vec<usize>,
    workers: Vec<usize>,
    sequential: BTreeMap<usize, Stats>,
    parallel: BTreeMap<(usize, usize), Stats>,
}

impl StatsTable {
    pub fn new(sizes: &[usize], workers: &[usize]) -> Self {
        Self {
            sizes: sizes.to_vec(),
            workers: workers.to_vec(),
            sequential: BTreeMap::new(),
            parallel: BTreeMap::new(),
        }
    }

    pub fn insert_sequential(&mut self, train_count: usize, stats: Stats) -> Result<()> {
        if !self.sizes.contains(&train_count) {
            return Err(BenchError::MissingStats { train_count, workers: None });
        }
        self.sequential.insert(train_count, stats);
        Ok(())
    }

    pub fn insert_parallel(&mut self, workers: usize, train_count: usize, stats: Stats) -> Result<()> {
        if !self.sizes.contains(&train_count) || !self.workers.contains(&workers) {
            return Err(BenchError::MissingStats { train_count, workers: Some(workers) });
        }
        self.parallel.insert((workers, train_count), stats);
        Ok(())
    }

    pub fn sequential(&self, train_count: usize) -> Result<&Stats> {
        self.sequential
            .get(&train_count)
            .ok_or(BenchError::MissingStats { train_count, workers: None })
    }

    pub fn parallel(&self, workers: usize, train_count: usize) -> Result<&Stats> {
        self.parallel
            .get(&(workers, train_count))
            .ok_or(BenchError::MissingStats { train_count, workers: Some(workers) })
    }

    /// Declared train sizes, ascending.
    pub fn sizes(&self) -> Vec<usize> {
        let mut s = self.sizes.clone();
        s.sort_unstable();
        s
    }

    pub fn is_empty(&self) -> bool {
        self.sequential.is_empty() && self.parallel.is_empty()
    }
}

/// Serializable snapshot of a finished sweep.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatrixReport {
    pub config: SweepConfig,
    pub sequential: Vec<Stats>,
    /// Keyed by worker count.
    pub parallel: BTreeMap<usize, Vec<Stats>>,
}

/// Cached, idempotent sweep over one backend.
pub struct BenchmarkMatrix<I> {
    config: SweepConfig,
    backend: I,
    table: StatsTable,
    populated: bool,
}

impl<I: IndexCapability + Clone> BenchmarkMatrix<I> {
    pub fn new(config: SweepConfig, backend: I) -> Result<Self> {
        config.validate()?;
        let table = StatsTable::new(&config.train_counts, &config.worker_counts);
        Ok(Self { config, backend, table, populated: false })
    }

    pub fn config(&self) -> &SweepConfig { &self.config }
    pub fn is_populated(&self) -> bool { self.populated }

    /// Run every cell once. Later calls return immediately; a failed sweep
    /// records nothing.
    pub fn run(&mut self) -> Result<&mut Self> {
        if self.populated {
            info!("sweep already populated");
            return Ok(self);
        }
        let cfg = &self.config;
        let bench_cfg = cfg.benchmark_config();
        let largest = cfg.largest_train_count();
        let mut table = StatsTable::new(&cfg.train_counts, &cfg.worker_counts);

        for &train_count in &cfg.train_counts {
            let mut dataset = Dataset::new(DatasetParams {
                angular: cfg.space.is_angular(),
                dim: cfg.dim,
                k: cfg.k,
                test_count: (train_count / 10).max(1),
                train_count,
                seed: SWEEP_DATASET_SEED,
            })?
            .with_name(format!("sweep-{}", train_count));
            dataset.generate();

            let collect = cfg.query_policy.collects(Some(train_count) == largest);
            info!(train_count, collect, simd = %cfg.simd, "sweep cell");

            let mut seq = Benchmark::new(Arc::new(dataset), bench_cfg.clone(), self.backend.clone())?;
            seq.run(collect)?;
            table.insert_sequential(train_count, seq.stats()?)?;

            for &workers in &cfg.worker_counts {
                let mut par = seq.get_parallel(workers)?;
                par.run(collect)?;
                table.insert_parallel(workers, train_count, par.stats()?)?;
            }
        }

        self.table = table;
        self.populated = true;
        Ok(self)
    }

    /// Sequential stats, ascending by train size.
    pub fn sequential_stats(&self) -> Result<Vec<&Stats>> {
        self.ensure_populated()?;
        self.table.sizes().into_iter().map(|s| self.table.sequential(s)).collect()
    }

    /// Parallel stats for one worker count, ascending by train size.
    pub fn parallel_stats(&self, workers: usize) -> Result<Vec<&Stats>> {
        self.ensure_populated()?;
        self.table.sizes().into_iter().map(|s| self.table.parallel(workers, s)).collect()
    }

    pub fn sequential_at(&self, train_count: usize) -> Result<&Stats> {
        self.ensure_populated()?;
        self.table.sequential(train_count)
    }

    pub fn parallel_at(&self, workers: usize, train_count: usize) -> Result<&Stats> {
        self.ensure_populated()?;
        self.table.parallel(workers, train_count)
    }

    pub fn report(&self) -> Result<MatrixReport> {
        let sequential = self.sequential_stats()?.into_iter().cloned().collect();
        let mut parallel = BTreeMap::new();
        for &w in &self.config.worker_counts {
            parallel.insert(w, self.parallel_stats(w)?.into_iter().cloned().collect());
        }
        Ok(MatrixReport { config: self.config.clone(), sequential, parallel })
    }

    fn ensure_populated(&self) -> Result<()> {
        if self.populated { Ok(()) } else { Err(BenchError::NoRuns) }
    }
}
