//! benchmark.rs — timed builds and query sweeps over one dataset.
//!
//! Every run builds a fresh index from the train matrix; when queries are
//! collected the same index then answers the whole test set once per
//! `ef_search` value, in the configured order.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::{
    dataset::Dataset,
    errors::{BenchError, Result},
    index::{BuildParams, IndexCapability},
    params::DEF_LEVEL_SEED,
    simd::SimdLevel,
    stats::{BuildStats, Pretty, QueryBenchmarkStats, QuerySample, QueryStats, Stats},
};

const EF_SEARCH_WIDTH: usize = 8;
const RECALL_WIDTH: usize = 13;
const ELAPSED_WIDTH: usize = 22;

/// Index parameters shared by every run of a benchmark.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BenchmarkConfig {
    pub ef_construction: usize,
    /// Swept in this order; values must be unique.
    pub ef_search_values: Vec<usize>,
    pub m_max: usize,
    pub runs: usize,
    #[serde(default = "default_level_seed")]
    pub level_seed: u64,
    #[serde(default)]
    pub simd: SimdLevel,
}

fn default_level_seed() -> u64 {
    DEF_LEVEL_SEED
}

impl BenchmarkConfig {
    pub fn new(ef_construction: usize, ef_search_values: Vec<usize>, m_max: usize, runs: usize) -> Self {
        Self {
            ef_construction,
            ef_search_values,
            m_max,
            runs,
            level_seed: DEF_LEVEL_SEED,
            simd: SimdLevel::None,
        }
    }

    pub fn with_level_seed(mut self, seed: u64) -> Self {
        self.level_seed = seed;
        self
    }

    pub fn with_simd(mut self, simd: SimdLevel) -> Self {
        self.simd = simd;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.runs == 0 {
            return Err(BenchError::invalid("runs must be at least 1"));
        }
        if self.ef_construction == 0 {
            return Err(BenchError::invalid("efConstruction must be positive"));
        }
        if self.m_max < 2 {
            return Err(BenchError::invalid(format!("mMax must be at least 2, got {}", self.m_max)));
        }
        if self.ef_search_values.is_empty() {
            return Err(BenchError::invalid("efSearch list is empty"));
        }
        for (i, ef) in self.ef_search_values.iter().enumerate() {
            if *ef == 0 {
                return Err(BenchError::invalid("efSearch values must be positive"));
            }
            if self.ef_search_values[..i].contains(ef) {
                return Err(BenchError::invalid(format!("efSearch value {} listed twice", ef)));
            }
        }
        Ok(())
    }

    /// First swept value.
    pub fn ef_search_default(&self) -> usize {
        self.ef_search_values.first().copied().unwrap_or(1)
    }
}

/// One dataset, one backend, one worker setting; records every run.
pub struct Benchmark<I: IndexCapability> {
    dataset: Arc<Dataset>,
    config: BenchmarkConfig,
    backend: I,
    parallel: bool,
    worker_count: usize,
    build_elapsed: Vec<Duration>,
    /// `None` until a run collected queries.
    query_samples: Option<Vec<(usize, Vec<QuerySample>)>>,
    index_description: Option<String>,
}

impl<I: IndexCapability> Benchmark<I> {
    /// Sequential benchmark (one worker).
    pub fn new(dataset: Arc<Dataset>, config: BenchmarkConfig, backend: I) -> Result<Self> {
        if !dataset.is_generated() {
            return Err(BenchError::invalid("dataset has not been generated"));
        }
        config.validate()?;
        Ok(Self {
            dataset,
            config,
            backend,
            parallel: false,
            worker_count: 1,
            build_elapsed: Vec::new(),
            query_samples: None,
            index_description: None,
        })
    }

    pub fn dataset(&self) -> &Arc<Dataset> { &self.dataset }
    pub fn config(&self) -> &BenchmarkConfig { &self.config }
    pub fn is_parallel(&self) -> bool { self.parallel }
    pub fn worker_count(&self) -> usize { self.worker_count }
    pub fn has_run(&self) -> bool { !self.build_elapsed.is_empty() }

    /// Build `runs` times, querying after each build when `collect_query_stats`.
    ///
    /// A benchmark that already ran is left untouched. Any backend error
    /// aborts the whole call and nothing is recorded.
    pub fn run(&mut self, collect_query_stats: bool) -> Result<&mut Self> {
        if self.has_run() {
            warn!(benchmark = %self.label(), "already run, skipping");
            return Ok(self);
        }

        let dataset = Arc::clone(&self.dataset);
        let params = self.build_params();
        let mut build_elapsed = Vec::with_capacity(self.config.runs);
        let mut samples: Vec<(usize, Vec<QuerySample>)> = self
            .config
            .ef_search_values
            .iter()
            .map(|&ef| (ef, Vec::with_capacity(self.config.runs)))
            .collect();
        let mut description: Option<String> = None;

        for run in 0..self.config.runs {
            info!(benchmark = %self.label(), run, train = dataset.train_count(), "building index");
            let (index, elapsed) = self.backend.build(dataset.train(), dataset.dim(), &params)?;
            build_elapsed.push(elapsed);
            info!(elapsed = %Pretty(elapsed), "index built");

            let desc = self.backend.describe(&index);
            match &description {
                None => description = Some(desc),
                Some(prev) if *prev != desc => {
                    return Err(BenchError::Index("index description changed between runs".into()))
                }
                Some(_) => {}
            }

            if collect_query_stats {
                for (ef, per_ef) in samples.iter_mut() {
                    per_ef.push(self.query_all(&index, *ef)?);
                    debug!(ef_search = *ef, elapsed = %Pretty(per_ef[per_ef.len() - 1].elapsed), "queried");
                }
            }
        }

        self.build_elapsed = build_elapsed;
        self.query_samples = collect_query_stats.then_some(samples);
        self.index_description = description;
        Ok(self)
    }

    /// Fresh parallel benchmark over the same dataset and config.
    pub fn get_parallel(&self, workers: usize) -> Result<Self>
    where
        I: Clone,
    {
        if workers == 0 {
            return Err(BenchError::invalid("worker count must be at least 1"));
        }
        Ok(Self {
            dataset: Arc::clone(&self.dataset),
            config: self.config.clone(),
            backend: self.backend.clone(),
            parallel: true,
            worker_count: workers,
            build_elapsed: Vec::new(),
            query_samples: None,
            index_description: None,
        })
    }

    pub fn build_stats(&self) -> Result<BuildStats> {
        BuildStats::from_samples(&self.build_elapsed)
    }

    /// `Ok(None)` when the benchmark ran without collecting queries.
    pub fn query_stats(&self) -> Result<Option<QueryStats>> {
        if !self.has_run() {
            return Err(BenchError::NoRuns);
        }
        let Some(samples) = &self.query_samples else {
            return Ok(None);
        };
        let mut out = QueryStats::default();
        for (ef, per_ef) in samples {
            out.push(*ef, QueryBenchmarkStats::from_samples(per_ef)?);
        }
        Ok(Some(out))
    }

    /// Summary record for sweeps and JSON output.
    pub fn stats(&self) -> Result<Stats> {
        Ok(Stats {
            label: self.label(),
            build: self.build_stats()?,
            query: self.query_stats()?,
            test_count: self.dataset.test_count(),
            train_count: self.dataset.train_count(),
        })
    }

    pub fn label(&self) -> String {
        Stats::label_for(self.parallel, self.worker_count, self.config.simd)
    }

    /// Text table of build and per-`ef_search` query statistics.
    pub fn report(&self) -> Result<String> {
        let report = Report {
            dataset: &self.dataset,
            description: self.index_description.as_deref().filter(|d| !d.is_empty()),
            runs: self.config.runs,
            build: self.build_stats()?,
            query: self.query_stats()?,
        };
        Ok(report.to_string())
    }

    fn build_params(&self) -> BuildParams {
        BuildParams {
            space: self.dataset.space(),
            simd: self.config.simd,
            ef_construction: self.config.ef_construction,
            m_max: self.config.m_max,
            parallel: self.parallel,
            worker_count: self.worker_count,
            level_seed: self.config.level_seed,
        }
    }

    /// Every test row once; summed query time and mean recall.
    fn query_all(&self, index: &I::Index, ef: usize) -> Result<QuerySample> {
        let d = &self.dataset;
        let mut elapsed = Duration::ZERO;
        let mut found = Vec::with_capacity(d.test_count());
        for i in 0..d.test_count() {
            let (ids, t) = self.backend.query(index, d.test_row(i), d.k(), ef)?;
            elapsed += t;
            found.push(ids);
        }
        Ok(QuerySample { elapsed, recall: d.recall(&found) })
    }
}

/// Console layout of [`Benchmark::report`].
struct Report<'a> {
    dataset: &'a Dataset,
    description: Option<&'a str>,
    runs: usize,
    build: BuildStats,
    query: Option<QueryStats>,
}

impl fmt::Display for Report<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.dataset)?;
        if let Some(desc) = self.description {
            writeln!(f, "{}", desc)?;
        }
        writeln!(f, "Runs: {}", self.runs)?;
        if let Some(bf) = self.dataset.ground_truth_elapsed() {
            writeln!(f, "Bruteforce (build + search): {}", Pretty(bf))?;
        }
        writeln!(f, "Build avg: {}", Pretty(self.build.avg))?;
        writeln!(f, "Build best: {}", Pretty(self.build.min))?;
        writeln!(f, "Build worst: {}", Pretty(self.build.max))?;

        let Some(query) = &self.query else { return Ok(()) };
        writeln!(
            f,
            "\n{:>ew$}{:>rw$}{:>rw$}{:>rw$}{:>tw$}{:>tw$}{:>tw$}",
            "EfSearch",
            "Avg. recall",
            "Max. recall",
            "Min. recall",
            "Avg. elapsed",
            "Max. elapsed",
            "Min. elapsed",
            ew = EF_SEARCH_WIDTH,
            rw = RECALL_WIDTH,
            tw = ELAPSED_WIDTH,
        )?;
        for (ef, q) in query.iter() {
            writeln!(
                f,
                "{:>ew$}{:>rw$.3}{:>rw$.3}{:>rw$.3}{:>tw$}{:>tw$}{:>tw$}",
                ef,
                q.avg_recall,
                q.max_recall,
                q.min_recall,
                Pretty(q.avg),
                Pretty(q.max),
                Pretty(q.min),
                ew = EF_SEARCH_WIDTH,
                rw = RECALL_WIDTH,
                tw = ELAPSED_WIDTH,
            )?;
        }
        Ok(())
    }
}
