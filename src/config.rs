//! config.rs — JSON inputs for the generator and the sweep.
//!
//! Both are plain values: loaded once, validated, then passed by reference to
//! whatever needs them.

use std::fs;
use std::path::Path;

use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::{
    benchmark::BenchmarkConfig,
    dataset::DatasetParams,
    errors::{BenchError, Result},
    math::Space,
    matrix::QueryPolicy,
    params::DEF_LEVEL_SEED,
    simd::SimdLevel,
};

/// One entry of the generator input: `{name, angular, dim, k, testCount, trainCount, seed}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetRecord {
    pub name: String,
    #[serde(flatten)]
    pub params: DatasetParams,
}

/// The whole generator input, a JSON array of records.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GeneratorConfig {
    pub datasets: Vec<DatasetRecord>,
}

impl GeneratorConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let cfg: Self = load_json(path)?;
        for record in &cfg.datasets {
            if record.name.is_empty() || record.name.contains(['/', '\\']) {
                return Err(BenchError::Configuration(format!(
                    "dataset name '{}' is not a plain file name",
                    record.name
                )));
            }
        }
        Ok(cfg)
    }
}

/// Parameters of a `BenchmarkMatrix` sweep. Missing fields take the
/// defaults of the small reference sweep.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SweepConfig {
    pub dim: usize,
    pub k: usize,
    pub ef_construction: usize,
    pub ef_search_values: Vec<usize>,
    pub m_max: usize,
    pub runs: usize,
    pub train_counts: Vec<usize>,
    pub worker_counts: Vec<usize>,
    pub space: Space,
    pub simd: SimdLevel,
    pub query_policy: QueryPolicy,
    pub level_seed: u64,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            dim: 25,
            k: 10,
            ef_construction: 200,
            ef_search_values: vec![10, 20, 40, 80, 120, 200, 400, 600],
            m_max: 16,
            runs: 2,
            train_counts: vec![500, 1000, 1500, 2000],
            worker_counts: vec![1, 2, 3, 4],
            space: Space::Euclidean,
            simd: SimdLevel::None,
            query_policy: QueryPolicy::LargestOnly,
            level_seed: DEF_LEVEL_SEED,
        }
    }
}

impl SweepConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let cfg: Self = load_json(path)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.dim == 0 || self.k == 0 {
            return Err(BenchError::invalid("dim and k must be positive"));
        }
        check_list("trainCounts", &self.train_counts)?;
        check_list("workerCounts", &self.worker_counts)?;
        if let Some(&smallest) = self.train_counts.iter().min() {
            if self.k > smallest {
                return Err(BenchError::invalid(format!(
                    "k = {} exceeds the smallest train size {}",
                    self.k, smallest
                )));
            }
        }
        self.benchmark_config().validate()
    }

    /// Runner parameters shared by every sweep cell.
    pub fn benchmark_config(&self) -> BenchmarkConfig {
        BenchmarkConfig::new(self.ef_construction, self.ef_search_values.clone(), self.m_max, self.runs)
            .with_level_seed(self.level_seed)
            .with_simd(self.simd)
    }

    pub fn largest_train_count(&self) -> Option<usize> {
        self.train_counts.iter().copied().max()
    }
}

fn check_list(name: &str, values: &[usize]) -> Result<()> {
    if values.is_empty() {
        return Err(BenchError::invalid(format!("{} is empty", name)));
    }
    for (i, v) in values.iter().enumerate() {
        if *v == 0 {
            return Err(BenchError::invalid(format!("{} must be positive", name)));
        }
        if values[..i].contains(v) {
            return Err(BenchError::invalid(format!("{} lists {} twice", name, v)));
        }
    }
    Ok(())
}

fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let text = fs::read_to_string(path).map_err(|e| {
        BenchError::Configuration(format!("could not open configuration file {}: {}", path.display(), e))
    })?;
    serde_json::from_str(&text)
        .map_err(|e| BenchError::Configuration(format!("{}: {}", path.display(), e)))
}
