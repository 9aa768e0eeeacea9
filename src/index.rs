//! index.rs — the ANN index as seen by the benchmark harness.
//!
//! The harness only ever builds an index from a flat train matrix and asks it
//! for approximate neighbours; everything else is the backend's business.
//! `HnswIndexer` is the in-crate backend; tests plug in a deterministic fake.

use std::time::Duration;

use crate::errors::Result;
use crate::math::Space;
use crate::simd::SimdLevel;

/// Everything a backend needs to construct an index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildParams {
    pub space: Space,
    pub simd: SimdLevel,
    pub ef_construction: usize,
    pub m_max: usize,
    pub parallel: bool,
    /// Worker threads the backend may use; ignored unless `parallel`.
    pub worker_count: usize,
    /// Seed of the backend's level generator.
    pub level_seed: u64,
}

/// Build/query capability consumed by `Benchmark`.
///
/// Durations are measured by the backend around the work it actually does.
pub trait IndexCapability {
    type Index;

    /// Build from `vectors` (row-major, `dim` columns).
    fn build(&self, vectors: &[f32], dim: usize, params: &BuildParams) -> Result<(Self::Index, Duration)>;

    /// Up to `k` neighbour row ids, nearest first.
    fn query(
        &self,
        index: &Self::Index,
        vector: &[f32],
        k: usize,
        ef_search: usize,
    ) -> Result<(Vec<u32>, Duration)>;

    /// Human-readable index summary; must not change between identical builds.
    fn describe(&self, _index: &Self::Index) -> String {
        String::new()
    }
}
