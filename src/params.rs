//! params.rs — builder for configuring an `Hnsw` instance.

use crate::{
    graph::Graph,
    hnsw::Hnsw,
    math::{Distance, Space},
    rand_level::LevelGenerator,
    simd::SimdLevel,
};

/// Reasonable defaults from the HNSW paper (Malkov, 2018).
const DEF_M: usize               = 16;
const DEF_EF_CONSTRUCTION: usize = 200;
/// Level-generator seed used by the sweep unless overridden.
pub const DEF_LEVEL_SEED: u64    = 200;

/// Builder pattern for `Hnsw`.
pub struct HnswBuilder {
    dims:             Option<usize>,
    m:                usize,
    ef_construction:  usize,
    space:            Space,
    simd:             SimdLevel,
    seed:             u64,
    capacity:         usize,
}

impl HnswBuilder {
    /// Create with defaults (dims is `None`; must be set).
    pub fn new(space: Space) -> Self {
        Self {
            dims: None,
            m: DEF_M,
            ef_construction: DEF_EF_CONSTRUCTION,
            space,
            simd: SimdLevel::None,
            seed: DEF_LEVEL_SEED,
            capacity: 0,
        }
    }

    /// Set dimensionality (required).
    pub fn dims(mut self, d: usize) -> Self {
        self.dims = Some(d);
        self
    }

    /// Set `M` (max neighbours on upper layers; layer 0 keeps `2·M`).
    pub fn m(mut self, m: usize) -> Self {
        self.m = m;
        self
    }

    /// Set efConstruction (controls accuracy vs. build-time).
    pub fn ef_construction(mut self, ef: usize) -> Self {
        self.ef_construction = ef;
        self
    }

    /// Requested distance kernel level; clamped to the CPU at build.
    pub fn simd(mut self, simd: SimdLevel) -> Self {
        self.simd = simd;
        self
    }

    /// Seed for the level generator.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Pre-size node storage.
    pub fn capacity(mut self, n: usize) -> Self {
        self.capacity = n;
        self
    }

    /// Finish and obtain an `Hnsw`.
    ///
    /// Without `dims()` the index has `dims = 0` and every `insert()` returns
    /// `BenchError::DimensionMismatch`.
    pub fn build(self) -> Hnsw {
        let dims = self.dims.unwrap_or(0);
        let m = self.m.max(2);
        Hnsw {
            dims,
            m,
            ef_construction: self.ef_construction.max(1),
            metric: Distance::new(self.space, self.simd),
            levels: LevelGenerator::new(m, self.seed),
            graph: Graph::with_capacity(self.capacity),
        }
    }
}

impl Default for HnswBuilder {
    fn default() -> Self {
        Self::new(Space::Euclidean)
    }
}
