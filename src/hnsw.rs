//! hnsw.rs — in-process HNSW index and its `IndexCapability` adapter.
//!
//! Node ids are insertion positions, so a search hit is directly a row of
//! the train matrix. `extend_parallel` plans each batch on a rayon pool of
//! `worker_count` threads and links the batch sequentially.

use std::time::{Duration, Instant};

use rayon::prelude::*;
use tracing::debug;

use crate::{
    errors::{BenchError, Result},
    graph::{Graph, LinkPlan},
    index::{BuildParams, IndexCapability},
    math::Distance,
    params::HnswBuilder,
    rand_level::LevelGenerator,
    simd::SimdLevel,
};

/// Vectors planned per worker before a batch is linked.
const BATCH_PER_WORKER: usize = 16;

/// `(row id, distance)` tuple returned by `search`.
pub type SearchHit = (u32, f32);

/// Main index structure.
#[derive(Debug)]
pub struct Hnsw {
    pub(crate) dims:            usize,
    pub(crate) m:               usize,
    pub(crate) ef_construction: usize,
    pub(crate) metric:          Distance,
    pub(crate) levels:          LevelGenerator,
    pub(crate) graph:           Graph,
}

impl Hnsw {
    /// Return the embedding dimensionality this index was built for.
    #[inline] pub fn dims(&self) -> usize { self.dims }

    #[inline] pub fn len(&self) -> usize { self.graph.len() }

    #[inline] pub fn is_empty(&self) -> bool { self.graph.is_empty() }

    /// `(M, efConstruction)`
    #[inline] pub fn params(&self) -> (usize, usize) {
        (self.m, self.ef_construction)
    }

    /// Distance kernel actually in use.
    #[inline] pub fn simd(&self) -> SimdLevel { self.metric.simd() }

    /// Number of layers in the tower.
    #[inline] pub fn layers(&self) -> usize {
        if self.graph.is_empty() { 0 } else { self.graph.max_level + 1 }
    }

    /// Insert one vector; returns its row id.
    pub fn insert(&mut self, vec: Vec<f32>) -> Result<u32> {
        self.check_dims(vec.len())?;
        let level = self.levels.next_level();
        let id = self.graph.insert(vec, level, &self.metric, self.m, self.ef_construction);
        Ok(id as u32)
    }

    /// Insert a row-major block of vectors using `workers` threads.
    ///
    /// Levels are drawn in row order, so the tower matches a sequential build
    /// with the same seed.
    pub fn extend_parallel(&mut self, vectors: &[f32], workers: usize) -> Result<()> {
        if self.dims == 0 || vectors.len() % self.dims != 0 {
            return Err(BenchError::DimensionMismatch { expected: self.dims, found: vectors.len() });
        }
        let workers = workers.max(1);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .build()
            .map_err(|e| BenchError::Index(format!("could not start {} workers: {}", workers, e)))?;

        let rows: Vec<&[f32]> = vectors.chunks_exact(self.dims).collect();
        let levels: Vec<usize> = rows.iter().map(|_| self.levels.next_level()).collect();
        let batch = workers * BATCH_PER_WORKER;

        // Seed the graph sequentially so the first batch has something to plan against.
        let warmup = batch.min(rows.len());
        for i in 0..warmup {
            self.graph.insert(rows[i].to_vec(), levels[i], &self.metric, self.m, self.ef_construction);
        }

        let (m, efc, metric) = (self.m, self.ef_construction, self.metric);
        let mut start = warmup;
        while start < rows.len() {
            let end = (start + batch).min(rows.len());
            let graph = &self.graph;
            let plans: Vec<LinkPlan> = pool.install(|| {
                (start..end)
                    .into_par_iter()
                    .map(|i| graph.plan(rows[i], levels[i], &metric, m, efc))
                    .collect()
            });
            for (i, plan) in (start..end).zip(plans) {
                self.graph.link(rows[i].to_vec(), levels[i], &plan, &metric, m);
            }
            start = end;
        }
        debug!(rows = rows.len(), workers, batch, "parallel insert finished");
        Ok(())
    }

    /// k-nearest neighbour search with beam width `ef`.
    pub fn search(&self, query: &[f32], k: usize, ef: usize) -> Result<Vec<SearchHit>> {
        if self.graph.is_empty() {
            return Err(BenchError::EmptyIndex);
        }
        self.check_dims(query.len())?;
        Ok(self
            .graph
            .knn(query, k, &self.metric, ef)
            .into_iter()
            .map(|(nid, d)| (nid as u32, d))
            .collect())
    }

    fn check_dims(&self, found: usize) -> Result<()> {
        if found != self.dims || self.dims == 0 {
            return Err(BenchError::DimensionMismatch { expected: self.dims, found });
        }
        Ok(())
    }
}

/// Reference backend: builds an `Hnsw` per call.
#[derive(Debug, Clone, Copy, Default)]
pub struct HnswIndexer;

impl IndexCapability for HnswIndexer {
    type Index = Hnsw;

    fn build(&self, vectors: &[f32], dim: usize, params: &BuildParams) -> Result<(Hnsw, Duration)> {
        if dim == 0 || vectors.is_empty() || vectors.len() % dim != 0 {
            return Err(BenchError::invalid(format!(
                "cannot build from {} floats with dim = {}",
                vectors.len(),
                dim
            )));
        }
        let start = Instant::now();
        let mut index = HnswBuilder::new(params.space)
            .dims(dim)
            .m(params.m_max)
            .ef_construction(params.ef_construction)
            .simd(params.simd)
            .seed(params.level_seed)
            .capacity(vectors.len() / dim)
            .build();

        if params.parallel {
            index.extend_parallel(vectors, params.worker_count)?;
        } else {
            for row in vectors.chunks_exact(dim) {
                index.insert(row.to_vec())?;
            }
        }
        Ok((index, start.elapsed()))
    }

    fn query(&self, index: &Hnsw, vector: &[f32], k: usize, ef_search: usize) -> Result<(Vec<u32>, Duration)> {
        let start = Instant::now();
        let hits = index.search(vector, k, ef_search)?;
        let elapsed = start.elapsed();
        Ok((hits.into_iter().map(|(id, _)| id).collect(), elapsed))
    }

    fn describe(&self, index: &Hnsw) -> String {
        let (m, efc) = index.params();
        format!(
            "HNSW: {} space, SIMD = {}, M = {}, efConstruction = {}, elements = {}, layers = {}",
            index.metric.space(),
            index.simd(),
            m,
            efc,
            index.len(),
            index.layers()
        )
    }
}

// ----------------------------------------------------------------------
// Smoke-tests
// ----------------------------------------------------------------------
#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Space;

    fn params(parallel: bool) -> BuildParams {
        BuildParams {
            space: Space::Euclidean,
            simd: SimdLevel::Best,
            ef_construction: 64,
            m_max: 8,
            parallel,
            worker_count: 3,
            level_seed: 200,
        }
    }

    fn lattice(n: usize) -> Vec<f32> {
        (0..n).flat_map(|i| [(i % 20) as f32, (i / 20) as f32]).collect()
    }

    #[test]
    fn smoke_insert_search() {
        let mut h = HnswBuilder::new(Space::Angular).dims(16).build();
        h.insert(vec![1.0; 16]).unwrap();
        let res = h.search(&[1.0; 16], 1, 16).unwrap();
        assert_eq!(res[0].0, 0);
    }

    #[test]
    fn wrong_dims_are_rejected() {
        let mut h = HnswBuilder::default().dims(4).build();
        assert!(matches!(
            h.insert(vec![0.0; 3]),
            Err(BenchError::DimensionMismatch { expected: 4, found: 3 })
        ));
        assert!(matches!(h.search(&[0.0; 4], 1, 8), Err(BenchError::EmptyIndex)));
    }

    #[test]
    fn sequential_and_parallel_builds_find_exact_matches() {
        let data = lattice(400);
        for parallel in [false, true] {
            let (index, _) = HnswIndexer.build(&data, 2, &params(parallel)).unwrap();
            assert_eq!(index.len(), 400);
            let (ids, _) = HnswIndexer.query(&index, &[7.0, 13.0], 3, 64).unwrap();
            assert_eq!(ids.len(), 3);
            assert_eq!(ids[0], 13 * 20 + 7, "parallel = {}", parallel);
        }
    }

    #[test]
    fn description_is_stable_across_identical_builds() {
        let data = lattice(120);
        let (a, _) = HnswIndexer.build(&data, 2, &params(true)).unwrap();
        let (b, _) = HnswIndexer.build(&data, 2, &params(true)).unwrap();
        assert_eq!(HnswIndexer.describe(&a), HnswIndexer.describe(&b));
    }

    #[test]
    fn ragged_input_is_invalid() {
        let err = HnswIndexer.build(&[0.0; 5], 2, &params(false)).unwrap_err();
        assert!(matches!(err, BenchError::InvalidParameter(_)));
    }
}
