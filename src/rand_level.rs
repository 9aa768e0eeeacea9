//! rand_level.rs — draw the layer of a new HNSW node.
//!
//! Follows the distribution from the HNSW paper:
//! `level = floor(-ln(U) · mL)` with `mL = 1 / ln(M)`.
//!
//! The stream is seeded, so two builds over the same vectors with the same
//! seed produce the same tower regardless of worker count.
//!
//! ```rust
//! let mut gen = vcal_bench::LevelGenerator::new(16, 200);
//! let lvl = gen.next_level();
//! assert!(lvl < 64);
//! ```

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

#[derive(Debug)]
pub struct LevelGenerator {
    rng: ChaCha8Rng,
    ml: f64,
}

impl LevelGenerator {
    pub fn new(m: usize, seed: u64) -> Self {
        debug_assert!(m >= 2, "M must be ≥ 2");
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            ml: 1.0 / (m.max(2) as f64).ln(),
        }
    }

    #[inline]
    pub fn next_level(&mut self) -> usize {
        // gen() is in [0, 1); 1 - u keeps ln() finite.
        let u: f64 = self.rng.gen();
        (-(1.0 - u).ln() * self.ml).floor() as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_levels() {
        let mut a = LevelGenerator::new(16, 200);
        let mut b = LevelGenerator::new(16, 200);
        let la: Vec<usize> = (0..1000).map(|_| a.next_level()).collect();
        let lb: Vec<usize> = (0..1000).map(|_| b.next_level()).collect();
        assert_eq!(la, lb);
    }

    #[test]
    fn most_nodes_live_on_layer_zero() {
        let mut g = LevelGenerator::new(16, 7);
        let zeros = (0..10_000).filter(|_| g.next_level() == 0).count();
        // P(level = 0) = 1 - 1/M = 0.9375
        assert!(zeros > 9_000, "got {}", zeros);
    }
}
