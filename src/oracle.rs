//! oracle.rs — exact (brute-force) nearest neighbours and recall.
//!
//! This is the yardstick every approximate result is scored against, so it
//! never prunes: every test vector is compared with every train vector.
//! Distances are accumulated in f64 and ties go to the lower train index,
//! which makes the result independent of rayon's scheduling.

use std::collections::{BinaryHeap, HashSet};

use ordered_float::OrderedFloat;
use rayon::prelude::*;

use crate::math::Space;

/// Exact `k` nearest train rows of every test row, row-major `[test_count × k]`.
///
/// Callers guarantee `dim > 0`, `0 < k <= train_count` and row-multiple lengths.
pub fn exact_knn(space: Space, train: &[f32], test: &[f32], dim: usize, k: usize) -> Vec<u32> {
    debug_assert!(dim > 0 && train.len() % dim == 0 && test.len() % dim == 0);
    debug_assert!(k > 0 && k <= train.len() / dim);

    let train_norms: Vec<f64> = match space {
        Space::Angular => train.chunks_exact(dim).map(norm).collect(),
        Space::Euclidean => Vec::new(),
    };

    test.par_chunks_exact(dim)
        .flat_map_iter(|q| {
            let q_norm = norm(q);
            let mut heap: BinaryHeap<(OrderedFloat<f64>, u32)> = BinaryHeap::with_capacity(k + 1);
            for (i, row) in train.chunks_exact(dim).enumerate() {
                let d = match space {
                    Space::Euclidean => l2_squared(q, row),
                    Space::Angular => cosine(q, row, q_norm, train_norms[i]),
                };
                let entry = (OrderedFloat(d), i as u32);
                if heap.len() < k {
                    heap.push(entry);
                } else if heap.peek().map_or(false, |worst| entry < *worst) {
                    heap.pop();
                    heap.push(entry);
                }
            }
            heap.into_sorted_vec().into_iter().map(|(_, i)| i)
        })
        .collect()
}

/// |found ∩ truth| / k, counting each id once; always in [0, 1].
///
/// Only the first `k` entries of `found` are considered.
pub fn recall_at_k(truth: &[u32], found: &[u32], k: usize) -> f32 {
    if k == 0 {
        return 0.0;
    }
    let truth: HashSet<u32> = truth.iter().take(k).copied().collect();
    let found: HashSet<u32> = found.iter().take(k).copied().collect();
    truth.intersection(&found).count() as f32 / k as f32
}

#[inline]
fn norm(v: &[f32]) -> f64 {
    v.iter().map(|&x| f64::from(x) * f64::from(x)).sum::<f64>().sqrt()
}

#[inline]
fn l2_squared(a: &[f32], b: &[f32]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(&x, &y)| {
            let d = f64::from(x) - f64::from(y);
            d * d
        })
        .sum()
}

/// 1 – cos(θ); a zero vector is at distance 1 from everything.
#[inline]
fn cosine(a: &[f32], b: &[f32], na: f64, nb: f64) -> f64 {
    if na == 0.0 || nb == 0.0 {
        return 1.0;
    }
    let dot: f64 = a.iter().zip(b).map(|(&x, &y)| f64::from(x) * f64::from(y)).sum();
    1.0 - (dot / (na * nb)).clamp(-1.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Sort every train row by distance, take k.
    fn naive(space: Space, train: &[f32], test: &[f32], dim: usize, k: usize) -> Vec<u32> {
        let mut out = Vec::new();
        for q in test.chunks_exact(dim) {
            let mut all: Vec<(f64, u32)> = train
                .chunks_exact(dim)
                .enumerate()
                .map(|(i, r)| {
                    let d = match space {
                        Space::Euclidean => l2_squared(q, r),
                        Space::Angular => cosine(q, r, norm(q), norm(r)),
                    };
                    (d, i as u32)
                })
                .collect();
            all.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
            out.extend(all.into_iter().take(k).map(|(_, i)| i));
        }
        out
    }

    fn pseudo(n: usize, salt: u32) -> Vec<f32> {
        (0..n as u32).map(|i| ((i.wrapping_mul(2654435761) ^ salt) % 1000) as f32 / 1000.0).collect()
    }

    #[test]
    fn matches_naive_sort_in_both_spaces() {
        let (dim, k) = (5, 7);
        let train = pseudo(60 * dim, 17);
        let test = pseudo(9 * dim, 99);
        for space in [Space::Euclidean, Space::Angular] {
            assert_eq!(exact_knn(space, &train, &test, dim, k), naive(space, &train, &test, dim, k));
        }
    }

    #[test]
    fn ties_go_to_lower_index() {
        // Four identical train rows; every query sees equal distances.
        let train = vec![1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0];
        let test = vec![0.0, 0.0];
        assert_eq!(exact_knn(Space::Euclidean, &train, &test, 2, 2), vec![0, 1]);
    }

    #[test]
    fn nearest_first() {
        let train = vec![10.0, 0.0, 1.0, 0.0, 5.0, 0.0];
        let test = vec![0.0, 0.0];
        assert_eq!(exact_knn(Space::Euclidean, &train, &test, 2, 3), vec![1, 2, 0]);
    }

    #[test]
    fn recall_counts_each_id_once() {
        assert_eq!(recall_at_k(&[1, 2, 3], &[3, 2, 1], 3), 1.0);
        assert_eq!(recall_at_k(&[1, 2, 3], &[1, 1, 1], 3), 1.0 / 3.0);
        assert_eq!(recall_at_k(&[1, 2, 3], &[], 3), 0.0);
        assert_eq!(recall_at_k(&[1, 2, 3], &[4, 5, 6, 1], 3), 0.0);
    }
}
