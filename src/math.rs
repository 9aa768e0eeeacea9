//! math.rs — pluggable distance metrics for VCAL-bench.
//!
//! * `Metric` trait abstracts over euclidean / cosine.
//! * `Distance` picks the space at runtime and dispatches to a kernel for the
//!   resolved `SimdLevel`.
//! * SSE/AVX fast-paths behind `--features simd` on x86_64.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::BenchError;
use crate::simd::SimdLevel;

/// Blanket trait: all metrics must return **smaller = closer** distance.
pub trait Metric: Send + Sync + 'static {
    fn distance(&self, a: &[f32], b: &[f32]) -> f32;
}

/// Metric space of a dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Space {
    #[default]
    Euclidean,
    /// Cosine distance.
    Angular,
}

impl Space {
    pub fn from_angular(angular: bool) -> Self {
        if angular { Space::Angular } else { Space::Euclidean }
    }

    #[inline]
    pub fn is_angular(self) -> bool {
        self == Space::Angular
    }

    /// Name used in container attributes and descriptions.
    pub fn as_str(self) -> &'static str {
        match self {
            Space::Euclidean => "euclidean",
            Space::Angular => "angular",
        }
    }
}

impl fmt::Display for Space {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Space {
    type Err = BenchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "euclidean" | "l2" => Ok(Space::Euclidean),
            "angular" | "cosine" => Ok(Space::Angular),
            other => Err(BenchError::invalid(format!("unknown metric space '{}'", other))),
        }
    }
}

/// ----------------------------------------------------------------------
/// Runtime-selected metric used by the HNSW graph.
/// Euclidean returns the **squared** L2 distance (same ordering, no sqrt).
/// Angular returns 1 – cos(θ) ∈ [0, 2]; a zero vector gives 1.0.
/// ----------------------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Distance {
    space: Space,
    simd: SimdLevel,
}

impl Distance {
    /// `simd` is resolved against the running CPU here, once.
    pub fn new(space: Space, simd: SimdLevel) -> Self {
        Self { space, simd: simd.resolve() }
    }

    pub fn space(&self) -> Space { self.space }

    /// The concrete kernel level in use.
    pub fn simd(&self) -> SimdLevel { self.simd }
}

impl Metric for Distance {
    #[inline]
    fn distance(&self, a: &[f32], b: &[f32]) -> f32 {
        debug_assert_eq!(a.len(), b.len());
        match self.space {
            Space::Euclidean => l2_squared(a, b, self.simd),
            Space::Angular => {
                let (dot, na, nb) = dot_norms(a, b, self.simd);
                cosine_from_parts(dot, na, nb)
            }
        }
    }
}

#[inline]
fn cosine_from_parts(dot: f32, na: f32, nb: f32) -> f32 {
    if na == 0.0 || nb == 0.0 {
        return 1.0; // degenerate
    }
    let denom = (na.sqrt() * nb.sqrt()).max(1e-12);
    let cos = (dot / denom).clamp(-1.0, 1.0);
    1.0 - cos
}

/// Squared euclidean distance. `simd` must already be resolved.
pub(crate) fn l2_squared(a: &[f32], b: &[f32], simd: SimdLevel) -> f32 {
    #[cfg(all(feature = "simd", target_arch = "x86_64"))]
    {
        match simd {
            SimdLevel::Avx | SimdLevel::Avx512 => return unsafe { x86::l2_squared_avx(a, b) },
            SimdLevel::Sse => return unsafe { x86::l2_squared_sse(a, b) },
            _ => {}
        }
    }
    let _ = simd;
    scalar_l2_squared(a, b)
}

/// `(a·b, a·a, b·b)` in one pass. `simd` must already be resolved.
pub(crate) fn dot_norms(a: &[f32], b: &[f32], simd: SimdLevel) -> (f32, f32, f32) {
    #[cfg(all(feature = "simd", target_arch = "x86_64"))]
    {
        match simd {
            SimdLevel::Avx | SimdLevel::Avx512 => return unsafe { x86::dot_norms_avx(a, b) },
            SimdLevel::Sse => return unsafe { x86::dot_norms_sse(a, b) },
            _ => {}
        }
    }
    let _ = simd;
    scalar_dot_norms(a, b, 0)
}

#[inline]
fn scalar_l2_squared(a: &[f32], b: &[f32]) -> f32 {
    let mut sum = 0.0_f32;
    for i in 0..a.len() {
        let d = a[i] - b[i];
        sum += d * d;
    }
    sum
}

/// Scalar tail starting at `from`.
#[inline]
fn scalar_dot_norms(a: &[f32], b: &[f32], from: usize) -> (f32, f32, f32) {
    let (mut dot, mut na, mut nb) = (0.0_f32, 0.0_f32, 0.0_f32);
    for i in from..a.len() {
        let x = a[i];
        let y = b[i];
        dot += x * y;
        na += x * x;
        nb += y * y;
    }
    (dot, na, nb)
}

#[cfg(all(feature = "simd", target_arch = "x86_64"))]
mod x86 {
    use std::arch::x86_64::*;

    #[target_feature(enable = "avx")]
    pub(super) unsafe fn l2_squared_avx(a: &[f32], b: &[f32]) -> f32 {
        let mut acc = _mm256_setzero_ps();
        let mut i = 0usize;
        while i + 8 <= a.len() {
            let d = _mm256_sub_ps(_mm256_loadu_ps(a.as_ptr().add(i)), _mm256_loadu_ps(b.as_ptr().add(i)));
            acc = _mm256_add_ps(acc, _mm256_mul_ps(d, d));
            i += 8;
        }
        let mut sum = reduce_256(acc);
        while i < a.len() {
            let d = a[i] - b[i];
            sum += d * d;
            i += 1;
        }
        sum
    }

    #[target_feature(enable = "avx")]
    pub(super) unsafe fn dot_norms_avx(a: &[f32], b: &[f32]) -> (f32, f32, f32) {
        let (mut dot, mut na, mut nb) = (_mm256_setzero_ps(), _mm256_setzero_ps(), _mm256_setzero_ps());
        let mut i = 0usize;
        while i + 8 <= a.len() {
            let va = _mm256_loadu_ps(a.as_ptr().add(i));
            let vb = _mm256_loadu_ps(b.as_ptr().add(i));
            dot = _mm256_add_ps(dot, _mm256_mul_ps(va, vb));
            na = _mm256_add_ps(na, _mm256_mul_ps(va, va));
            nb = _mm256_add_ps(nb, _mm256_mul_ps(vb, vb));
            i += 8;
        }
        let (td, ta, tb) = super::scalar_dot_norms(a, b, i);
        (reduce_256(dot) + td, reduce_256(na) + ta, reduce_256(nb) + tb)
    }

    #[target_feature(enable = "sse")]
    pub(super) unsafe fn l2_squared_sse(a: &[f32], b: &[f32]) -> f32 {
        let mut acc = _mm_setzero_ps();
        let mut i = 0usize;
        while i + 4 <= a.len() {
            let d = _mm_sub_ps(_mm_loadu_ps(a.as_ptr().add(i)), _mm_loadu_ps(b.as_ptr().add(i)));
            acc = _mm_add_ps(acc, _mm_mul_ps(d, d));
            i += 4;
        }
        let mut sum = reduce_128(acc);
        while i < a.len() {
            let d = a[i] - b[i];
            sum += d * d;
            i += 1;
        }
        sum
    }

    #[target_feature(enable = "sse")]
    pub(super) unsafe fn dot_norms_sse(a: &[f32], b: &[f32]) -> (f32, f32, f32) {
        let (mut dot, mut na, mut nb) = (_mm_setzero_ps(), _mm_setzero_ps(), _mm_setzero_ps());
        let mut i = 0usize;
        while i + 4 <= a.len() {
            let va = _mm_loadu_ps(a.as_ptr().add(i));
            let vb = _mm_loadu_ps(b.as_ptr().add(i));
            dot = _mm_add_ps(dot, _mm_mul_ps(va, vb));
            na = _mm_add_ps(na, _mm_mul_ps(va, va));
            nb = _mm_add_ps(nb, _mm_mul_ps(vb, vb));
            i += 4;
        }
        let (td, ta, tb) = super::scalar_dot_norms(a, b, i);
        (reduce_128(dot) + td, reduce_128(na) + ta, reduce_128(nb) + tb)
    }

    /// Horizontal sum of an 8-lane register.
    #[target_feature(enable = "avx")]
    unsafe fn reduce_256(v: __m256) -> f32 {
        let hi = _mm256_extractf128_ps(v, 1);
        let lo = _mm256_castps256_ps128(v);
        reduce_128(_mm_add_ps(lo, hi))
    }

    /// Horizontal sum of a 4-lane register (SSE only, no `movehdup`).
    #[target_feature(enable = "sse")]
    unsafe fn reduce_128(v: __m128) -> f32 {
        let hi64 = _mm_movehl_ps(v, v);
        let sum64 = _mm_add_ps(v, hi64);
        let shuf = _mm_shuffle_ps(sum64, sum64, 0b01);
        _mm_cvtss_f32(_mm_add_ss(sum64, shuf))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn euclidean_is_squared_l2() {
        let d = Distance::new(Space::Euclidean, SimdLevel::None);
        assert_eq!(d.distance(&[0.0, 0.0], &[3.0, 4.0]), 25.0);
    }

    #[test]
    fn cosine_bounds_and_degenerate() {
        let d = Distance::new(Space::Angular, SimdLevel::None);
        assert!(d.distance(&[1.0, 0.0], &[2.0, 0.0]).abs() < 1e-6);
        assert!((d.distance(&[1.0, 0.0], &[0.0, 1.0]) - 1.0).abs() < 1e-6);
        assert!((d.distance(&[1.0, 0.0], &[-1.0, 0.0]) - 2.0).abs() < 1e-6);
        assert_eq!(d.distance(&[0.0, 0.0], &[1.0, 1.0]), 1.0);
    }

    #[test]
    fn every_level_agrees_with_scalar() {
        let a: Vec<f32> = (0..37).map(|i| (i as f32 * 0.37).sin()).collect();
        let b: Vec<f32> = (0..37).map(|i| (i as f32 * 0.11).cos()).collect();
        let want_l2 = scalar_l2_squared(&a, &b);
        let (wd, _, _) = scalar_dot_norms(&a, &b, 0);
        for lvl in [SimdLevel::Sse, SimdLevel::Avx, SimdLevel::Avx512, SimdLevel::Best] {
            let lvl = lvl.resolve();
            assert!((l2_squared(&a, &b, lvl) - want_l2).abs() < 1e-3);
            assert!((dot_norms(&a, &b, lvl).0 - wd).abs() < 1e-3);
        }
    }

    #[test]
    fn space_round_trips_through_str() {
        for s in [Space::Euclidean, Space::Angular] {
            assert_eq!(s.as_str().parse::<Space>().unwrap(), s);
        }
        assert!("manhattan".parse::<Space>().is_err());
    }
}
