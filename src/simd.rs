//! simd.rs — instruction-set level selection for the distance kernels.
//!
//! A `SimdLevel` is what the sweep hands to the index; `resolve()` maps it to
//! a kernel the running CPU (and this build) can actually execute.
//!
//! * Kernels exist only with `--features simd` on x86_64; elsewhere every
//!   level resolves to `None` (portable scalar loop).
//! * `Avx512` currently runs the AVX kernel.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::BenchError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SimdLevel {
    #[default]
    None,
    Sse,
    Avx,
    Avx512,
    /// Whatever `best_available()` reports at resolve time.
    Best,
}

impl SimdLevel {
    /// Highest level usable on this CPU with this build.
    pub fn best_available() -> SimdLevel {
        #[cfg(all(feature = "simd", target_arch = "x86_64"))]
        {
            if is_x86_feature_detected!("avx512f") {
                return SimdLevel::Avx512;
            }
            if is_x86_feature_detected!("avx") {
                return SimdLevel::Avx;
            }
            if is_x86_feature_detected!("sse") {
                return SimdLevel::Sse;
            }
        }
        SimdLevel::None
    }

    /// All concrete levels available here, best first (empty without SIMD).
    pub fn available() -> Vec<SimdLevel> {
        match SimdLevel::best_available() {
            SimdLevel::Avx512 => vec![SimdLevel::Avx512, SimdLevel::Avx, SimdLevel::Sse],
            SimdLevel::Avx => vec![SimdLevel::Avx, SimdLevel::Sse],
            SimdLevel::Sse => vec![SimdLevel::Sse],
            _ => Vec::new(),
        }
    }

    /// Clamp the request to what the CPU supports; `Best` becomes concrete.
    pub fn resolve(self) -> SimdLevel {
        let best = SimdLevel::best_available();
        match self {
            SimdLevel::Best => best,
            SimdLevel::None => SimdLevel::None,
            requested if requested.rank() <= best.rank() => requested,
            _ => best,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SimdLevel::None => "none",
            SimdLevel::Sse => "sse",
            SimdLevel::Avx => "avx",
            SimdLevel::Avx512 => "avx512",
            SimdLevel::Best => "best",
        }
    }

    fn rank(self) -> u8 {
        match self {
            SimdLevel::None => 0,
            SimdLevel::Sse => 1,
            SimdLevel::Avx => 2,
            SimdLevel::Avx512 | SimdLevel::Best => 3,
        }
    }
}

impl fmt::Display for SimdLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SimdLevel {
    type Err = BenchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(SimdLevel::None),
            "sse" => Ok(SimdLevel::Sse),
            "avx" | "avx2" => Ok(SimdLevel::Avx),
            "avx512" | "avx-512" => Ok(SimdLevel::Avx512),
            "best" => Ok(SimdLevel::Best),
            other => Err(BenchError::invalid(format!("unknown SIMD level '{}'", other))),
        }
    }
}
