//! errors.rs — error type for VCAL-bench
//!
//! * No external crates (`thiserror`).
//! * Use `Result<T>` alias for convenience.

use core::fmt;

/// Result alias used across crate.
pub type Result<T, E = BenchError> = core::result::Result<T, E>;

/// Every failure the generator, codecs and sweep driver can report.
#[derive(Debug)]
pub enum BenchError {
    /// Bad dataset dimensions, `k > trainCount`, empty sweep lists, ...
    InvalidParameter(String),

    /// Corrupt, truncated or incompatible serialized dataset.
    Format(String),

    /// Missing configuration file or a record missing a required field.
    Configuration(String),

    /// Stats requested for a train-set size or worker count that was never swept.
    MissingStats {
        train_count: usize,
        workers: Option<usize>,
    },

    /// Stats requested from a benchmark that has not run yet.
    NoRuns,

    /// Vector passed to `insert`/`search` has wrong dimensionality.
    DimensionMismatch { expected: usize, found: usize },

    /// Search attempted on an empty graph.
    EmptyIndex,

    /// The index capability failed to build or query.
    Index(String),

    /// Underlying I/O failure.
    Io(std::io::Error),
}

impl BenchError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        BenchError::InvalidParameter(msg.into())
    }

    pub(crate) fn format(msg: impl Into<String>) -> Self {
        BenchError::Format(msg.into())
    }
}

impl fmt::Display for BenchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BenchError::InvalidParameter(msg) => write!(f, "invalid parameter: {}", msg),
            BenchError::Format(msg) => write!(f, "format error: {}", msg),
            BenchError::Configuration(msg) => write!(f, "configuration error: {}", msg),
            BenchError::MissingStats { train_count, workers: None } => {
                write!(f, "no sequential stats for trainCount = {}", train_count)
            }
            BenchError::MissingStats { train_count, workers: Some(w) } => write!(
                f,
                "no parallel stats for trainCount = {} with {} workers",
                train_count, w
            ),
            BenchError::NoRuns => write!(f, "no benchmarks were run"),
            BenchError::DimensionMismatch { expected, found } => {
                write!(f, "dimension mismatch: expected {}, got {}", expected, found)
            }
            BenchError::EmptyIndex => write!(f, "index is empty"),
            BenchError::Index(msg) => write!(f, "index error: {}", msg),
            BenchError::Io(e) => write!(f, "i/o error: {}", e),
        }
    }
}

impl std::error::Error for BenchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BenchError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for BenchError {
    fn from(e: std::io::Error) -> Self {
        BenchError::Io(e)
    }
}
