//! stats.rs — aggregated build/query measurements.
//!
//! Raw per-run samples live in `Benchmark`; this module only folds them into
//! avg/min/max summaries and the per-cell `Stats` record the sweep keeps.

use core::fmt;
use std::time::Duration;

use serde::Serialize;

use crate::errors::{BenchError, Result};
use crate::simd::SimdLevel;

/// Build time over all runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BuildStats {
    pub avg: Duration,
    pub min: Duration,
    pub max: Duration,
}

impl BuildStats {
    /// `NoRuns` for an empty sample.
    pub fn from_samples(samples: &[Duration]) -> Result<Self> {
        let (avg, min, max) = fold_durations(samples.iter().copied())?;
        Ok(Self { avg, min, max })
    }
}

/// One query pass over the whole test set at a fixed `ef_search`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuerySample {
    pub elapsed: Duration,
    pub recall: f32,
}

/// Query time and recall for one `ef_search` over all runs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct QueryBenchmarkStats {
    pub avg: Duration,
    pub min: Duration,
    pub max: Duration,
    pub avg_recall: f32,
    pub min_recall: f32,
    pub max_recall: f32,
}

impl QueryBenchmarkStats {
    pub fn from_samples(samples: &[QuerySample]) -> Result<Self> {
        let (avg, min, max) = fold_durations(samples.iter().map(|s| s.elapsed))?;
        let mut min_recall = f32::INFINITY;
        let mut max_recall = f32::NEG_INFINITY;
        let mut sum = 0.0f64;
        for s in samples {
            min_recall = min_recall.min(s.recall);
            max_recall = max_recall.max(s.recall);
            sum += f64::from(s.recall);
        }
        Ok(Self {
            avg,
            min,
            max,
            avg_recall: (sum / samples.len() as f64) as f32,
            min_recall,
            max_recall,
        })
    }
}

/// `ef_search → stats`, in the order the values were swept.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QueryStats {
    entries: Vec<(usize, QueryBenchmarkStats)>,
}

impl QueryStats {
    pub(crate) fn push(&mut self, ef_search: usize, stats: QueryBenchmarkStats) {
        self.entries.push((ef_search, stats));
    }

    pub fn get(&self, ef_search: usize) -> Option<&QueryBenchmarkStats> {
        self.entries.iter().find(|(ef, _)| *ef == ef_search).map(|(_, s)| s)
    }

    pub fn keys(&self) -> impl Iterator<Item = usize> + '_ {
        self.entries.iter().map(|(ef, _)| *ef)
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &QueryBenchmarkStats)> + '_ {
        self.entries.iter().map(|(ef, s)| (*ef, s))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A point on a plot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

/// Results of one sweep cell.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    pub label: String,
    pub build: BuildStats,
    pub query: Option<QueryStats>,
    pub test_count: usize,
    pub train_count: usize,
}

impl Stats {
    /// `sequential` or `parallel-N`, with `-<simd>` appended unless SIMD is off.
    pub fn label_for(parallel: bool, workers: usize, simd: SimdLevel) -> String {
        let mut label = if parallel { format!("parallel-{}", workers) } else { "sequential".to_string() };
        if simd != SimdLevel::None {
            label.push('-');
            label.push_str(simd.as_str());
        }
        label
    }

    /// (trainCount, average build seconds).
    pub fn build_point(&self) -> Point {
        Point { x: self.train_count as f64, y: self.build.avg.as_secs_f64() }
    }

    /// (average recall, queries per second) per `ef_search`, sorted by recall.
    /// Empty when queries were not collected.
    pub fn recall_line(&self) -> Vec<Point> {
        let Some(query) = &self.query else {
            return Vec::new();
        };
        let mut points: Vec<Point> = query
            .iter()
            .map(|(_, q)| {
                let per_query = q.avg.as_secs_f64() / self.test_count as f64;
                let qps = if per_query > 0.0 { 1.0 / per_query } else { f64::INFINITY };
                Point { x: f64::from(q.avg_recall), y: qps }
            })
            .collect();
        points.sort_by(|a, b| a.x.total_cmp(&b.x));
        points
    }
}

/// `HH:MM:SS.mmm.uuu.nnn`.
pub fn pretty_duration(d: Duration) -> String {
    let secs = d.as_secs();
    let nanos = d.subsec_nanos();
    format!(
        "{:02}:{:02}:{:02}.{:03}.{:03}.{:03}",
        secs / 3600,
        secs / 60 % 60,
        secs % 60,
        nanos / 1_000_000,
        nanos / 1_000 % 1_000,
        nanos % 1_000
    )
}

/// Wraps a duration for `{:>width$}` formatting.
pub struct Pretty(pub Duration);

impl fmt::Display for Pretty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&pretty_duration(self.0))
    }
}

fn fold_durations(samples: impl Iterator<Item = Duration>) -> Result<(Duration, Duration, Duration)> {
    let mut n = 0u32;
    let mut sum = Duration::ZERO;
    let mut min = Duration::MAX;
    let mut max = Duration::ZERO;
    for d in samples {
        n += 1;
        sum += d;
        min = min.min(d);
        max = max.max(d);
    }
    if n == 0 {
        return Err(BenchError::NoRuns);
    }
    Ok((sum / n, min, max))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_stats_fold() {
        let s = BuildStats::from_samples(&[
            Duration::from_millis(30),
            Duration::from_millis(10),
            Duration::from_millis(20),
        ])
        .unwrap();
        assert_eq!(s.avg, Duration::from_millis(20));
        assert_eq!(s.min, Duration::from_millis(10));
        assert_eq!(s.max, Duration::from_millis(30));
        assert!(matches!(BuildStats::from_samples(&[]), Err(BenchError::NoRuns)));
    }

    #[test]
    fn query_stats_fold() {
        let s = QueryBenchmarkStats::from_samples(&[
            QuerySample { elapsed: Duration::from_micros(4), recall: 0.5 },
            QuerySample { elapsed: Duration::from_micros(2), recall: 1.0 },
        ])
        .unwrap();
        assert_eq!(s.avg, Duration::from_micros(3));
        assert_eq!((s.min_recall, s.max_recall, s.avg_recall), (0.5, 1.0, 0.75));
    }

    #[test]
    fn pretty_duration_fields() {
        let d = Duration::new(3600 + 2 * 60 + 3, 4_005_006);
        assert_eq!(pretty_duration(d), "01:02:03.004.005.006");
        assert_eq!(pretty_duration(Duration::ZERO), "00:00:00.000.000.000");
        assert_eq!(format!("{:>22}", Pretty(Duration::ZERO)), "  00:00:00.000.000.000");
    }

    #[test]
    fn labels() {
        assert_eq!(Stats::label_for(false, 1, SimdLevel::None), "sequential");
        assert_eq!(Stats::label_for(true, 3, SimdLevel::None), "parallel-3");
        assert_eq!(Stats::label_for(true, 2, SimdLevel::Avx), "parallel-2-avx");
    }

    #[test]
    fn recall_line_sorted_by_recall() {
        let q = |ms: u64, recall: f32| QueryBenchmarkStats {
            avg: Duration::from_millis(ms),
            min: Duration::from_millis(ms),
            max: Duration::from_millis(ms),
            avg_recall: recall,
            min_recall: recall,
            max_recall: recall,
        };
        let mut query = QueryStats::default();
        query.push(40, q(20, 0.9));
        query.push(10, q(10, 0.5));
        let stats = Stats {
            label: "sequential".into(),
            build: BuildStats::from_samples(&[Duration::from_secs(2)]).unwrap(),
            query: Some(query),
            test_count: 10,
            train_count: 100,
        };
        assert_eq!(stats.build_point(), Point { x: 100.0, y: 2.0 });
        let line = stats.recall_line();
        assert_eq!(line.len(), 2);
        assert_eq!(line[0].x, 0.5_f32 as f64);
        assert!((line[0].y - 1000.0).abs() < 1e-6);
        assert!((line[1].y - 500.0).abs() < 1e-6);
    }
}
