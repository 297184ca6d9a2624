//! Process memory sampling during a load run (`spec.md` §4.6 "Memory
//! profiling"), substituted per the Design Note in `SPEC_FULL.md` §4:
//! Rust has no managed heap/GC to report used/committed/max or GC
//! counts/times against, so this samples process RSS from
//! `/proc/self/status` instead and keeps only the leak heuristic.

use serde::Serialize;
use std::fs;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, Serialize)]
pub struct MemorySample {
    #[serde(skip)]
    pub at: Option<Instant>,
    pub elapsed_secs: f64,
    pub rss_bytes: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct MemoryReport {
    pub samples: Vec<MemorySample>,
    pub min_rss_bytes: u64,
    pub max_rss_bytes: u64,
    pub mean_rss_bytes: u64,
    /// Sustained growth rate in bytes/minute fit by least squares across
    /// the whole sampling window.
    pub growth_bytes_per_min: f64,
    /// True when `growth_bytes_per_min` exceeds 1 MiB/min.
    pub leak_suspected: bool,
}

const LEAK_THRESHOLD_BYTES_PER_MIN: f64 = 1024.0 * 1024.0;

/// Samples this process's RSS on an interval until stopped, building a
/// [`MemoryReport`] on demand.
pub struct MemorySampler {
    start: Instant,
    interval: Duration,
    samples: Vec<MemorySample>,
}

impl MemorySampler {
    pub fn new(interval: Duration) -> Self {
        MemorySampler { start: Instant::now(), interval, samples: Vec::new() }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Records one sample. Callers on a dedicated sampling thread should
    /// call this every `interval()`.
    pub fn sample(&mut self) {
        if let Some(rss) = read_rss_bytes() {
            let now = Instant::now();
            self.samples.push(MemorySample {
                at: Some(now),
                elapsed_secs: now.duration_since(self.start).as_secs_f64(),
                rss_bytes: rss,
            });
        }
    }

    pub fn finish(self) -> MemoryReport {
        build_report(self.samples)
    }
}

fn build_report(samples: Vec<MemorySample>) -> MemoryReport {
    if samples.is_empty() {
        return MemoryReport {
            samples,
            min_rss_bytes: 0,
            max_rss_bytes: 0,
            mean_rss_bytes: 0,
            growth_bytes_per_min: 0.0,
            leak_suspected: false,
        };
    }

    let min_rss_bytes = samples.iter().map(|s| s.rss_bytes).min().unwrap();
    let max_rss_bytes = samples.iter().map(|s| s.rss_bytes).max().unwrap();
    let mean_rss_bytes = samples.iter().map(|s| s.rss_bytes).sum::<u64>() / samples.len() as u64;

    let growth_bytes_per_min = if samples.len() >= 2 {
        let points: Vec<(f64, f64)> =
            samples.iter().map(|s| (s.elapsed_secs / 60.0, s.rss_bytes as f64)).collect();
        least_squares_slope(&points)
    } else {
        0.0
    };
    let leak_suspected = growth_bytes_per_min > LEAK_THRESHOLD_BYTES_PER_MIN;

    MemoryReport {
        samples,
        min_rss_bytes,
        max_rss_bytes,
        mean_rss_bytes,
        growth_bytes_per_min,
        leak_suspected,
    }
}

fn least_squares_slope(points: &[(f64, f64)]) -> f64 {
    let n = points.len() as f64;
    let sum_x: f64 = points.iter().map(|(x, _)| x).sum();
    let sum_y: f64 = points.iter().map(|(_, y)| y).sum();
    let sum_xy: f64 = points.iter().map(|(x, y)| x * y).sum();
    let sum_xx: f64 = points.iter().map(|(x, _)| x * x).sum();
    let denom = n * sum_xx - sum_x * sum_x;
    if denom.abs() < f64::EPSILON {
        return 0.0;
    }
    (n * sum_xy - sum_x * sum_y) / denom
}

/// Reads `VmRSS` from `/proc/self/status`, in bytes. Returns `None` on
/// non-Linux targets or if the file is unreadable (e.g. inside a
/// restrictive sandbox); callers should treat a `None` run as "no memory
/// profiling available" rather than an error.
fn read_rss_bytes() -> Option<u64> {
    let contents = fs::read_to_string("/proc/self/status").ok()?;
    for line in contents.lines() {
        if let Some(rest) = line.strip_prefix("VmRSS:") {
            let kb: u64 = rest.trim().trim_end_matches(" kB").trim().parse().ok()?;
            return Some(kb * 1024);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_at(elapsed_secs: f64, rss_bytes: u64) -> MemorySample {
        MemorySample { at: None, elapsed_secs, rss_bytes }
    }

    #[test]
    fn flat_rss_reports_no_leak() {
        let samples = vec![sample_at(0.0, 10_000_000), sample_at(60.0, 10_000_000), sample_at(120.0, 10_000_000)];
        let report = build_report(samples);
        assert!(!report.leak_suspected);
        assert!(report.growth_bytes_per_min.abs() < 1.0);
    }

    #[test]
    fn sustained_growth_flags_leak() {
        let samples = vec![
            sample_at(0.0, 10_000_000),
            sample_at(60.0, 12_000_000),
            sample_at(120.0, 14_000_000),
            sample_at(180.0, 16_000_000),
        ];
        let report = build_report(samples);
        assert!(report.leak_suspected);
        assert!(report.growth_bytes_per_min > LEAK_THRESHOLD_BYTES_PER_MIN);
    }

    #[test]
    fn empty_samples_produce_zeroed_report() {
        let report = build_report(Vec::new());
        assert_eq!(report.max_rss_bytes, 0);
        assert!(!report.leak_suspected);
    }
}
