//! Latency analysis: percentiles, histogram, outlier detection, and a
//! 60s-windowed trend (`spec.md` §4.6 "Latency analysis").
//!
//! No teacher analogue; the percentile/outlier/trend algorithms are
//! specified precisely enough in `spec.md` that they are implemented
//! directly here rather than adapted from a histogram crate (see
//! `DESIGN.md`'s note on why `hdrhistogram` was not used).

use serde::Serialize;

/// Fixed histogram buckets, in milliseconds: `{<1, 1-2, 2-5, 5-10, 10-20,
/// 20-50, 50-100, 100-200, 200-500, 500-1000, 1-2s, 2-5s, 5-10s, >=10s}`
/// (`spec.md` §3).
pub const BUCKET_BOUNDS_MS: [f64; 13] =
    [1.0, 2.0, 5.0, 10.0, 20.0, 50.0, 100.0, 200.0, 500.0, 1000.0, 2000.0, 5000.0, 10000.0];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Trend {
    Increasing,
    Stable,
    Decreasing,
}

#[derive(Debug, Clone, Serialize)]
pub struct Histogram {
    /// `bucket[i]` counts samples with `upper_bound_ms <= BUCKET_BOUNDS_MS[i]`
    /// (and `> BUCKET_BOUNDS_MS[i-1]`); the final bucket counts samples
    /// above the largest bound.
    pub buckets: Vec<u64>,
    pub bounds_ms: Vec<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LatencyStats {
    pub count: usize,
    pub min_ms: f64,
    pub max_ms: f64,
    pub mean_ms: f64,
    pub stdev_ms: f64,
    pub p50_ms: f64,
    pub p90_ms: f64,
    pub p95_ms: f64,
    pub p99_ms: f64,
    pub histogram: Histogram,
    pub outlier_count: usize,
    pub trend: Option<Trend>,
}

/// Computes [`LatencyStats`] from per-request latencies in nanoseconds.
/// `window_timestamps_ms`, if provided (one entry per sample, monotonic
/// milliseconds since the sub-test started), enables the 60s-windowed
/// trend classification; omit it for sub-tests shorter than two windows.
pub fn analyze(latencies_ns: &[u64], window_timestamps_ms: Option<&[f64]>) -> LatencyStats {
    let mut sorted_ms: Vec<f64> = latencies_ns.iter().map(|&ns| ns as f64 / 1_000_000.0).collect();
    sorted_ms.sort_by(|a, b| a.partial_cmp(b).unwrap());

    let count = sorted_ms.len();
    if count == 0 {
        return LatencyStats {
            count: 0,
            min_ms: 0.0,
            max_ms: 0.0,
            mean_ms: 0.0,
            stdev_ms: 0.0,
            p50_ms: 0.0,
            p90_ms: 0.0,
            p95_ms: 0.0,
            p99_ms: 0.0,
            histogram: histogram_of(&[]),
            outlier_count: 0,
            trend: None,
        };
    }

    let mean_ms = sorted_ms.iter().sum::<f64>() / count as f64;
    let variance = sorted_ms.iter().map(|&v| (v - mean_ms).powi(2)).sum::<f64>() / count as f64;
    let stdev_ms = variance.sqrt();
    let (q1, q3) = quartiles(&sorted_ms);
    let iqr = q3 - q1;
    let lower_fence = q1 - 1.5 * iqr;
    let upper_fence = q3 + 1.5 * iqr;
    let outlier_count = sorted_ms.iter().filter(|&&v| v < lower_fence || v > upper_fence).count();

    let trend = window_timestamps_ms.and_then(|ts| trend_over_windows(&sorted_ms, ts));

    LatencyStats {
        count,
        min_ms: sorted_ms[0],
        max_ms: sorted_ms[count - 1],
        mean_ms,
        stdev_ms,
        p50_ms: percentile(&sorted_ms, 50.0),
        p90_ms: percentile(&sorted_ms, 90.0),
        p95_ms: percentile(&sorted_ms, 95.0),
        p99_ms: percentile(&sorted_ms, 99.0),
        histogram: histogram_of(&sorted_ms),
        outlier_count,
        trend,
    }
}

/// Percentile by linear interpolation between the two surrounding
/// order-statistics (`spec.md` §4.6).
pub fn percentile(sorted_ms: &[f64], p: f64) -> f64 {
    if sorted_ms.is_empty() {
        return 0.0;
    }
    if sorted_ms.len() == 1 {
        return sorted_ms[0];
    }
    let rank = (p / 100.0) * (sorted_ms.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    if lower == upper {
        return sorted_ms[lower];
    }
    let frac = rank - lower as f64;
    sorted_ms[lower] + (sorted_ms[upper] - sorted_ms[lower]) * frac
}

fn quartiles(sorted_ms: &[f64]) -> (f64, f64) {
    (percentile(sorted_ms, 25.0), percentile(sorted_ms, 75.0))
}

fn histogram_of(sorted_ms: &[f64]) -> Histogram {
    let mut buckets = vec![0u64; BUCKET_BOUNDS_MS.len() + 1];
    for &v in sorted_ms {
        let idx = BUCKET_BOUNDS_MS.iter().position(|&bound| v <= bound).unwrap_or(BUCKET_BOUNDS_MS.len());
        buckets[idx] += 1;
    }
    Histogram {
        buckets,
        bounds_ms: BUCKET_BOUNDS_MS.to_vec(),
    }
}

/// Bins samples into 60s windows by timestamp, computes each window's
/// mean latency, fits a least-squares line across window means, and
/// classifies the slope: `|slope| < 0.1 ms/window` is `Stable`.
fn trend_over_windows(sorted_ms: &[f64], timestamps_ms: &[f64]) -> Option<Trend> {
    if sorted_ms.len() != timestamps_ms.len() {
        return None;
    }
    const WINDOW_MS: f64 = 60_000.0;
    let max_ts = timestamps_ms.iter().cloned().fold(0.0_f64, f64::max);
    let window_count = (max_ts / WINDOW_MS).floor() as usize + 1;
    if window_count < 2 {
        return None;
    }

    let mut sums = vec![0.0; window_count];
    let mut counts = vec![0u64; window_count];
    for (i, &ts) in timestamps_ms.iter().enumerate() {
        let w = ((ts / WINDOW_MS).floor() as usize).min(window_count - 1);
        sums[w] += sorted_ms[i];
        counts[w] += 1;
    }

    let points: Vec<(f64, f64)> = sums
        .iter()
        .zip(counts.iter())
        .enumerate()
        .filter(|(_, (_, &c))| c > 0)
        .map(|(i, (&sum, &c))| (i as f64, sum / c as f64))
        .collect();
    if points.len() < 2 {
        return None;
    }

    let slope = least_squares_slope(&points);
    Some(if slope.abs() < 0.1 {
        Trend::Stable
    } else if slope > 0.0 {
        Trend::Increasing
    } else {
        Trend::Decreasing
    })
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percentile_interpolates_between_order_statistics() {
        let values = vec![10.0, 20.0, 30.0, 40.0];
        assert_eq!(percentile(&values, 0.0), 10.0);
        assert_eq!(percentile(&values, 100.0), 40.0);
        assert!((percentile(&values, 50.0) - 25.0).abs() < 1e-9);
    }

    #[test]
    fn iqr_outlier_detection_flags_extreme_values() {
        let latencies_ns: Vec<u64> = vec![10, 11, 12, 11, 10, 12, 11, 10, 500]
            .into_iter()
            .map(|ms| ms * 1_000_000)
            .collect();
        let stats = analyze(&latencies_ns, None);
        assert_eq!(stats.outlier_count, 1);
    }

    #[test]
    fn stable_trend_when_slope_is_flat() {
        let latencies_ns = vec![10_000_000u64; 240];
        let timestamps: Vec<f64> = (0..240).map(|i| i as f64 * 1000.0).collect();
        let stats = analyze(&latencies_ns, Some(&timestamps));
        assert_eq!(stats.trend, Some(Trend::Stable));
    }

    #[test]
    fn increasing_trend_detected_across_windows() {
        let mut latencies_ns = Vec::new();
        let mut timestamps = Vec::new();
        for window in 0..4 {
            for _ in 0..20 {
                latencies_ns.push((10 + window * 50) as u64 * 1_000_000);
                timestamps.push(window as f64 * 60_000.0 + 100.0);
            }
        }
        let stats = analyze(&latencies_ns, Some(&timestamps));
        assert_eq!(stats.trend, Some(Trend::Increasing));
    }
}
