//! Stress mode: binary search for the largest concurrency level that
//! still meets the SLA (`spec.md` §4.6: error rate < 5% and average
//! latency < 5s).

use super::client::LoadClient;
use std::sync::Arc;
use std::time::Duration;

const MAX_ERROR_RATE: f64 = 0.05;
const MAX_AVG_LATENCY: Duration = Duration::from_secs(5);
const PROBE_REQUEST_COUNT: usize = 200;

#[derive(Debug, Clone, Copy)]
pub struct StressOutcome {
    pub max_concurrency: usize,
    pub error_rate_at_max: f64,
    pub avg_latency_at_max: Duration,
}

/// Binary-searches `[1, max_concurrency]` for the largest level at which
/// `client` can sustain `url` within the SLA, probing each candidate with
/// a short fixed-count run.
pub async fn find_max_concurrency(client: &Arc<LoadClient>, url: &str, max_concurrency: usize) -> StressOutcome {
    let mut low = 1usize;
    let mut high = max_concurrency.max(1);
    let mut best = StressOutcome { max_concurrency: 0, error_rate_at_max: 1.0, avg_latency_at_max: Duration::MAX };

    // The level 1 probe anchors the search: if even a single in-flight
    // request can't meet the SLA, nothing above it will either.
    if let Some(outcome) = probe(client, url, 1).await.filter(|o| meets_sla(o)) {
        best = outcome;
    } else {
        return StressOutcome { max_concurrency: 0, error_rate_at_max: 1.0, avg_latency_at_max: Duration::MAX };
    }

    while low <= high {
        let mid = low + (high - low) / 2;
        match probe(client, url, mid).await {
            Some(outcome) if meets_sla(&outcome) => {
                best = outcome;
                low = mid + 1;
            }
            _ => {
                if mid == 0 {
                    break;
                }
                high = mid - 1;
            }
        }
    }

    best
}

fn meets_sla(outcome: &StressOutcome) -> bool {
    outcome.error_rate_at_max < MAX_ERROR_RATE && outcome.avg_latency_at_max < MAX_AVG_LATENCY
}

async fn probe(client: &Arc<LoadClient>, url: &str, concurrency: usize) -> Option<StressOutcome> {
    let results = client.run_fixed_count(url, concurrency, PROBE_REQUEST_COUNT).await;
    if results.is_empty() {
        return None;
    }
    let failed = results.iter().filter(|r| !r.success).count();
    let error_rate = failed as f64 / results.len() as f64;
    let avg_nanos = results.iter().map(|r| r.nanoseconds).sum::<u64>() / results.len() as u64;
    Some(StressOutcome {
        max_concurrency: concurrency,
        error_rate_at_max: error_rate,
        avg_latency_at_max: Duration::from_nanos(avg_nanos),
    })
}
