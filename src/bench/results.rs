//! Per-request and per-suite result types (`spec.md` §4.6 step 2).

use serde::Serialize;
use std::collections::BTreeMap;

/// A single request's outcome, collected during a load phase.
#[derive(Debug, Clone, Serialize)]
pub struct RequestResult {
    pub id: u64,
    pub success: bool,
    pub status: u16,
    pub nanoseconds: u64,
    pub body_len: usize,
    pub error_message: Option<String>,
}

/// The aggregated outcome of one sub-test against one server.
#[derive(Debug, Clone, Serialize)]
pub struct TestResult {
    pub suite: String,
    pub sub_test: String,
    pub server: String,
    pub concurrency: usize,
    pub total_requests: usize,
    pub successful_requests: usize,
    pub failed_requests: usize,
    #[serde(with = "duration_as_secs")]
    pub duration: std::time::Duration,
    pub throughput_rps: f64,
    pub error_rate: f64,
    /// Count of requests by HTTP status code (`spec.md` §3's `statusHistogram`).
    pub status_histogram: BTreeMap<u16, u64>,
    pub latency: Option<super::latency::LatencyStats>,
}

impl TestResult {
    pub fn from_requests(
        suite: impl Into<String>,
        sub_test: impl Into<String>,
        server: impl Into<String>,
        concurrency: usize,
        duration: std::time::Duration,
        requests: &[RequestResult],
        latency: Option<super::latency::LatencyStats>,
    ) -> Self {
        let total = requests.len();
        let successful = requests.iter().filter(|r| r.success).count();
        let failed = total - successful;
        let throughput_rps = if duration.as_secs_f64() > 0.0 {
            total as f64 / duration.as_secs_f64()
        } else {
            0.0
        };
        let error_rate = if total > 0 { failed as f64 / total as f64 } else { 0.0 };
        let mut status_histogram = BTreeMap::new();
        for r in requests {
            *status_histogram.entry(r.status).or_insert(0u64) += 1;
        }

        TestResult {
            suite: suite.into(),
            sub_test: sub_test.into(),
            server: server.into(),
            concurrency,
            total_requests: total,
            successful_requests: successful,
            failed_requests: failed,
            duration,
            throughput_rps,
            error_rate,
            status_histogram,
            latency,
        }
    }
}

mod duration_as_secs {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(value.as_secs_f64())
    }
}
