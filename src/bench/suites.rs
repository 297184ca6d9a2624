//! The six fixed-order benchmark suites (`spec.md` §4.6) run against each
//! target server in turn.

use super::client::LoadClient;
use super::health;
use super::latency::{self, LatencyStats};
use super::memory::{MemoryReport, MemorySampler};
use super::results::{RequestResult, TestResult};
use super::stress;
use crate::config::BenchmarkConfig;
use crate::errors::BenchError;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// One target server under test: a name (used in reports) and its base URL.
#[derive(Debug, Clone)]
pub struct Target {
    pub server: String,
    pub base_url: String,
}

/// Runs every suite against `target`, returning every sub-test's
/// [`TestResult`] plus, when memory profiling is enabled, its
/// [`MemoryReport`].
pub async fn run_all_suites(target: &Target, config: &BenchmarkConfig) -> Result<(Vec<TestResult>, Option<MemoryReport>), BenchError> {
    health::health_check(&target.base_url, config.health_check_retries, config.health_check_backoff)?;

    let client = Arc::new(LoadClient::new(config.timeout).map_err(|e| BenchError::Client(e.to_string()))?);
    let mut results = Vec::new();

    results.push(basic_responsiveness(&client, target, config).await);
    results.extend(concurrency_ramp(&client, target, config).await);
    results.push(cpu_intensive(&client, target, config).await);
    results.push(io_intensive(&client, target, config).await);

    let memory_report = if config.memory_profiling {
        let (result, report) = memory_pressure(&client, target, config).await;
        results.push(result);
        Some(report)
    } else {
        results.push(memory_pressure_no_profiling(&client, target, config).await);
        None
    };

    results.push(endurance(&client, target, config).await);

    Ok((results, memory_report))
}

async fn warm_up(client: &Arc<LoadClient>, url: &str, concurrency: usize) {
    let warm_concurrency = concurrency.min(10);
    let _ = client.run_fixed_count(url, warm_concurrency, warm_concurrency).await;
}

async fn recover() {
    tokio::time::sleep(Duration::from_millis(1500)).await;
}

fn build_result(
    suite: &str,
    sub_test: &str,
    target: &Target,
    concurrency: usize,
    duration: Duration,
    requests: &[RequestResult],
    with_latency: bool,
) -> TestResult {
    let latency_stats: Option<LatencyStats> = if with_latency {
        let nanos: Vec<u64> = requests.iter().map(|r| r.nanoseconds).collect();
        Some(latency::analyze(&nanos, None))
    } else {
        None
    };
    TestResult::from_requests(suite, sub_test, target.server.clone(), concurrency, duration, requests, latency_stats)
}

async fn basic_responsiveness(client: &Arc<LoadClient>, target: &Target, config: &BenchmarkConfig) -> TestResult {
    info!(server = %target.server, "suite: basic responsiveness");
    let url = format!("{}/hello", target.base_url);
    warm_up(client, &url, 10).await;
    let started = std::time::Instant::now();
    let requests = client.run_fixed_count(&url, 10, config.warmup_requests.max(20)).await;
    let result = build_result("basic_responsiveness", "hello", target, 10, started.elapsed(), &requests, true);
    recover().await;
    result
}

async fn concurrency_ramp(client: &Arc<LoadClient>, target: &Target, config: &BenchmarkConfig) -> Vec<TestResult> {
    const LEVELS: [usize; 5] = [10, 50, 100, 500, 1000];
    let url = format!("{}/hello", target.base_url);
    let mut out = Vec::with_capacity(LEVELS.len());
    for &concurrency in &LEVELS {
        info!(server = %target.server, concurrency, "suite: concurrency ramp");
        warm_up(client, &url, concurrency).await;
        let started = std::time::Instant::now();
        let requests = client.run_for_duration(&url, concurrency, config.test_duration).await;
        out.push(build_result("concurrency_ramp", &format!("c{concurrency}"), target, concurrency, started.elapsed(), &requests, true));
        recover().await;
    }
    out
}

async fn cpu_intensive(client: &Arc<LoadClient>, target: &Target, config: &BenchmarkConfig) -> TestResult {
    info!(server = %target.server, "suite: cpu-intensive");
    let url = format!("{}/cpu-intensive", target.base_url);
    let concurrency = 50;
    warm_up(client, &url, concurrency).await;
    let started = std::time::Instant::now();
    let requests = client.run_for_duration(&url, concurrency, config.test_duration).await;
    let result = build_result("cpu_intensive", "compute", target, concurrency, started.elapsed(), &requests, true);
    recover().await;
    result
}

async fn io_intensive(client: &Arc<LoadClient>, target: &Target, config: &BenchmarkConfig) -> TestResult {
    info!(server = %target.server, "suite: io-intensive");
    let url = format!("{}/io-simulation", target.base_url);
    let concurrency = 100;
    warm_up(client, &url, concurrency).await;
    let started = std::time::Instant::now();
    let requests = client.run_for_duration(&url, concurrency, config.test_duration).await;
    let result = build_result("io_intensive", "simulated_io", target, concurrency, started.elapsed(), &requests, true);
    recover().await;
    result
}

async fn memory_pressure(client: &Arc<LoadClient>, target: &Target, _config: &BenchmarkConfig) -> (TestResult, MemoryReport) {
    info!(server = %target.server, "suite: memory pressure");
    let url = format!("{}/hello", target.base_url);
    let concurrency = 2000;
    let total_requests = 5000;
    warm_up(client, &url, concurrency.min(10)).await;

    let sampler = Arc::new(tokio::sync::Mutex::new(MemorySampler::new(Duration::from_secs(1))));
    let sampling = {
        let sampler = Arc::clone(&sampler);
        tokio::spawn(async move {
            for _ in 0..30 {
                sampler.lock().await.sample();
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
        })
    };

    let started = std::time::Instant::now();
    let requests = client.run_fixed_count(&url, concurrency, total_requests).await;
    sampling.abort();
    let _ = sampling.await;

    let report = Arc::try_unwrap(sampler)
        .unwrap_or_else(|_| panic!("sampling task dropped its Arc before completing"))
        .into_inner()
        .finish();

    let result = build_result("memory_pressure", "sustained_load", target, concurrency, started.elapsed(), &requests, true);
    recover().await;
    (result, report)
}

async fn memory_pressure_no_profiling(client: &Arc<LoadClient>, target: &Target, _config: &BenchmarkConfig) -> TestResult {
    info!(server = %target.server, "suite: memory pressure (profiling disabled)");
    let url = format!("{}/hello", target.base_url);
    let concurrency = 2000;
    warm_up(client, &url, concurrency.min(10)).await;
    let started = std::time::Instant::now();
    let requests = client.run_fixed_count(&url, concurrency, 5000).await;
    let result = build_result("memory_pressure", "sustained_load", target, concurrency, started.elapsed(), &requests, true);
    recover().await;
    result
}

async fn endurance(client: &Arc<LoadClient>, target: &Target, _config: &BenchmarkConfig) -> TestResult {
    info!(server = %target.server, "suite: endurance");
    let url = format!("{}/hello", target.base_url);
    let concurrency = 50;
    warm_up(client, &url, concurrency.min(10)).await;
    let started = std::time::Instant::now();
    let requests = client.run_for_duration(&url, concurrency, Duration::from_secs(10 * 60)).await;
    let result = build_result("endurance", "ten_minutes", target, concurrency, started.elapsed(), &requests, true);
    recover().await;
    result
}

/// Runs `stress::find_max_concurrency` against `target`'s `/hello`
/// endpoint; not part of the fixed six-suite run, invoked separately by
/// callers that want the stress-mode result (`spec.md` §4.6, "Stress mode").
pub async fn run_stress_mode(client: &Arc<LoadClient>, target: &Target, config: &BenchmarkConfig) -> stress::StressOutcome {
    let url = format!("{}/hello", target.base_url);
    stress::find_max_concurrency(client, &url, config.max_concurrency).await
}
