//! Platform configuration.
//!
//! Grounded on the teacher's `src/limits.rs`: plain records with a
//! [`Default`] impl, constructed directly or via `..Default::default()`,
//! rather than fluent setter chains (see `spec.md` §9, "'Fluent' config
//! setters"). Extended with [`serde::Deserialize`] so a deployment can load
//! overrides from a TOML file, the way `kowito-chopin`'s configuration
//! types accept either code-constructed or file-loaded values.

use serde::Deserialize;
use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

fn default_bind_address() -> IpAddr {
    IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1))
}

/// Per-pipeline configuration shared by Threaded, Hybrid, and EventLoop.
///
/// Every pipeline accepts the same fields so the three servers are
/// comparable on identical workloads, per `spec.md` §1.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Steady-state worker count for the CPU-oriented pool (default: `4`).
    pub core_pool_size: usize,
    /// Ceiling worker count for the CPU-oriented pool (default: `64`).
    pub max_pool_size: usize,
    /// Bounded job queue capacity once the pool is at `max_pool_size` (default: `512`).
    pub queue_capacity: usize,
    /// Idle interval after which a non-core worker self-terminates (default: `60s`).
    #[serde(with = "duration_secs")]
    pub keep_alive_time: Duration,
    /// Per-socket read/write timeout (default: `30s`).
    #[serde(with = "duration_secs")]
    pub socket_timeout: Duration,
    /// Requests served per connection before it is forcibly closed (default: `10_000`).
    pub max_requests_per_connection: usize,
    /// Buffered-reader capacity for request parsing (default: `8192`).
    pub read_buffer: usize,
    /// Buffered-writer capacity for response writing (default: `8192`).
    pub write_buffer: usize,
    /// `listen()` backlog (default: `1024`).
    pub backlog: i32,
    /// Address the pipeline's listener binds to (default: `127.0.0.1`).
    #[serde(skip, default = "default_bind_address")]
    pub bind_address: IpAddr,
    /// Sets `TCP_NODELAY` on accepted sockets (default: `true`).
    pub tcp_nodelay: bool,
    /// Sets `SO_KEEPALIVE` on accepted sockets (default: `true`).
    pub keep_alive: bool,
    /// Include handler panic/error messages in `500` response bodies (default: `false`).
    pub debug_mode: bool,
    /// Path prefix every route is mounted under (default: `""`).
    pub context_path: String,
    /// Interval at which pool/connection counters are logged (default: `10s`).
    #[serde(with = "duration_secs")]
    pub statistics_interval: Duration,
    /// Independently-bounded I/O pool size, used only by the Hybrid pipeline
    /// (default: `core_pool_size`).
    pub io_pool_size: usize,
    /// I/O pool ceiling, used only by the Hybrid pipeline (default: `max_pool_size`).
    pub io_max_pool_size: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            core_pool_size: 4,
            max_pool_size: 64,
            queue_capacity: 512,
            keep_alive_time: Duration::from_secs(60),
            socket_timeout: Duration::from_secs(30),
            max_requests_per_connection: 10_000,
            read_buffer: 8192,
            write_buffer: 8192,
            backlog: 1024,
            bind_address: default_bind_address(),
            tcp_nodelay: true,
            keep_alive: true,
            debug_mode: false,
            context_path: String::new(),
            statistics_interval: Duration::from_secs(10),
            io_pool_size: 4,
            io_max_pool_size: 64,
        }
    }
}

/// Feature toggles and timing parameters for the benchmark engine (C6).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BenchmarkConfig {
    /// Requests issued during each sub-test's warm-up phase (default: `10`).
    pub warmup_requests: usize,
    /// Target sustained throughput used only for report annotation (default: `0`, unset).
    pub target_throughput: f64,
    /// Ceiling concurrency considered during the binary-search stress mode (default: `2000`).
    pub max_concurrency: usize,
    /// Fixed-duration sub-test length (default: `10s`).
    #[serde(with = "duration_secs")]
    pub test_duration: Duration,
    /// Per-request client timeout (default: `5s`).
    #[serde(with = "duration_secs")]
    pub timeout: Duration,
    /// Record periodic process memory samples (default: `true`).
    pub memory_profiling: bool,
    /// Record latency percentiles/histogram/trend (default: `true`).
    pub latency_profiling: bool,
    /// Emit `benchmark_results.html` (default: `true`).
    pub report_html: bool,
    /// Emit `benchmark_results.json` (default: `true`).
    pub report_json: bool,
    /// Emit `benchmark_results.csv` (default: `true`).
    pub report_csv: bool,
    /// Health-check retry attempts before declaring a server dead (default: `3`).
    pub health_check_retries: u32,
    /// Delay between health-check retries (default: `500ms`).
    #[serde(with = "duration_millis")]
    pub health_check_backoff: Duration,
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        BenchmarkConfig {
            warmup_requests: 10,
            target_throughput: 0.0,
            max_concurrency: 2000,
            test_duration: Duration::from_secs(10),
            timeout: Duration::from_secs(5),
            memory_profiling: true,
            latency_profiling: true,
            report_html: true,
            report_json: true,
            report_csv: true,
            health_check_retries: 3,
            health_check_backoff: Duration::from_millis(500),
        }
    }
}

/// Loads a [`PipelineConfig`]/[`BenchmarkConfig`] pair from a TOML file,
/// falling back to defaults for any field (or the whole file) not present.
pub fn load_toml(path: &std::path::Path) -> Result<(PipelineConfig, BenchmarkConfig), ConfigError> {
    #[derive(Deserialize, Default)]
    #[serde(default)]
    struct File {
        pipeline: TomlPipeline,
        benchmark: BenchmarkConfig,
    }

    #[derive(Deserialize, Default)]
    #[serde(default, transparent)]
    struct TomlPipeline(PipelineConfig);

    let text = std::fs::read_to_string(path).map_err(ConfigError::Read)?;
    let file: File = toml::from_str(&text).map_err(ConfigError::Parse)?;
    Ok((file.pipeline.0, file.benchmark))
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Read(std::io::Error),
    #[error("failed to parse config file: {0}")]
    Parse(toml::de::Error),
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_secs(u64::deserialize(d)?))
    }
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}
