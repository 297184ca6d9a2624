//! Benchmark engine (C6): drives the six fixed-order suites against the
//! three pipelines and produces a comparative report (`spec.md` §4.6).

pub mod client;
pub mod health;
pub mod latency;
pub mod memory;
pub mod report;
pub mod results;
pub mod stress;
pub mod suites;

pub use client::LoadClient;
pub use report::BenchmarkReport;
pub use results::{RequestResult, TestResult};
pub use suites::Target;

use crate::config::BenchmarkConfig;
use crate::errors::BenchError;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::info;

/// Runs every suite against every target in turn and assembles the final
/// report. Targets are benchmarked sequentially (not concurrently) so one
/// server's load never perturbs another's measurements.
pub async fn run_benchmark(targets: &[Target], config: &BenchmarkConfig) -> Result<BenchmarkReport, BenchError> {
    let mut all_results = Vec::new();
    let mut memory = BTreeMap::new();

    for target in targets {
        info!(server = %target.server, base_url = %target.base_url, "starting suites for target");
        let (results, memory_report) = suites::run_all_suites(target, config).await?;
        all_results.extend(results);
        if let Some(report) = memory_report {
            memory.insert(target.server.clone(), report);
        }
    }

    Ok(BenchmarkReport::build(all_results, memory))
}

/// Writes whichever report formats are enabled in `config` under
/// `output_dir`, returning the paths actually written.
pub fn write_reports(report: &BenchmarkReport, output_dir: &Path, config: &BenchmarkConfig) -> Result<Vec<std::path::PathBuf>, BenchError> {
    std::fs::create_dir_all(output_dir)?;
    let mut written = Vec::new();

    if config.report_json {
        let path = output_dir.join("benchmark_results.json");
        report::write_json(report, &path)?;
        written.push(path);
    }
    if config.report_html {
        let path = output_dir.join("benchmark_results.html");
        report::write_html(report, &path)?;
        written.push(path);
    }
    if config.report_csv {
        let path = output_dir.join("benchmark_results.csv");
        report::write_csv(report, &path)?;
        written.push(path);
    }

    report::print_console_summary(report);
    Ok(written)
}
