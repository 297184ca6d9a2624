//! Report synthesis: per-server ranking score plus console, HTML, JSON,
//! and CSV output (`spec.md` §4.6 "Reporting").
//!
//! All structured values are serialized with [`serde_json`] — including
//! the data embedded in the HTML report's `<script>` block — so there are
//! no hand-rolled string-escaping gaps (`SPEC_FULL.md` §9).

use super::memory::MemoryReport;
use super::results::TestResult;
use crate::errors::BenchError;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Clone, Serialize)]
pub struct ServerRanking {
    pub server: String,
    pub throughput_score: f64,
    pub latency_score: f64,
    pub success_score: f64,
    pub overall_score: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct BenchmarkReport {
    pub results: Vec<TestResult>,
    pub memory: BTreeMap<String, MemoryReport>,
    pub rankings: Vec<ServerRanking>,
}

impl BenchmarkReport {
    pub fn build(results: Vec<TestResult>, memory: BTreeMap<String, MemoryReport>) -> Self {
        let rankings = rank_servers(&results);
        BenchmarkReport { results, memory, rankings }
    }
}

/// Ranking score per server: `0.4*throughputScore + 0.3*latencyScore +
/// 0.3*successScore`, each normalised to `[0, 100]` against the best
/// performer across all servers in this report.
fn rank_servers(results: &[TestResult]) -> Vec<ServerRanking> {
    let mut by_server: BTreeMap<&str, Vec<&TestResult>> = BTreeMap::new();
    for r in results {
        by_server.entry(r.server.as_str()).or_default().push(r);
    }
    if by_server.is_empty() {
        return Vec::new();
    }

    let mean_throughput = |rs: &[&TestResult]| rs.iter().map(|r| r.throughput_rps).sum::<f64>() / rs.len() as f64;
    let mean_p99 = |rs: &[&TestResult]| {
        let samples: Vec<f64> = rs.iter().filter_map(|r| r.latency.as_ref()).map(|l| l.p99_ms).collect();
        if samples.is_empty() { 0.0 } else { samples.iter().sum::<f64>() / samples.len() as f64 }
    };
    let mean_success = |rs: &[&TestResult]| 1.0 - rs.iter().map(|r| r.error_rate).sum::<f64>() / rs.len() as f64;

    let throughputs: Vec<f64> = by_server.values().map(|rs| mean_throughput(rs)).collect();
    let p99s: Vec<f64> = by_server.values().map(|rs| mean_p99(rs)).collect();
    let successes: Vec<f64> = by_server.values().map(|rs| mean_success(rs)).collect();

    let max_throughput = throughputs.iter().cloned().fold(0.0_f64, f64::max).max(f64::EPSILON);
    let max_p99 = p99s.iter().cloned().fold(0.0_f64, f64::max).max(f64::EPSILON);

    by_server
        .into_iter()
        .map(|(server, rs)| {
            let throughput_score = (mean_throughput(&rs) / max_throughput * 100.0).clamp(0.0, 100.0);
            // Lower p99 is better: invert around the worst observed p99.
            let latency_score = ((1.0 - mean_p99(&rs) / max_p99) * 100.0).clamp(0.0, 100.0);
            let success_score = (mean_success(&rs) * 100.0).clamp(0.0, 100.0);
            let overall_score = 0.4 * throughput_score + 0.3 * latency_score + 0.3 * success_score;
            ServerRanking {
                server: server.to_string(),
                throughput_score,
                latency_score,
                success_score,
                overall_score,
            }
        })
        .collect()
}

/// Prints a plain-text ranking table to stdout.
pub fn print_console_summary(report: &BenchmarkReport) {
    println!("{:<12} {:>10} {:>10} {:>10} {:>10}", "server", "throughput", "latency", "success", "overall");
    let mut rankings = report.rankings.clone();
    rankings.sort_by(|a, b| b.overall_score.partial_cmp(&a.overall_score).unwrap());
    for r in &rankings {
        println!(
            "{:<12} {:>10.1} {:>10.1} {:>10.1} {:>10.1}",
            r.server, r.throughput_score, r.latency_score, r.success_score, r.overall_score
        );
    }
}

pub fn write_json(report: &BenchmarkReport, path: &Path) -> Result<(), BenchError> {
    let json = serde_json::to_string_pretty(report)?;
    std::fs::write(path, json)?;
    Ok(())
}

pub fn write_csv(report: &BenchmarkReport, path: &Path) -> Result<(), BenchError> {
    let mut out = String::from("suite,sub_test,server,concurrency,total_requests,successful_requests,failed_requests,duration_secs,throughput_rps,error_rate,p50_ms,p90_ms,p95_ms,p99_ms\n");
    for r in &report.results {
        let (p50, p90, p95, p99) = r
            .latency
            .as_ref()
            .map(|l| (l.p50_ms, l.p90_ms, l.p95_ms, l.p99_ms))
            .unwrap_or((0.0, 0.0, 0.0, 0.0));
        out.push_str(&format!(
            "{},{},{},{},{},{},{},{:.3},{:.3},{:.4},{:.3},{:.3},{:.3},{:.3}\n",
            csv_escape(&r.suite),
            csv_escape(&r.sub_test),
            csv_escape(&r.server),
            r.concurrency,
            r.total_requests,
            r.successful_requests,
            r.failed_requests,
            r.duration.as_secs_f64(),
            r.throughput_rps,
            r.error_rate,
            p50,
            p90,
            p95,
            p99
        ));
    }
    std::fs::write(path, out)?;
    Ok(())
}

fn csv_escape(value: &str) -> String {
    if value.contains(',') || value.contains('"') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// Writes an HTML report with a client-side bar chart over the ranking
/// scores. The chart data is embedded as a `serde_json`-encoded array, not
/// string-concatenated, so server names or error messages containing
/// `</script>`-like text can't break out of the data literal.
pub fn write_html(report: &BenchmarkReport, path: &Path) -> Result<(), BenchError> {
    let data_json = serde_json::to_string(&report.rankings)?;
    let results_json = serde_json::to_string(&report.results)?;

    let html = format!(
        r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>trimodal benchmark report</title>
<style>
  body {{ font-family: sans-serif; margin: 2rem; }}
  .bar {{ height: 24px; background: #3b82f6; margin-bottom: 6px; }}
  .bar-row {{ display: flex; align-items: center; gap: 8px; }}
  .bar-label {{ width: 120px; }}
  table {{ border-collapse: collapse; margin-top: 2rem; }}
  td, th {{ border: 1px solid #ccc; padding: 4px 8px; font-size: 0.85rem; }}
</style>
</head>
<body>
<h1>trimodal benchmark report</h1>
<div id="chart"></div>
<table id="results"></table>
<script>
  const rankings = {data_json};
  const results = {results_json};

  const chart = document.getElementById("chart");
  const maxScore = Math.max(1, ...rankings.map(r => r.overall_score));
  for (const r of rankings) {{
    const row = document.createElement("div");
    row.className = "bar-row";
    const label = document.createElement("span");
    label.className = "bar-label";
    label.textContent = r.server;
    const bar = document.createElement("div");
    bar.className = "bar";
    bar.style.width = Math.round((r.overall_score / maxScore) * 400) + "px";
    bar.textContent = r.overall_score.toFixed(1);
    row.appendChild(label);
    row.appendChild(bar);
    chart.appendChild(row);
  }}

  const table = document.getElementById("results");
  const header = table.insertRow();
  for (const col of ["suite", "sub_test", "server", "concurrency", "throughput_rps", "error_rate"]) {{
    const th = document.createElement("th");
    th.textContent = col;
    header.appendChild(th);
  }}
  for (const r of results) {{
    const row = table.insertRow();
    for (const col of ["suite", "sub_test", "server", "concurrency", "throughput_rps", "error_rate"]) {{
      const cell = row.insertCell();
      cell.textContent = r[col];
    }}
  }}
</script>
</body>
</html>
"#
    );
    std::fs::write(path, html)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn result(server: &str, throughput: f64, error_rate: f64) -> TestResult {
        TestResult {
            suite: "basic_responsiveness".to_string(),
            sub_test: "hello".to_string(),
            server: server.to_string(),
            concurrency: 10,
            total_requests: 100,
            successful_requests: (100.0 * (1.0 - error_rate)) as usize,
            failed_requests: (100.0 * error_rate) as usize,
            duration: Duration::from_secs(1),
            throughput_rps: throughput,
            error_rate,
            status_histogram: std::collections::BTreeMap::new(),
            latency: None,
        }
    }

    #[test]
    fn best_throughput_server_scores_highest_overall() {
        let results = vec![result("threaded", 1000.0, 0.0), result("eventloop", 2000.0, 0.0)];
        let rankings = rank_servers(&results);
        let eventloop = rankings.iter().find(|r| r.server == "eventloop").unwrap();
        let threaded = rankings.iter().find(|r| r.server == "threaded").unwrap();
        assert!(eventloop.overall_score > threaded.overall_score);
    }

    #[test]
    fn empty_results_produce_empty_rankings() {
        assert!(rank_servers(&[]).is_empty());
    }
}
