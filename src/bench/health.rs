//! Target liveness probing (`spec.md` §4.6): `/health`, then `/hello`,
//! then `/`, then a raw TCP connect; 2xx/3xx/4xx counts as alive, 5xx or a
//! transport error counts as dead. Retried with backoff per
//! [`crate::config::BenchmarkConfig`].

use crate::errors::BenchError;
use std::net::{SocketAddr, TcpStream};
use std::time::Duration;
use tracing::{debug, warn};

const PROBE_PATHS: [&str; 3] = ["/health", "/hello", "/"];

/// Blocks until `base_url` answers a liveness probe or retries are
/// exhausted. Uses a plain blocking `reqwest::blocking::Client` rather
/// than the async [`super::client::LoadClient`], since health checks run
/// once per sub-test setup, not under load.
pub fn health_check(base_url: &str, retries: u32, backoff: Duration) -> Result<(), BenchError> {
    let client = reqwest::blocking::Client::builder()
        .timeout(Duration::from_secs(5))
        .build()
        .map_err(|e| BenchError::Client(e.to_string()))?;

    let mut last_error = None;
    for attempt in 0..=retries {
        match probe_once(&client, base_url) {
            Ok(()) => return Ok(()),
            Err(e) => {
                warn!(%base_url, attempt, error = %e, "health probe failed");
                last_error = Some(e);
                if attempt < retries {
                    std::thread::sleep(backoff);
                }
            }
        }
    }
    Err(last_error.unwrap_or(BenchError::ServerUnhealthy))
}

fn probe_once(client: &reqwest::blocking::Client, base_url: &str) -> Result<(), BenchError> {
    for path in PROBE_PATHS {
        let url = format!("{base_url}{path}");
        match client.get(&url).send() {
            Ok(resp) => {
                let status = resp.status().as_u16();
                debug!(%url, status, "health probe response");
                if status < 500 {
                    return Ok(());
                }
            }
            Err(e) => debug!(%url, error = %e, "health probe transport error"),
        }
    }

    raw_tcp_connect(base_url)
}

/// Last-resort liveness check: can we even open a TCP connection to the
/// target's host:port.
fn raw_tcp_connect(base_url: &str) -> Result<(), BenchError> {
    let host_port = base_url
        .trim_start_matches("http://")
        .trim_start_matches("https://")
        .split('/')
        .next()
        .unwrap_or("");
    let addr: SocketAddr = host_port
        .parse()
        .or_else(|_| format!("{host_port}:80").parse::<SocketAddr>())
        .map_err(|_| BenchError::ServerUnhealthy)?;
    TcpStream::connect_timeout(&addr, Duration::from_secs(2))
        .map(|_| ())
        .map_err(|_| BenchError::ServerUnhealthy)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dead_target_exhausts_retries_and_reports_unhealthy() {
        let result = health_check("http://127.0.0.1:1", 1, Duration::from_millis(1));
        assert!(result.is_err());
    }
}
