//! Async bounded-concurrency load issuer (`spec.md` §4.6 step 1:
//! "Load generation"), grounded on the pack's own benchmark-runner style
//! (`other_examples/.../benchmark-runner.rs`) for the semaphore-bounded
//! fan-out, and on the teacher's `tokio` dependency for the runtime.

use super::results::RequestResult;
use crate::errors::BenchError;
use reqwest::Client;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;

/// Issues HTTP requests against a single target with bounded concurrency,
/// collecting a [`RequestResult`] per request.
pub struct LoadClient {
    client: Client,
    next_id: AtomicU64,
}

impl LoadClient {
    pub fn new(timeout: Duration) -> Result<Self, BenchError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BenchError::Client(e.to_string()))?;
        Ok(LoadClient { client, next_id: AtomicU64::new(0) })
    }

    /// Issues `total_requests` GETs against `url` with at most
    /// `concurrency` in flight at once, returning one [`RequestResult`]
    /// per request in completion order.
    pub async fn run_fixed_count(self: &Arc<Self>, url: &str, concurrency: usize, total_requests: usize) -> Vec<RequestResult> {
        let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
        let mut handles = Vec::with_capacity(total_requests);

        for _ in 0..total_requests {
            let client = Arc::clone(self);
            let semaphore = Arc::clone(&semaphore);
            let url = url.to_string();
            handles.push(tokio::spawn(async move {
                let _permit = semaphore.acquire_owned().await.expect("semaphore never closed");
                client.issue_one(&url).await
            }));
        }

        let mut results = Vec::with_capacity(total_requests);
        for handle in handles {
            if let Ok(result) = handle.await {
                results.push(result);
            }
        }
        results
    }

    /// Issues requests against `url` with at most `concurrency` in flight
    /// for `duration`, returning every completed [`RequestResult`].
    pub async fn run_for_duration(self: &Arc<Self>, url: &str, concurrency: usize, duration: Duration) -> Vec<RequestResult> {
        let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
        let deadline = Instant::now() + duration;
        let mut handles = Vec::new();

        while Instant::now() < deadline {
            let permit = match semaphore.clone().try_acquire_owned() {
                Ok(permit) => permit,
                Err(_) => {
                    tokio::time::sleep(Duration::from_millis(1)).await;
                    continue;
                }
            };
            let client = Arc::clone(self);
            let url = url.to_string();
            handles.push(tokio::spawn(async move {
                let _permit = permit;
                client.issue_one(&url).await
            }));
        }

        let mut results = Vec::with_capacity(handles.len());
        for handle in handles {
            if let Ok(result) = handle.await {
                results.push(result);
            }
        }
        results
    }

    async fn issue_one(&self, url: &str) -> RequestResult {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let started = Instant::now();
        match self.client.get(url).send().await {
            Ok(resp) => {
                let status = resp.status().as_u16();
                let success = resp.status().is_success() || resp.status().is_redirection();
                match resp.bytes().await {
                    Ok(body) => RequestResult {
                        id,
                        success,
                        status,
                        nanoseconds: started.elapsed().as_nanos() as u64,
                        body_len: body.len(),
                        error_message: None,
                    },
                    Err(e) => RequestResult {
                        id,
                        success: false,
                        status,
                        nanoseconds: started.elapsed().as_nanos() as u64,
                        body_len: 0,
                        error_message: Some(e.to_string()),
                    },
                }
            }
            Err(e) => RequestResult {
                id,
                success: false,
                status: 0,
                nanoseconds: started.elapsed().as_nanos() as u64,
                body_len: 0,
                error_message: Some(e.to_string()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fixed_count_run_produces_one_result_per_request() {
        let client = Arc::new(LoadClient::new(Duration::from_millis(100)).unwrap());
        let results = client.run_fixed_count("http://127.0.0.1:1/", 4, 5).await;
        assert_eq!(results.len(), 5);
        assert!(results.iter().all(|r| !r.success));
    }
}
