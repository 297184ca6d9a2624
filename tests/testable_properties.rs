//! Integration tests for the testable properties named in `spec.md` §8,
//! driven against a real `ThreadedServer` over a loopback socket so they
//! exercise only the crate's public API.

use std::io::{Read, Write};
use std::net::TcpStream;
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::Arc;
use std::time::Duration;
use trimodal::config::PipelineConfig;
use trimodal::pipelines::threaded::ThreadedServer;
use trimodal::pool::WorkerPool;
use trimodal::{Pipeline, Request, Response, Router};

static NEXT_PORT: AtomicU16 = AtomicU16::new(18080);

fn next_port() -> u16 {
    NEXT_PORT.fetch_add(1, Ordering::SeqCst)
}

/// Starts a `ThreadedServer` with `router` on a fresh loopback port,
/// running on a background thread, and returns the port plus a guard that
/// shuts it down on drop.
struct RunningServer {
    port: u16,
    server: Arc<ThreadedServer>,
    handle: Option<std::thread::JoinHandle<()>>,
}

impl RunningServer {
    fn start(router: Router) -> Self {
        let port = next_port();
        let server = Arc::new(ThreadedServer::new(port, PipelineConfig::default(), router));
        let handle = {
            let server = Arc::clone(&server);
            std::thread::spawn(move || {
                let _ = server.run();
            })
        };
        wait_until_accepting(port);
        RunningServer { port, server, handle: Some(handle) }
    }
}

impl Drop for RunningServer {
    fn drop(&mut self) {
        self.server.shutdown();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn wait_until_accepting(port: u16) {
    for _ in 0..100 {
        if TcpStream::connect(("127.0.0.1", port)).is_ok() {
            return;
        }
        std::thread::sleep(Duration::from_millis(20));
    }
    panic!("server on port {port} never started accepting connections");
}

/// Sends a raw HTTP/1.1 request with `Connection: close` appended and
/// reads the full response until the server closes the socket.
fn request(port: u16, raw_head: &str) -> String {
    let mut stream = TcpStream::connect(("127.0.0.1", port)).expect("connect");
    stream.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
    stream.write_all(raw_head.as_bytes()).expect("write request");
    let mut response = Vec::new();
    stream.read_to_end(&mut response).expect("read response");
    String::from_utf8_lossy(&response).into_owned()
}

fn split_head_and_body(response: &str) -> (&str, &str) {
    response.split_once("\r\n\r\n").expect("response has a head/body separator")
}

#[test]
fn s1_hello_on_the_threaded_server_returns_its_display_name() {
    let server = RunningServer::start(Router::new());
    let response = request(
        server.port,
        "GET /hello HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
    );
    assert!(response.starts_with("HTTP/1.1 200"));
    let (_, body) = split_head_and_body(&response);
    assert_eq!(body, "Hello from Threaded Server");
}

#[test]
fn s2_health_json_reports_healthy_status_for_this_server() {
    let server = RunningServer::start(Router::new());
    let response = request(
        server.port,
        "GET /health HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
    );
    assert!(response.starts_with("HTTP/1.1 200"));
    let (head, body) = split_head_and_body(&response);
    assert!(head.to_ascii_lowercase().contains("content-type: application/json"));
    let json: serde_json::Value = serde_json::from_str(body).expect("valid JSON body");
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["server"], "threaded");
}

#[test]
fn s3_head_health_has_no_body_and_zero_content_length() {
    let server = RunningServer::start(Router::new());
    let response = request(
        server.port,
        "HEAD /health HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
    );
    assert!(response.starts_with("HTTP/1.1 200"));
    let (head, body) = split_head_and_body(&response);
    assert!(head.to_ascii_lowercase().contains("content-length: 0"));
    assert!(body.is_empty());
}

#[test]
fn s4_routing_miss_is_404_and_mentions_the_path() {
    let server = RunningServer::start(Router::new());
    let response = request(
        server.port,
        "GET /nope HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
    );
    assert!(response.starts_with("HTTP/1.1 404"));
    let (_, body) = split_head_and_body(&response);
    assert!(body.contains("/nope"));
}

#[test]
fn s5_path_parameter_is_visible_to_the_handler() {
    let mut router = Router::new();
    router.get("/users/{id}", |req: &Request, resp: &mut Response| {
        let id = req.path_param("id").unwrap_or("missing").to_string();
        resp.header("x-user-id", id).body(Vec::new())
    });
    let server = RunningServer::start(router);

    let response = request(
        server.port,
        "GET /users/42 HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
    );
    assert!(response.starts_with("HTTP/1.1 200"));
    let (head, _) = split_head_and_body(&response);
    assert!(head.to_ascii_lowercase().contains("x-user-id: 42"));
}

#[test]
fn s6_pool_saturation_runs_every_task_including_caller_runs() {
    // core=1, max=1, queue_capacity=0: the third concurrent submission can
    // neither queue nor spawn, so it must run on the submitting thread.
    let pool = Arc::new(WorkerPool::new("s6-test", 1, 1, 0, Duration::from_secs(60)));
    let completed = Arc::new(std::sync::atomic::AtomicUsize::new(0));
    let start_barrier = Arc::new(std::sync::Barrier::new(3));

    let mut handles = Vec::new();
    for _ in 0..3 {
        let pool = Arc::clone(&pool);
        let completed = Arc::clone(&completed);
        let start_barrier = Arc::clone(&start_barrier);
        handles.push(std::thread::spawn(move || {
            start_barrier.wait();
            let _ = pool.submit(move || {
                std::thread::sleep(Duration::from_millis(200));
                completed.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            });
        }));
    }
    for h in handles {
        h.join().unwrap();
    }

    assert_eq!(completed.load(std::sync::atomic::Ordering::SeqCst), 3);
}

#[tokio::test]
async fn s7_ramp_benchmark_produces_low_error_rate_at_each_level() {
    let server = RunningServer::start(Router::new());
    let url = format!("http://127.0.0.1:{}/hello", server.port);
    let client = Arc::new(trimodal::bench::LoadClient::new(Duration::from_secs(2)).unwrap());

    let mut best_throughput = 0.0_f64;
    for concurrency in [10usize, 50, 100] {
        let requests = client.run_fixed_count(&url, concurrency, concurrency * 5).await;
        let failed = requests.iter().filter(|r| !r.success).count();
        let error_rate = failed as f64 / requests.len() as f64;
        assert!(error_rate < 0.01, "concurrency {concurrency} had error rate {error_rate}");

        let total_nanos: u64 = requests.iter().map(|r| r.nanoseconds).sum();
        let throughput = requests.len() as f64 / (total_nanos as f64 / requests.len() as f64 / 1e9);
        best_throughput = best_throughput.max(throughput);
    }
    assert!(best_throughput > 0.0);
}

#[test]
fn s8_percentile_computation_matches_the_spec_example() {
    let latencies_ms: Vec<u64> = vec![1, 2, 3, 4, 5, 6, 7, 8, 9, 100];
    let latencies_ns: Vec<u64> = latencies_ms.iter().map(|ms| ms * 1_000_000).collect();
    let stats = trimodal::bench::latency::analyze(&latencies_ns, None);

    assert_eq!(stats.min_ms, 1.0);
    assert_eq!(stats.max_ms, 100.0);
    assert!((stats.p50_ms - 5.5).abs() < 1e-9);
    assert!((stats.p90_ms - 18.1).abs() < 1e-6);
    assert!((stats.mean_ms - 14.5).abs() < 1e-9);
}
