//! Blocking accept loop (`spec.md` §4.2.1), grounded on the teacher's
//! listener setup in `src/server/server_impl.rs` (`TcpListener::bind` plus
//! per-connection `socket2` tuning) — generalized from the teacher's
//! non-blocking tokio accept loop into a blocking one with an explicit
//! accept-timeout, since a Threaded acceptor must be able to observe the
//! shutdown flag without an async runtime.

use crate::config::PipelineConfig;
use crate::errors::StartupError;
use crate::pool::WorkerPool;
use crate::pipelines::threaded::connection;
use crate::routing::Router;
use crate::servlet::ServletContainer;
use socket2::{Domain, Socket, Type};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

pub struct AcceptorStats {
    pub total_accepted: AtomicU64,
    pub total_failed: AtomicU64,
}

impl AcceptorStats {
    pub fn new() -> Self {
        AcceptorStats {
            total_accepted: AtomicU64::new(0),
            total_failed: AtomicU64::new(0),
        }
    }
}

/// Runs the accept loop on the calling thread until `running` is cleared.
/// On each accepted connection, configures the socket and submits a
/// per-connection blocking task to `pool`.
#[allow(clippy::too_many_arguments)]
pub fn run(
    config: Arc<PipelineConfig>,
    port: u16,
    router: Arc<Router>,
    servlet: Arc<ServletContainer>,
    pool: Arc<WorkerPool>,
    running: Arc<AtomicBool>,
    stats: Arc<AcceptorStats>,
    router_locked_once: Arc<AtomicBool>,
) -> Result<(), StartupError> {
    let addr = std::net::SocketAddr::new(config.bind_address, port);
    let socket = Socket::new(Domain::for_address(addr), Type::STREAM, None).map_err(|e| StartupError::Bind {
        addr: addr.to_string(),
        source: e,
    })?;
    socket.set_reuse_address(true).ok();
    socket.bind(&addr.into()).map_err(|e| StartupError::Bind {
        addr: addr.to_string(),
        source: e,
    })?;
    socket.listen(config.backlog).map_err(|e| StartupError::Bind {
        addr: addr.to_string(),
        source: e,
    })?;
    socket.set_read_timeout(Some(Duration::from_secs(1))).ok();

    info!(%addr, "threaded acceptor listening");
    let local_addr = socket.local_addr().ok().and_then(|a| a.as_socket()).unwrap_or(addr);

    let mut consecutive_failures = 0u32;
    while running.load(Ordering::Acquire) {
        match socket.accept() {
            Ok((conn, peer)) => {
                if !router_locked_once.swap(true, Ordering::AcqRel) {
                    router.lock();
                }
                consecutive_failures = 0;
                stats.total_accepted.fetch_add(1, Ordering::Relaxed);

                conn.set_nodelay(config.tcp_nodelay).ok();
                conn.set_keepalive(config.keep_alive).ok();
                let _ = conn.set_recv_buffer_size(config.read_buffer);
                let _ = conn.set_send_buffer_size(config.write_buffer);

                let peer_addr = peer.as_socket().unwrap_or(addr);
                let stream: std::net::TcpStream = conn.into();

                let router = Arc::clone(&router);
                let servlet = Arc::clone(&servlet);
                let config = Arc::clone(&config);
                let running = Arc::clone(&running);
                pool.submit(move || {
                    connection::handle(stream, peer_addr, local_addr, router, servlet, config, running);
                })
                .ok();
            }
            Err(e)
                if e.kind() == std::io::ErrorKind::WouldBlock || e.kind() == std::io::ErrorKind::TimedOut =>
            {
                continue;
            }
            Err(e) => {
                stats.total_failed.fetch_add(1, Ordering::Relaxed);
                consecutive_failures += 1;
                warn!(error = %e, consecutive_failures, "accept failed");
                std::thread::sleep(Duration::from_millis(100));
            }
        }
    }
    Ok(())
}
