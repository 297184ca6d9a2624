//! Per-connection state for the Hybrid pipeline's reactor (`spec.md` §4.3).
//!
//! Grounded on the teacher's `server::connection::Connection`
//! (`src/server/connection.rs`) for the request-count/budget bookkeeping,
//! combined with `mio::Token`-keyed buffering in the style of
//! `other_examples/b74c2448_ryanseipp-rask-old__src-worker.rs.rs`.

use crate::http::parse::ParseLimits;
use mio::net::TcpStream;
use parking_lot::Mutex;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Connection state kept on the reactor thread, keyed by `mio::Token`.
/// The stream itself is `Arc<parking_lot::Mutex<_>>` so a CPU-pool worker
/// can write the response directly once dispatch completes; the mutex
/// *is* the per-connection write-order guarantee `spec.md` §5 requires.
pub struct Connection {
    pub stream: Arc<Mutex<TcpStream>>,
    pub peer: SocketAddr,
    pub local: SocketAddr,
    pub read_buf: Vec<u8>,
    pub requests_served: AtomicUsize,
    pub limits: ParseLimits,
}

impl Connection {
    pub fn new(stream: TcpStream, peer: SocketAddr, local: SocketAddr, limits: ParseLimits) -> Self {
        Connection {
            stream: Arc::new(Mutex::new(stream)),
            peer,
            local,
            read_buf: Vec::with_capacity(8192),
            requests_served: AtomicUsize::new(0),
            limits,
        }
    }

    pub fn bump_request_count(&self) -> usize {
        self.requests_served.fetch_add(1, Ordering::AcqRel) + 1
    }
}
