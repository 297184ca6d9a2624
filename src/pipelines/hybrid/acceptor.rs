//! Hybrid pipeline reactor: non-blocking acceptor plus reader, handing
//! complete requests to the CPU [`WorkerPool`] (`spec.md` §4.3).
//!
//! Grounded on `other_examples/b74c2448_ryanseipp-rask-old__src-worker.rs.rs`
//! for the `mio::Token`-addressed connection table, combined with the
//! teacher's socket tuning (`src/server/server_impl.rs`).

use crate::config::PipelineConfig;
use crate::errors::StartupError;
use crate::http::parse::{self, ParseLimits, ParseOutcome};
use crate::http::response::internal_server_error;
use crate::http::Response;
use crate::pipelines::hybrid::connection::Connection;
use crate::pipelines::hybrid::switch::Switch;
use crate::pool::WorkerPool;
use crate::routing::Router;
use crate::servlet::ServletContainer;
use mio::net::{TcpListener, TcpStream};
use mio::{Events, Interest, Poll, Token};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::SocketAddr;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

const LISTENER: Token = Token(0);

#[allow(clippy::too_many_arguments)]
pub fn run(
    config: Arc<PipelineConfig>,
    port: u16,
    router: Arc<Router>,
    servlet: Arc<ServletContainer>,
    cpu_pool: Arc<WorkerPool>,
    switch: Arc<Switch>,
    running: Arc<AtomicBool>,
    router_locked_once: Arc<AtomicBool>,
) -> Result<(), StartupError> {
    let addr = SocketAddr::new(config.bind_address, port);
    let mut poll = Poll::new().map_err(|e| StartupError::Bind { addr: addr.to_string(), source: e })?;
    let mut listener = TcpListener::bind(addr).map_err(|e| StartupError::Bind { addr: addr.to_string(), source: e })?;
    poll.registry()
        .register(&mut listener, LISTENER, Interest::READABLE)
        .map_err(|e| StartupError::Bind { addr: addr.to_string(), source: e })?;

    info!(%addr, "hybrid reactor listening");

    let limits = ParseLimits {
        max_header_bytes: config.read_buffer.max(8 * 1024),
        max_headers: 64,
        max_body_bytes: 10 * 1024 * 1024,
    };

    let mut connections: HashMap<Token, Connection> = HashMap::new();
    let mut next_token = 1usize;
    let mut events = Events::with_capacity(1024);

    while running.load(Ordering::Acquire) {
        if let Err(e) = poll.poll(&mut events, Some(Duration::from_millis(200))) {
            if e.kind() == std::io::ErrorKind::Interrupted {
                continue;
            }
            warn!(error = %e, "poll error");
            continue;
        }

        for event in events.iter() {
            if event.token() == LISTENER {
                loop {
                    match listener.accept() {
                        Ok((mut stream, peer)) => {
                            if !router_locked_once.swap(true, Ordering::AcqRel) {
                                router.lock();
                            }
                            let _ = stream.set_nodelay(config.tcp_nodelay);
                            let token = Token(next_token);
                            next_token += 1;
                            poll.registry()
                                .register(&mut stream, token, Interest::READABLE)
                                .ok();
                            let local = stream.local_addr().unwrap_or(addr);
                            connections.insert(token, Connection::new(stream, peer, local, limits));
                        }
                        Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => break,
                        Err(e) => {
                            warn!(error = %e, "hybrid accept failed");
                            break;
                        }
                    }
                }
                continue;
            }

            let token = event.token();
            let should_close = service_readable(
                token,
                &mut connections,
                &limits,
                &router,
                &servlet,
                &switch,
                &config,
                &cpu_pool,
            );
            if should_close {
                if let Some(mut conn) = connections.remove(&token) {
                    let mut guard = conn.stream.lock();
                    poll.registry().deregister(&mut *guard).ok();
                }
            }
        }
    }
    Ok(())
}

/// Reads available bytes for `token`'s connection, dispatches every
/// complete request found, and reports whether the connection should be
/// torn down (EOF, read error, or a non-keep-alive response was sent).
#[allow(clippy::too_many_arguments)]
fn service_readable(
    token: Token,
    connections: &mut HashMap<Token, Connection>,
    limits: &ParseLimits,
    router: &Arc<Router>,
    servlet: &Arc<ServletContainer>,
    switch: &Arc<Switch>,
    config: &Arc<PipelineConfig>,
    cpu_pool: &Arc<WorkerPool>,
) -> bool {
    let conn = match connections.get_mut(&token) {
        Some(c) => c,
        None => return true,
    };

    {
        let mut stream = conn.stream.lock();
        let mut chunk = [0u8; 8192];
        loop {
            match stream.read(&mut chunk) {
                Ok(0) => return true,
                Ok(n) => conn.read_buf.extend_from_slice(&chunk[..n]),
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => break,
                Err(_) => return true,
            }
        }
    }

    loop {
        match parse::parse(&conn.read_buf, limits) {
            Ok(ParseOutcome::Complete { request, consumed }) => {
                conn.read_buf.drain(..consumed);
                let requests_served = conn.bump_request_count();
                if requests_served > config.max_requests_per_connection {
                    return true;
                }
                dispatch_on_cpu_pool(
                    request,
                    conn.peer,
                    conn.local,
                    Arc::clone(&conn.stream),
                    Arc::clone(router),
                    Arc::clone(servlet),
                    Arc::clone(switch),
                    Arc::clone(config),
                    cpu_pool,
                );
            }
            Ok(ParseOutcome::Incomplete) => break,
            Err(_) => return true,
        }
    }
    false
}

#[allow(clippy::too_many_arguments)]
fn dispatch_on_cpu_pool(
    mut request: crate::http::Request,
    peer: SocketAddr,
    local: SocketAddr,
    stream: Arc<Mutex<TcpStream>>,
    router: Arc<Router>,
    servlet: Arc<ServletContainer>,
    _switch: Arc<Switch>,
    config: Arc<PipelineConfig>,
    cpu_pool: &Arc<WorkerPool>,
) {
    request.set_peers(peer, local);
    cpu_pool
        .submit(move || {
            let version = request.version();
            let wants_close = request.wants_close();
            let outcome = catch_unwind(AssertUnwindSafe(|| {
                let mut resp = Response::new(version);
                match servlet.handle(&request, &mut resp) {
                    Ok(Some(_)) => resp,
                    Ok(None) | Err(_) => router.dispatch(request.clone()),
                }
            }));
            let mut response = match outcome {
                Ok(resp) => resp,
                Err(_) => {
                    let mut resp = Response::new(version);
                    let _ = internal_server_error("handler panicked", &mut resp);
                    resp
                }
            };
            response.finalize(wants_close, true);
            let keep_alive = response.keep_alive && config.keep_alive;

            let mut head = Vec::new();
            response.encode_head(&mut head);
            let mut guard = stream.lock();
            if guard.write_all(&head).is_ok() {
                if let Some(bytes) = response.bytes_body() {
                    let _ = guard.write_all(bytes);
                }
                let _ = guard.flush();
            }
            if !keep_alive {
                let _ = guard.shutdown(std::net::Shutdown::Write);
            }
        })
        .ok();
}
