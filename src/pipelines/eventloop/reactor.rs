//! Single-thread reactor loop (`spec.md` §4.4), grounded structurally on
//! `other_examples/b74c2448_ryanseipp-rask-old__src-worker.rs.rs` for the
//! `mio::Token`-addressed event dispatch, and on the teacher's socket
//! tuning (`src/server/server_impl.rs`) for accepted-connection setup.
//!
//! Invariant: **no handler may block this thread.** Every request's
//! router/servlet dispatch therefore always runs on [`HelperPool`], never
//! inline — the loop thread only ever does non-blocking I/O and drains
//! the task queue. This is the crate's one safe general enforcement of
//! the "implementations should provide an `executeAsync` escape hatch"
//! contract: rather than trust every future handler to self-classify as
//! blocking or not, dispatch itself is always the blocking work that gets
//! handed off.

use crate::config::PipelineConfig;
use crate::errors::StartupError;
use crate::http::parse::{self, ParseLimits, ParseOutcome};
use crate::http::response::internal_server_error;
use crate::http::Response;
use crate::pipelines::eventloop::connection::Connection;
use crate::pool::WorkerPool;
use crate::routing::Router;
use crate::servlet::ServletContainer;
use crossbeam::queue::SegQueue;
use mio::net::TcpListener;
use mio::{Events, Interest, Poll, Token, Waker};
use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::SocketAddr;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

const LISTENER: Token = Token(0);
const WAKE: Token = Token(1);
const FIRST_CONN_TOKEN: usize = 2;

type TaskQueue = Arc<SegQueue<Box<dyn FnOnce() + Send>>>;

/// Schedules a handler-dispatch continuation to run on the loop thread
/// once posted by a [`HelperPool`] job, or a same-thread follow-up posted
/// directly. `spec.md` §4.4: `executeAsync(fn)`.
#[derive(Clone)]
pub struct Handle {
    queue: TaskQueue,
    waker: Arc<Waker>,
}

impl Handle {
    pub fn execute_async(&self, job: impl FnOnce() + Send + 'static) {
        self.queue.push(Box::new(job));
        let _ = self.waker.wake();
    }
}

#[allow(clippy::too_many_arguments)]
pub fn run(
    config: Arc<PipelineConfig>,
    port: u16,
    router: Arc<Router>,
    servlet: Arc<ServletContainer>,
    helper_pool: Arc<WorkerPool>,
    running: Arc<AtomicBool>,
    router_locked_once: Arc<AtomicBool>,
) -> Result<(), StartupError> {
    let addr = SocketAddr::new(config.bind_address, port);
    let mut poll = Poll::new().map_err(|e| StartupError::Bind { addr: addr.to_string(), source: e })?;
    let mut listener = TcpListener::bind(addr).map_err(|e| StartupError::Bind { addr: addr.to_string(), source: e })?;
    poll.registry()
        .register(&mut listener, LISTENER, Interest::READABLE)
        .map_err(|e| StartupError::Bind { addr: addr.to_string(), source: e })?;

    let waker = Arc::new(
        Waker::new(poll.registry(), WAKE).map_err(|e| StartupError::Bind { addr: addr.to_string(), source: e })?,
    );
    let queue: TaskQueue = Arc::new(SegQueue::new());
    let handle = Handle {
        queue: Arc::clone(&queue),
        waker: Arc::clone(&waker),
    };

    info!(%addr, "eventloop reactor listening");

    let limits = ParseLimits {
        max_header_bytes: config.read_buffer.max(8 * 1024),
        max_headers: 64,
        max_body_bytes: 10 * 1024 * 1024,
    };

    let mut connections: HashMap<Token, Connection> = HashMap::new();
    let mut next_token = FIRST_CONN_TOKEN;
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
            match event.token() {
                LISTENER => accept_all(
                    &mut listener,
                    &poll,
                    &mut connections,
                    &mut next_token,
                    limits,
                    addr,
                    &router,
                    &router_locked_once,
                    config.tcp_nodelay,
                ),
                WAKE => {}
                token => {
                    let mut close = false;
                    if event.is_readable() {
                        close |= read_ready(token, &mut connections, &limits, &router, &servlet, &helper_pool, &config, &handle);
                    }
                    if event.is_writable() && connections.contains_key(&token) {
                        close |= write_ready(token, &mut connections, &poll);
                    }
                    if close {
                        if let Some(mut conn) = connections.remove(&token) {
                            poll.registry().deregister(&mut conn.stream).ok();
                        }
                    }
                }
            }
        }

        // Drain loop-thread-local continuations (executeAsync), including
        // helper-pool results reposted via the waker.
        while let Some(job) = queue.pop() {
            job();
        }

        // Apply any backpressure state changes queued continuations may
        // have triggered (e.g. a write completing below the low water
        // mark) by re-registering READABLE where appropriate.
        apply_backpressure(&poll, &mut connections);
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn accept_all(
    listener: &mut TcpListener,
    poll: &Poll,
    connections: &mut HashMap<Token, Connection>,
    next_token: &mut usize,
    limits: ParseLimits,
    fallback_addr: SocketAddr,
    router: &Arc<Router>,
    router_locked_once: &Arc<AtomicBool>,
    tcp_nodelay: bool,
) {
    loop {
        match listener.accept() {
            Ok((mut stream, peer)) => {
                if !router_locked_once.swap(true, Ordering::AcqRel) {
                    router.lock();
                }
                let _ = stream.set_nodelay(tcp_nodelay);
                let token = Token(*next_token);
                *next_token += 1;
                if poll.registry().register(&mut stream, token, Interest::READABLE).is_err() {
                    continue;
                }
                let local = stream.local_addr().unwrap_or(fallback_addr);
                connections.insert(token, Connection::new(stream, peer, local, limits));
            }
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => break,
            Err(e) => {
                warn!(error = %e, "eventloop accept failed");
                break;
            }
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn read_ready(
    token: Token,
    connections: &mut HashMap<Token, Connection>,
    limits: &ParseLimits,
    router: &Arc<Router>,
    servlet: &Arc<ServletContainer>,
    helper_pool: &Arc<WorkerPool>,
    config: &Arc<PipelineConfig>,
    handle: &Handle,
) -> bool {
    let conn = match connections.get_mut(&token) {
        Some(c) => c,
        None => return true,
    };
    if conn.reads_paused {
        return false;
    }

    let mut chunk = [0u8; 8192];
    loop {
        match conn.stream.read(&mut chunk) {
            Ok(0) => return true,
            Ok(n) => conn.read_buf.extend_from_slice(&chunk[..n]),
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => break,
            Err(_) => return true,
        }
    }

    loop {
        match parse::parse(&conn.read_buf, limits) {
            Ok(ParseOutcome::Complete { mut request, consumed }) => {
                conn.read_buf.drain(..consumed);
                conn.requests_served += 1;
                if conn.requests_served > config.max_requests_per_connection {
                    return true;
                }
                conn.requests_in_flight += 1;
                request.set_peers(conn.peer, conn.local);

                let router = Arc::clone(router);
                let servlet = Arc::clone(servlet);
                let config = Arc::clone(config);
                let handle = handle.clone();
                helper_pool
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
                        if let Some(bytes) = response.bytes_body() {
                            head.extend_from_slice(bytes);
                        }
                        handle.execute_async(move || {
                            post_response(token, head, keep_alive);
                        });
                    })
                    .ok();
            }
            Ok(ParseOutcome::Incomplete) => break,
            Err(_) => return true,
        }
    }
    false
}

thread_local! {
    static PENDING: std::cell::RefCell<Vec<(Token, Vec<u8>, bool)>> = std::cell::RefCell::new(Vec::new());
}

fn post_response(token: Token, bytes: Vec<u8>, keep_alive: bool) {
    PENDING.with(|p| p.borrow_mut().push((token, bytes, keep_alive)));
}

/// Moves any pending responses queued by [`post_response`] into their
/// connection's write buffer. Called from the loop thread right after
/// draining the task queue, since `post_response` itself only runs as a
/// queued continuation (see [`Handle::execute_async`]).
fn apply_backpressure(poll: &Poll, connections: &mut HashMap<Token, Connection>) {
    PENDING.with(|p| {
        for (token, bytes, keep_alive) in p.borrow_mut().drain(..) {
            if let Some(conn) = connections.get_mut(&token) {
                conn.requests_in_flight = conn.requests_in_flight.saturating_sub(1);
                conn.queue_write(&bytes);
                conn.close_after_drain |= !keep_alive;
                poll.registry()
                    .reregister(&mut conn.stream, token, Interest::READABLE | Interest::WRITABLE)
                    .ok();
                if conn.should_pause_reads() {
                    conn.reads_paused = true;
                }
            }
        }
    });
}

fn write_ready(token: Token, connections: &mut HashMap<Token, Connection>, poll: &Poll) -> bool {
    let conn = match connections.get_mut(&token) {
        Some(c) => c,
        None => return true,
    };
    loop {
        if conn.write_pos >= conn.write_buf.len() {
            break;
        }
        match conn.stream.write(&conn.write_buf[conn.write_pos..]) {
            Ok(0) => return true,
            Ok(n) => conn.write_pos += n,
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                return false;
            }
            Err(_) => return true,
        }
    }
    conn.write_buf.clear();
    conn.write_pos = 0;

    if conn.reads_paused && conn.should_resume_reads() {
        conn.reads_paused = false;
    }

    if conn.close_after_drain {
        return true;
    }

    let interest = if conn.reads_paused {
        Interest::WRITABLE
    } else {
        Interest::READABLE
    };
    poll.registry().reregister(&mut conn.stream, token, interest).ok();
    false
}
