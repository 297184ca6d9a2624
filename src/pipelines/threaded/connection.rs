//! Per-connection blocking handler loop (`SPEC_FULL.md` §4.2.3 / `spec.md`
//! §4.2.3), grounded on the teacher's `server::connection::Connection`
//! (`src/server/connection.rs`) for the "track request count against a
//! per-connection budget, read-parse-dispatch-write" shape — reworked
//! from the teacher's async tokio loop into a blocking `std::io` loop,
//! since Threaded connections live entirely on one worker thread.

use crate::config::PipelineConfig;
use crate::http::parse::{self, ParseLimits, ParseOutcome};
use crate::http::response::internal_server_error;
use crate::http::Response;
use crate::routing::Router;
use crate::servlet::ServletContainer;
use std::io::{Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// Services `stream` until keep-alive ends, the request budget is spent,
/// or the connection is closed, per the exact 6-step loop.
pub fn handle(
    mut stream: TcpStream,
    peer: SocketAddr,
    local: SocketAddr,
    router: Arc<Router>,
    servlet: Arc<ServletContainer>,
    config: Arc<PipelineConfig>,
    shutting_down: Arc<AtomicBool>,
) {
    let limits = ParseLimits {
        max_header_bytes: config.read_buffer.max(8 * 1024),
        max_headers: 64,
        max_body_bytes: 10 * 1024 * 1024,
    };
    let _ = stream.set_read_timeout(Some(config.socket_timeout));
    let _ = stream.set_write_timeout(Some(config.socket_timeout));

    let mut buf: Vec<u8> = Vec::with_capacity(config.read_buffer);
    let mut requests_served = 0usize;

    loop {
        if shutting_down.load(Ordering::Acquire) {
            break;
        }
        if requests_served >= config.max_requests_per_connection {
            debug!(?peer, "connection budget spent, closing");
            break;
        }

        // Step 1/2: read until a complete request is parsed, or EOF/error.
        let parsed: Option<crate::http::Request> = 'read_loop: loop {
            match parse::parse(&buf, &limits) {
                Ok(ParseOutcome::Complete { request, consumed }) => {
                    buf.drain(..consumed);
                    break 'read_loop Some(request);
                }
                Ok(ParseOutcome::Incomplete) => {
                    let mut chunk = [0u8; 8192];
                    match stream.read(&mut chunk) {
                        Ok(0) => break 'read_loop None,
                        Ok(n) => buf.extend_from_slice(&chunk[..n]),
                        Err(e)
                            if e.kind() == std::io::ErrorKind::WouldBlock
                                || e.kind() == std::io::ErrorKind::TimedOut =>
                        {
                            break 'read_loop None;
                        }
                        Err(e) => {
                            warn!(?peer, error = %e, "connection read error");
                            break 'read_loop None;
                        }
                    }
                }
                Err(e) => {
                    let mut resp = Response::new(crate::http::Version::Http11);
                    let _ = crate::http::response::bad_request(e.to_string(), &mut resp);
                    resp.finalize(true, true);
                    write_response(&mut stream, &resp);
                    return;
                }
            }
        };

        let mut request = match parsed {
            Some(r) => r,
            None => break,
        };
        request.set_peers(peer, local);

        // Step 3: servlet container first, router as fallback. A panic in
        // either becomes 500.
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

        // Step 4: keep-alive from request/response Connection headers and
        // protocol version.
        response.finalize(wants_close, true);
        let keep_alive = response.keep_alive && config.keep_alive;

        // Step 5: write, flush.
        write_response(&mut stream, &response);

        requests_served += 1;

        // Step 6: loop or close.
        if !keep_alive {
            let _ = stream.shutdown(std::net::Shutdown::Write);
            break;
        }
    }
}

fn write_response(stream: &mut TcpStream, response: &Response) {
    let mut head = Vec::new();
    response.encode_head(&mut head);
    if stream.write_all(&head).is_err() {
        return;
    }
    if let Some(bytes) = response.bytes_body() {
        let _ = stream.write_all(bytes);
    }
    let _ = stream.flush();
}
