//! Per-connection, loop-thread-local state for the EventLoop pipeline
//! (`spec.md` §4.4/§5: "all per-connection state is loop-thread-local").

use crate::http::parse::ParseLimits;
use mio::net::TcpStream;
use std::net::SocketAddr;

/// High/low water marks bounding a connection's pending write buffer
/// (`spec.md` §4.4's backpressure rule).
#[derive(Debug, Clone, Copy)]
pub struct WaterMarks {
    pub high: usize,
    pub low: usize,
}

impl Default for WaterMarks {
    fn default() -> Self {
        WaterMarks { high: 256 * 1024, low: 64 * 1024 }
    }
}

pub struct Connection {
    pub stream: TcpStream,
    pub peer: SocketAddr,
    pub local: SocketAddr,
    pub read_buf: Vec<u8>,
    pub write_buf: Vec<u8>,
    pub write_pos: usize,
    pub requests_served: usize,
    pub requests_in_flight: usize,
    pub reads_paused: bool,
    pub close_after_drain: bool,
    pub limits: ParseLimits,
    pub water_marks: WaterMarks,
}

impl Connection {
    pub fn new(stream: TcpStream, peer: SocketAddr, local: SocketAddr, limits: ParseLimits) -> Self {
        Connection {
            stream,
            peer,
            local,
            read_buf: Vec::with_capacity(8192),
            write_buf: Vec::new(),
            write_pos: 0,
            requests_served: 0,
            requests_in_flight: 0,
            reads_paused: false,
            close_after_drain: false,
            limits,
            water_marks: WaterMarks::default(),
        }
    }

    pub fn pending_write_bytes(&self) -> usize {
        self.write_buf.len() - self.write_pos
    }

    pub fn queue_write(&mut self, bytes: &[u8]) {
        self.write_buf.extend_from_slice(bytes);
    }

    pub fn should_pause_reads(&self) -> bool {
        self.pending_write_bytes() >= self.water_marks.high
    }

    pub fn should_resume_reads(&self) -> bool {
        self.pending_write_bytes() <= self.water_marks.low
    }
}
