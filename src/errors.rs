//! Error taxonomy shared across every component.
//!
//! The teacher's original `src/errors.rs` hand-rolled a single `ErrorKind`
//! covering only its zero-copy HTTP/1.1 parser. This module generalizes
//! that taxonomy with [`thiserror`] across request parsing, routing, the
//! servlet container, the worker pool, and the benchmark engine, so every
//! fallible operation named in `SPEC_FULL.md` has a typed error.

use std::io;
use thiserror::Error;

/// Errors that can occur while parsing or constructing a [`crate::http::Request`].
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("malformed request line")]
    BadRequestLine,
    #[error("unsupported or malformed HTTP version")]
    BadVersion,
    #[error("header line exceeds configured size limit")]
    HeaderTooLarge,
    #[error("too many headers ({0} > limit)")]
    TooManyHeaders(usize),
    #[error("Content-Length {0} exceeds configured maximum {1}")]
    BodyTooLarge(usize, usize),
    #[error("invalid Content-Length value")]
    InvalidContentLength,
    #[error("connection closed before a complete request was read")]
    ConnectionClosed,
    #[error("socket read/write timed out")]
    Timeout,
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl RequestError {
    /// Whether this error should be surfaced to the client as `400 Bad Request`
    /// (as opposed to a silent connection close, per `spec.md` §7).
    pub fn is_bad_request(&self) -> bool {
        !matches!(
            self,
            RequestError::ConnectionClosed | RequestError::Timeout | RequestError::Io(_)
        )
    }
}

/// Errors raised while registering routes or dispatching through the [`crate::routing::Router`].
#[derive(Debug, Error)]
pub enum RoutingError {
    #[error("router is locked: registration is forbidden after the first accepted connection")]
    RouterLocked,
    #[error("handler panicked: {0}")]
    HandlerPanicked(String),
}

/// Errors raised by the [`crate::servlet::ServletContainer`].
#[derive(Debug, Error)]
pub enum ServletError {
    #[error("container is not in the Unstarted state")]
    AlreadyStarted,
    #[error("servlet '{pattern}' failed to initialize: {message}")]
    InitFailed { pattern: String, message: String },
    #[error("container has not been initialized")]
    NotInitialized,
}

/// Errors raised by [`crate::pool::WorkerPool`] submission.
#[derive(Debug, Error)]
pub enum PoolError {
    #[error("pool and queue saturated; task ran synchronously on the caller")]
    RanOnCaller,
    #[error("pool has been shut down")]
    ShuttingDown,
}

/// Errors raised by the benchmark engine.
#[derive(Debug, Error)]
pub enum BenchError {
    #[error("target server did not respond to any health probe")]
    ServerUnhealthy,
    #[error("http client error: {0}")]
    Client(String),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("report encoding error: {0}")]
    Report(#[from] serde_json::Error),
}

/// Fatal startup failures, propagated to the process per `spec.md` §7.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },
    #[error("servlet container initialization aborted: {0}")]
    ServletInit(#[from] ServletError),
}
