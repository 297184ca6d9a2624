//! trimodal - a comparative HTTP/1.1 server platform.
//!
//! Three concurrency architectures share one request/response/router core:
//!
//! - [`pipelines::threaded`] - a connection-per-thread pool, Tomcat-style.
//! - [`pipelines::hybrid`] - a non-blocking acceptor feeding a CPU pool and
//!   a separately-bounded I/O pool.
//! - [`pipelines::eventloop`] - a single-threaded reactor with a task queue
//!   and an `executeAsync` escape hatch for anything that would block it.
//!
//! [`servlet`] layers a mini-servlet container with its own lifecycle in
//! front of the router, and [`bench`] drives a comparative benchmark
//! across all three.

pub mod bench;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod http;
pub mod logging;
pub mod pipelines;
pub mod pool;
pub mod routing;
pub mod servlet;

pub use crate::http::{Handled, HeaderMap, Method, Request, Response, StatusCode, Url, Version};
pub use crate::pipelines::Pipeline;
pub use crate::pool::WorkerPool;
pub use crate::routing::{Handler, Router};
pub use crate::servlet::ServletContainer;
