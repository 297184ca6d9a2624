//! Hybrid pipeline (C3): non-blocking acceptor/reader over a CPU
//! [`WorkerPool`], with a dedicated I/O pool reachable only through the
//! [`switch::Switch`] primitive.

mod acceptor;
mod connection;
pub mod switch;

use crate::config::PipelineConfig;
use crate::errors::StartupError;
use crate::pipelines::Pipeline;
use crate::pool::WorkerPool;
use crate::routing::Router;
use crate::servlet::ServletContainer;
use switch::Switch;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub struct HybridServer {
    port: u16,
    config: Arc<PipelineConfig>,
    router: Arc<Router>,
    servlet: Arc<ServletContainer>,
    cpu_pool: Arc<WorkerPool>,
    io_pool: Arc<WorkerPool>,
    switch: Arc<Switch>,
    running: Arc<AtomicBool>,
    router_locked_once: Arc<AtomicBool>,
}

impl HybridServer {
    pub fn new(port: u16, config: PipelineConfig, mut router: Router) -> Self {
        let servlet = ServletContainer::new();
        crate::handlers::mount(&mut router, "hybrid");
        servlet.initialize().expect("default servlet container has no fallible handlers");

        let cpu_pool = Arc::new(WorkerPool::new(
            "hybrid-cpu",
            config.core_pool_size,
            config.max_pool_size,
            config.queue_capacity,
            config.keep_alive_time,
        ));
        let io_pool = Arc::new(WorkerPool::new(
            "hybrid-io",
            config.io_pool_size,
            config.io_max_pool_size,
            config.queue_capacity,
            config.keep_alive_time,
        ));
        let switch = Arc::new(Switch::new(Arc::clone(&io_pool)));

        HybridServer {
            port,
            config: Arc::new(config),
            router: Arc::new(router),
            servlet: Arc::new(servlet),
            cpu_pool,
            io_pool,
            switch,
            running: Arc::new(AtomicBool::new(true)),
            router_locked_once: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Exposes the switching primitive so handlers registered on this
    /// server's router can hop blocking work to the I/O pool.
    pub fn switch(&self) -> Arc<Switch> {
        Arc::clone(&self.switch)
    }
}

impl Pipeline for HybridServer {
    fn name(&self) -> &'static str {
        "hybrid"
    }

    fn run(&self) -> Result<(), StartupError> {
        acceptor::run(
            Arc::clone(&self.config),
            self.port,
            Arc::clone(&self.router),
            Arc::clone(&self.servlet),
            Arc::clone(&self.cpu_pool),
            Arc::clone(&self.switch),
            Arc::clone(&self.running),
            Arc::clone(&self.router_locked_once),
        )
    }

    fn shutdown(&self) {
        self.running.store(false, Ordering::Release);
        self.cpu_pool.shutdown(Duration::from_secs(30));
        self.io_pool.shutdown(Duration::from_secs(30));
    }
}
