//! Threaded pipeline (C2): connection-per-thread acceptor over a
//! Tomcat-style dynamic [`WorkerPool`], the "hard core" all three
//! architectures are compared against.

mod acceptor;
mod connection;

use crate::config::PipelineConfig;
use crate::errors::StartupError;
use crate::pipelines::Pipeline;
use crate::pool::WorkerPool;
use crate::routing::Router;
use crate::servlet::ServletContainer;
use acceptor::AcceptorStats;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub struct ThreadedServer {
    port: u16,
    config: Arc<PipelineConfig>,
    router: Arc<Router>,
    servlet: Arc<ServletContainer>,
    pool: Arc<WorkerPool>,
    running: Arc<AtomicBool>,
    stats: Arc<AcceptorStats>,
    router_locked_once: Arc<AtomicBool>,
}

impl ThreadedServer {
    pub fn new(port: u16, config: PipelineConfig, mut router: Router) -> Self {
        let servlet = ServletContainer::new();
        crate::handlers::mount(&mut router, "threaded");
        servlet.initialize().expect("default servlet container has no fallible handlers");

        let pool = WorkerPool::new(
            "threaded",
            config.core_pool_size,
            config.max_pool_size,
            config.queue_capacity,
            config.keep_alive_time,
        );

        ThreadedServer {
            port,
            config: Arc::new(config),
            router: Arc::new(router),
            servlet: Arc::new(servlet),
            pool: Arc::new(pool),
            running: Arc::new(AtomicBool::new(true)),
            stats: Arc::new(AcceptorStats::new()),
            router_locked_once: Arc::new(AtomicBool::new(false)),
        }
    }
}

impl Pipeline for ThreadedServer {
    fn name(&self) -> &'static str {
        "threaded"
    }

    fn run(&self) -> Result<(), StartupError> {
        acceptor::run(
            Arc::clone(&self.config),
            self.port,
            Arc::clone(&self.router),
            Arc::clone(&self.servlet),
            Arc::clone(&self.pool),
            Arc::clone(&self.running),
            Arc::clone(&self.stats),
            Arc::clone(&self.router_locked_once),
        )
    }

    fn shutdown(&self) {
        self.running.store(false, Ordering::Release);
        self.pool.shutdown(Duration::from_secs(30));
    }
}
