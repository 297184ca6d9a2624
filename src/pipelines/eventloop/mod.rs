//! EventLoop pipeline (C4): a single reactor thread with a task queue and
//! an `executeAsync` escape hatch for anything that would otherwise block
//! it (`spec.md` §4.4).

mod connection;
pub mod reactor;

use crate::config::PipelineConfig;
use crate::errors::StartupError;
use crate::pipelines::Pipeline;
use crate::pool::WorkerPool;
use crate::routing::Router;
use crate::servlet::ServletContainer;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub struct EventLoopServer {
    port: u16,
    config: Arc<PipelineConfig>,
    router: Arc<Router>,
    servlet: Arc<ServletContainer>,
    /// Small helper pool that every request's router/servlet dispatch runs
    /// on, so the reactor thread itself never blocks (see `reactor.rs`).
    helper_pool: Arc<WorkerPool>,
    running: Arc<AtomicBool>,
    router_locked_once: Arc<AtomicBool>,
}

impl EventLoopServer {
    pub fn new(port: u16, config: PipelineConfig, mut router: Router) -> Self {
        let servlet = ServletContainer::new();
        crate::handlers::mount(&mut router, "eventloop");
        servlet.initialize().expect("default servlet container has no fallible handlers");

        let helper_pool = Arc::new(WorkerPool::new(
            "eventloop-helper",
            config.core_pool_size,
            config.max_pool_size,
            config.queue_capacity,
            config.keep_alive_time,
        ));

        EventLoopServer {
            port,
            config: Arc::new(config),
            router: Arc::new(router),
            servlet: Arc::new(servlet),
            helper_pool,
            running: Arc::new(AtomicBool::new(true)),
            router_locked_once: Arc::new(AtomicBool::new(false)),
        }
    }
}

impl Pipeline for EventLoopServer {
    fn name(&self) -> &'static str {
        "eventloop"
    }

    fn run(&self) -> Result<(), StartupError> {
        reactor::run(
            Arc::clone(&self.config),
            self.port,
            Arc::clone(&self.router),
            Arc::clone(&self.servlet),
            Arc::clone(&self.helper_pool),
            Arc::clone(&self.running),
            Arc::clone(&self.router_locked_once),
        )
    }

    fn shutdown(&self) {
        self.running.store(false, Ordering::Release);
        self.helper_pool.shutdown(Duration::from_secs(30));
    }
}
