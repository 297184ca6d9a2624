//! Dynamic, bounded-queue worker pool shared by the Threaded and Hybrid
//! pipelines (`spec.md` §4.2.2).
//!
//! Grounded on the teacher's task hand-off in `src/server/server_impl.rs`
//! (`Arc<SegQueue<_>>` fed by an acceptor task, drained by `tokio::spawn`
//! workers) — generalized here from a fixed `tokio::spawn` per connection
//! into a pool with a bounded core/max thread count and a bounded queue,
//! since `spec.md` requires the exact Tomcat-style submit algorithm rather
//! than unbounded task spawning.

mod worker_pool;

pub use worker_pool::{PoolSnapshot, WorkerPool};
