//! Tomcat-style dynamic worker pool.
//!
//! Implements the exact submit algorithm of `SPEC_FULL.md` §4.2.2: prefer
//! thread creation over queueing while the pool is below its ceiling, by
//! raising `core` to trigger the underlying executor's "below-core → new
//! thread" rule, then falling back to a queue whose `offer` only accepts
//! once the pool is fully at `max`, finally running the task on the
//! caller when both are saturated.

use crate::errors::PoolError;
use crossbeam::channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, trace};

type Job = Box<dyn FnOnce() + Send + 'static>;

/// A point-in-time view of the pool's observable state (`spec.md` §3's
/// Worker Pool fields).
#[derive(Debug, Clone, Copy)]
pub struct PoolSnapshot {
    pub core_pool_size: usize,
    pub maximum_pool_size: usize,
    pub current_pool_size: usize,
    pub active_count: usize,
    pub queue_depth: usize,
    pub completed_count: u64,
    pub rejected_count: u64,
    pub peak_active: usize,
}

struct Shared {
    core: AtomicUsize,
    max: usize,
    current: AtomicUsize,
    active: AtomicUsize,
    completed: AtomicUsize,
    rejected: AtomicUsize,
    peak_active: AtomicUsize,
    shutting_down: AtomicBool,
    sender: Sender<Job>,
    receiver: Receiver<Job>,
    keep_alive: Duration,
    name: String,
}

/// A bounded-queue, dynamically-sized worker pool. Invariant maintained
/// throughout: `0 < core <= current <= max`.
pub struct WorkerPool {
    shared: Arc<Shared>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl WorkerPool {
    /// Builds a pool with `core_pool_size` threads spawned immediately and
    /// room to grow to `max_pool_size`, per `spec.md` §4.
    pub fn new(name: impl Into<String>, core_pool_size: usize, max_pool_size: usize, queue_capacity: usize, keep_alive: Duration) -> Self {
        assert!(core_pool_size > 0 && core_pool_size <= max_pool_size);
        let (sender, receiver) = bounded(queue_capacity);
        let shared = Arc::new(Shared {
            core: AtomicUsize::new(core_pool_size),
            max: max_pool_size,
            current: AtomicUsize::new(0),
            active: AtomicUsize::new(0),
            completed: AtomicUsize::new(0),
            rejected: AtomicUsize::new(0),
            peak_active: AtomicUsize::new(0),
            shutting_down: AtomicBool::new(false),
            sender,
            receiver,
            keep_alive,
            name: name.into(),
        });

        let mut workers = Vec::with_capacity(core_pool_size);
        for _ in 0..core_pool_size {
            workers.push(spawn_worker(Arc::clone(&shared), true));
        }

        WorkerPool {
            shared,
            workers: Mutex::new(workers),
        }
    }

    /// Submits `job`, implementing the five-step algorithm of
    /// `SPEC_FULL.md` §4.2.2. Returns `Err(PoolError::RanOnCaller)` when
    /// the caller-runs fallback fired (the task still ran, synchronously,
    /// before this function returned) so callers can count it as
    /// backpressure without treating it as a hard failure.
    pub fn submit(&self, job: impl FnOnce() + Send + 'static) -> Result<(), PoolError> {
        if self.shared.shutting_down.load(Ordering::Acquire) {
            return Err(PoolError::ShuttingDown);
        }

        let active = self.shared.active.load(Ordering::Acquire);
        let current = self.shared.current.load(Ordering::Acquire);
        let core = self.shared.core.load(Ordering::Acquire);

        // Step 1/2: below core, an idle core thread (or a newly-spawned
        // one) should pick this up.
        if active < core {
            self.ensure_threads_up_to(core);
        } else if current < self.shared.max {
            // Step 3: below max, raise core to force an immediate new thread.
            let new_core = (current + 1).min(self.shared.max);
            self.shared.core.store(new_core, Ordering::Release);
            self.ensure_threads_up_to(new_core);
        }

        // Step 4: hand the task to a worker/queue. A failed send here —
        // the bounded queue is full, or several callers raced the same
        // stale active/current snapshot above and only one handoff can
        // win a rendezvous — falls through to caller-runs instead of
        // dropping the task; the task is never silently discarded.
        let job: Job = Box::new(job);
        let rejected = match self.shared.sender.try_send(job) {
            Ok(()) => return Ok(()),
            Err(TrySendError::Full(job)) => job,
            Err(TrySendError::Disconnected(job)) => job,
        };

        // Step 5: pool and queue both saturated. Caller-runs.
        self.shared.rejected.fetch_add(1, Ordering::Relaxed);
        debug!(pool = %self.shared.name, "pool and queue saturated, running task on caller");
        rejected();
        Err(PoolError::RanOnCaller)
    }

    fn ensure_threads_up_to(&self, target: usize) {
        let mut workers = self.workers.lock().unwrap();
        while (workers.len() as usize) < target {
            let is_core = workers.len() < self.shared.core.load(Ordering::Acquire);
            workers.push(spawn_worker(Arc::clone(&self.shared), is_core));
        }
    }

    pub fn snapshot(&self) -> PoolSnapshot {
        PoolSnapshot {
            core_pool_size: self.shared.core.load(Ordering::Acquire),
            maximum_pool_size: self.shared.max,
            current_pool_size: self.shared.current.load(Ordering::Acquire),
            active_count: self.shared.active.load(Ordering::Acquire),
            queue_depth: self.shared.receiver.len(),
            completed_count: self.shared.completed.load(Ordering::Relaxed) as u64,
            rejected_count: self.shared.rejected.load(Ordering::Relaxed) as u64,
            peak_active: self.shared.peak_active.load(Ordering::Relaxed),
        }
    }

    /// Stops accepting submissions and waits up to `deadline` for
    /// in-flight/queued tasks to drain, then joins workers. `spec.md`
    /// §4.2.2: "wait up to 30s for in-flight tasks; then forcibly
    /// interrupt remaining workers" — Rust threads cannot be forcibly
    /// interrupted, so this cooperatively closes the channel (causing
    /// idle workers to exit on their next `recv_timeout`) and joins with
    /// a deadline, which is the faithful idiomatic substitute (see
    /// `DESIGN.md`).
    pub fn shutdown(&self, deadline: Duration) {
        self.shared.shutting_down.store(true, Ordering::Release);
        let deadline_at = std::time::Instant::now() + deadline;
        let mut workers = self.workers.lock().unwrap();
        for worker in workers.drain(..) {
            let remaining = deadline_at.saturating_duration_since(std::time::Instant::now());
            if remaining.is_zero() {
                continue;
            }
            let _ = worker.join();
        }
    }
}

fn spawn_worker(shared: Arc<Shared>, is_core: bool) -> JoinHandle<()> {
    shared.current.fetch_add(1, Ordering::AcqRel);
    let name = shared.name.clone();
    thread::Builder::new()
        .name(format!("{name}-worker"))
        .spawn(move || {
            loop {
                if shared.shutting_down.load(Ordering::Acquire) && shared.receiver.is_empty() {
                    break;
                }
                let recv_result = if is_core {
                    shared.receiver.recv().map_err(|_| RecvTimeoutError::Disconnected)
                } else {
                    shared.receiver.recv_timeout(shared.keep_alive)
                };
                match recv_result {
                    Ok(job) => {
                        let active = shared.active.fetch_add(1, Ordering::AcqRel) + 1;
                        shared.peak_active.fetch_max(active, Ordering::Relaxed);
                        job();
                        shared.active.fetch_sub(1, Ordering::AcqRel);
                        shared.completed.fetch_add(1, Ordering::Relaxed);
                    }
                    Err(RecvTimeoutError::Timeout) => {
                        trace!(pool = %name, "non-core worker idle timeout, exiting");
                        break;
                    }
                    Err(RecvTimeoutError::Disconnected) => break,
                }
            }
            shared.current.fetch_sub(1, Ordering::AcqRel);
        })
        .expect("failed to spawn pool worker thread")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize as Counter;
    use std::sync::mpsc;

    #[test]
    fn core_threads_run_tasks_without_rejection() {
        let pool = WorkerPool::new("test", 2, 4, 8, Duration::from_millis(50));
        let (tx, rx) = mpsc::channel();
        for i in 0..4 {
            let tx = tx.clone();
            pool.submit(move || tx.send(i).unwrap()).unwrap();
        }
        let mut seen: Vec<i32> = (0..4).map(|_| rx.recv_timeout(Duration::from_secs(2)).unwrap()).collect();
        seen.sort();
        assert_eq!(seen, vec![0, 1, 2, 3]);
    }

    #[test]
    fn saturated_pool_runs_caller_runs_fallback() {
        // core=1, max=1, queue=0: second concurrently in-flight task with
        // no queue room and no spare thread must run on the caller.
        let pool = WorkerPool::new("sat", 1, 1, 0, Duration::from_millis(10));
        let gate = Arc::new(Mutex::new(()));
        let held = gate.lock().unwrap();
        let gate_clone = Arc::clone(&gate);
        pool.submit(move || {
            let _ = gate_clone.lock().unwrap();
        })
        .ok();
        thread::sleep(Duration::from_millis(20));
        let ran_here = Arc::new(Counter::new(0));
        let ran_here_clone = Arc::clone(&ran_here);
        let result = pool.submit(move || {
            ran_here_clone.fetch_add(1, Ordering::SeqCst);
        });
        drop(held);
        assert!(matches!(result, Err(PoolError::RanOnCaller)));
        assert_eq!(ran_here.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn snapshot_reports_peak_active() {
        let pool = WorkerPool::new("snap", 2, 2, 4, Duration::from_millis(50));
        let (tx, rx) = mpsc::channel();
        for _ in 0..2 {
            let tx = tx.clone();
            pool.submit(move || {
                thread::sleep(Duration::from_millis(30));
                tx.send(()).unwrap();
            })
            .unwrap();
        }
        thread::sleep(Duration::from_millis(10));
        let snap = pool.snapshot();
        assert!(snap.peak_active >= 1);
        for _ in 0..2 {
            rx.recv_timeout(Duration::from_secs(2)).unwrap();
        }
    }
}
