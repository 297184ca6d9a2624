//! The three comparable server architectures (`spec.md` §1): Threaded
//! (C2), Hybrid (C3), and EventLoop (C4), sharing the C1 request/response/
//! router core, C5's servlet container, and the C6 benchmark surface.

pub mod threaded;
pub mod hybrid;
pub mod eventloop;

/// Shared startup/shutdown shape every pipeline exposes, so the benchmark
/// engine and the CLI can drive all three identically (`spec.md` §6:
/// "each server may also be started standalone on a chosen port").
pub trait Pipeline {
    /// Human-readable architecture name, echoed in `/health` and `/status`.
    fn name(&self) -> &'static str;
    /// Blocks the calling thread until [`Pipeline::shutdown`] is called
    /// elsewhere (or a fatal I/O error occurs).
    fn run(&self) -> Result<(), crate::errors::StartupError>;
    /// Idempotent cooperative shutdown (`spec.md` §5's shutdown hook).
    fn shutdown(&self);
}
