//! Structured logging facility.
//!
//! The teacher has no logging of its own (errors are returned, not logged);
//! this adopts `tracing`/`tracing-subscriber` from the wider example pack
//! (`jagadeesh32-cello`) as the ambient stack `SPEC_FULL.md` calls for.
//! Every pipeline logs connection resets and timeouts at `debug`, handler
//! errors at `warn`, and startup/shutdown at `info`, per `spec.md` §7.

use tracing_subscriber::EnvFilter;

/// Installs a global `tracing` subscriber reading its filter from
/// `RUST_LOG`, defaulting to `info` when unset. Idempotent: a second call
/// is a harmless no-op (the underlying `set_global_default` error is
/// swallowed), mirroring the idempotence the rest of the platform's
/// lifecycle operations are required to have (`spec.md` §8, invariant 6).
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}
