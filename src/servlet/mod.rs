//! Mini-servlet container (C5): an ordered registry of pattern-bound
//! handlers with an explicit lifecycle, consulted by each pipeline ahead
//! of the plain router.
//!
//! Grounded structurally on [`crate::routing::router`] for pattern
//! resolution, and on the teacher's builder-then-launch `Server`/
//! `ServerBuilder` split (`src/server/server_impl.rs`) for the
//! registration-then-lock lifecycle shape — generalized here into the
//! three explicit states `spec.md` §4.5 names.

use crate::errors::ServletError;
use crate::http::{Request, Response};
use crate::routing::router::Handler;
use crate::routing::pattern::Pattern;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info};

/// Per-handler initialization parameters, merged from container-global and
/// handler-specific maps plus a synthesized `servlet.pattern` entry.
pub type InitParams = HashMap<String, String>;

trait Lifecycle: Send + Sync {
    fn init(&self, params: &InitParams) -> Result<(), String>;
    fn destroy(&self);
}

struct Entry {
    pattern: Pattern,
    handler: Arc<dyn Handler>,
    init_params: InitParams,
    on_init: Option<Box<dyn Fn(&InitParams) -> Result<(), String> + Send + Sync>>,
    on_destroy: Option<Box<dyn Fn() + Send + Sync>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerState {
    Unstarted,
    Running,
    Destroyed,
}

/// Ordered `(pattern -> handler-with-lifecycle)` registry. Registrations
/// are accepted only while [`ContainerState::Unstarted`]; `spec.md` §4.5.
pub struct ServletContainer {
    entries: RwLock<Vec<Entry>>,
    state: RwLock<ContainerState>,
    global_init_params: InitParams,
}

impl ServletContainer {
    pub fn new() -> Self {
        ServletContainer {
            entries: RwLock::new(Vec::new()),
            state: RwLock::new(ContainerState::Unstarted),
            global_init_params: InitParams::new(),
        }
    }

    pub fn with_global_init_params(mut self, params: InitParams) -> Self {
        self.global_init_params = params;
        self
    }

    pub fn state(&self) -> ContainerState {
        *self.state.read()
    }

    /// Registers `handler` for `pattern`. Errors if the container has
    /// already left [`ContainerState::Unstarted`].
    pub fn register(
        &self,
        pattern: &str,
        handler: impl Handler + 'static,
        init_params: InitParams,
    ) -> Result<(), ServletError> {
        self.register_with_lifecycle(pattern, handler, init_params, None, None)
    }

    /// Registers `handler` plus explicit init/destroy callbacks, the
    /// asynchronous-initialization counterpart `spec.md` §4.5 calls
    /// `registerAsync` (synchronous here: the container itself has no
    /// async runtime dependency, callers intending asynchronous init run
    /// their own future to completion before this call, per the Hybrid/
    /// EventLoop pipelines' existing pool hand-offs).
    pub fn register_async(
        &self,
        pattern: &str,
        handler: impl Handler + 'static,
        init_params: InitParams,
        on_init: impl Fn(&InitParams) -> Result<(), String> + Send + Sync + 'static,
        on_destroy: impl Fn() + Send + Sync + 'static,
    ) -> Result<(), ServletError> {
        self.register_with_lifecycle(pattern, handler, init_params, Some(Box::new(on_init)), Some(Box::new(on_destroy)))
    }

    fn register_with_lifecycle(
        &self,
        pattern: &str,
        handler: impl Handler + 'static,
        init_params: InitParams,
        on_init: Option<Box<dyn Fn(&InitParams) -> Result<(), String> + Send + Sync>>,
        on_destroy: Option<Box<dyn Fn() + Send + Sync>>,
    ) -> Result<(), ServletError> {
        if self.state() != ContainerState::Unstarted {
            return Err(ServletError::AlreadyStarted);
        }
        self.entries.write().push(Entry {
            pattern: Pattern::compile(pattern),
            handler: Arc::new(handler),
            init_params,
            on_init,
            on_destroy,
        });
        Ok(())
    }

    /// Runs every handler's init callback with its merged context
    /// (`spec.md` §4.5: "global init-params union handler-specific
    /// init-params, plus `servlet.pattern`"). Failure aborts startup and
    /// leaves the container `Unstarted`.
    pub fn initialize(&self) -> Result<(), ServletError> {
        if self.state() != ContainerState::Unstarted {
            return Err(ServletError::AlreadyStarted);
        }
        let entries = self.entries.read();
        for entry in entries.iter() {
            if let Some(on_init) = &entry.on_init {
                let mut merged = self.global_init_params.clone();
                merged.extend(entry.init_params.clone());
                merged.insert("servlet.pattern".to_string(), pattern_label(&entry.pattern));
                if let Err(message) = on_init(&merged) {
                    error!(pattern = %pattern_label(&entry.pattern), %message, "servlet init failed");
                    return Err(ServletError::InitFailed {
                        pattern: pattern_label(&entry.pattern),
                        message,
                    });
                }
            }
        }
        drop(entries);
        *self.state.write() = ContainerState::Running;
        info!("servlet container initialized");
        Ok(())
    }

    /// Resolves `request` by exact match, then by the same priority rules
    /// as [`crate::routing::Router`]; `None` means the caller's fallback
    /// router should be consulted instead.
    pub fn handle(&self, request: &Request, response: &mut Response) -> Result<Option<crate::http::Handled>, ServletError> {
        if self.state() != ContainerState::Running {
            return Err(ServletError::NotInitialized);
        }
        let path = request.url().path();
        let entries = self.entries.read();

        if let Some(entry) = entries.iter().find(|e| matches!(&e.pattern, Pattern::Exact(p) if p.as_str() == path)) {
            return Ok(Some(entry.handler.handle(request, response)));
        }
        for entry in entries.iter() {
            if matches!(entry.pattern, Pattern::Param(_)) && entry.pattern.matches(path).is_some() {
                return Ok(Some(entry.handler.handle(request, response)));
            }
        }
        for entry in entries.iter() {
            if matches!(entry.pattern, Pattern::Prefix(_)) && entry.pattern.matches(path).is_some() {
                return Ok(Some(entry.handler.handle(request, response)));
            }
        }
        for entry in entries.iter() {
            if matches!(entry.pattern, Pattern::Wildcard) {
                return Ok(Some(entry.handler.handle(request, response)));
            }
        }
        Ok(None)
    }

    /// Tears down every initialised handler. Individual failures are
    /// logged and swallowed so one bad handler cannot block cleanup
    /// (`spec.md` §4.5).
    pub fn destroy(&self) {
        let entries = self.entries.read();
        for entry in entries.iter() {
            if let Some(on_destroy) = &entry.on_destroy {
                on_destroy();
            }
        }
        drop(entries);
        *self.state.write() = ContainerState::Destroyed;
        info!("servlet container destroyed");
    }
}

impl Default for ServletContainer {
    fn default() -> Self {
        ServletContainer::new()
    }
}

fn pattern_label(pattern: &Pattern) -> String {
    match pattern {
        Pattern::Exact(p) => p.clone(),
        Pattern::Prefix(p) => format!("{p}/*"),
        Pattern::Wildcard => "/*".to_string(),
        Pattern::Param(_) => "<parameterised>".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{HeaderMap, Method, Url, Version};

    fn req(path: &str) -> Request {
        Request::new(Method::Get, Url::parse(path), Version::Http11, HeaderMap::new(), Vec::new())
    }

    #[test]
    fn registration_forbidden_once_running() {
        let container = ServletContainer::new();
        container.initialize().unwrap();
        let result = container.register("/x", |_: &Request, r: &mut Response| r.body(Vec::new()), InitParams::new());
        assert!(matches!(result, Err(ServletError::AlreadyStarted)));
    }

    #[test]
    fn handle_returns_none_on_miss_for_fallback_routing() {
        let container = ServletContainer::new();
        container.initialize().unwrap();
        let mut resp = Response::new(Version::Http11);
        assert!(container.handle(&req("/nope"), &mut resp).unwrap().is_none());
    }

    #[test]
    fn init_failure_aborts_startup() {
        let container = ServletContainer::new();
        container
            .register_async(
                "/boom",
                |_: &Request, r: &mut Response| r.body(Vec::new()),
                InitParams::new(),
                |_| Err("disk unavailable".to_string()),
                || {},
            )
            .unwrap();
        let result = container.initialize();
        assert!(matches!(result, Err(ServletError::InitFailed { .. })));
        assert_eq!(container.state(), ContainerState::Unstarted);
    }

    #[test]
    fn destroy_swallows_and_continues_past_bad_handlers() {
        let container = ServletContainer::new();
        let ran = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let ran_clone = Arc::clone(&ran);
        container
            .register_async(
                "/a",
                |_: &Request, r: &mut Response| r.body(Vec::new()),
                InitParams::new(),
                |_| Ok(()),
                move || ran_clone.store(true, std::sync::atomic::Ordering::SeqCst),
            )
            .unwrap();
        container.initialize().unwrap();
        container.destroy();
        assert!(ran.load(std::sync::atomic::Ordering::SeqCst));
        assert_eq!(container.state(), ContainerState::Destroyed);
    }
}
