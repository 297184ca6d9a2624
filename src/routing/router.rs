//! Pattern router and middleware dispatcher (C1).

use crate::http::{Method, Request, Response, StatusCode, Version};
use crate::routing::middleware::{chain, Middleware};
use crate::routing::pattern::Pattern;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A request handler. Grounded on the teacher's `Handler` trait
/// (`src/server/server_impl.rs`), simplified from the teacher's
/// `Handler<ConnectionData>` generic (which threads per-connection state
/// through every call) to a plain `Fn`, since connection-local state in
/// this crate lives on the pipeline's connection type instead and is
/// passed to handlers that need it via request attributes.
pub trait Handler: Send + Sync {
    fn handle(&self, req: &Request, resp: &mut Response) -> crate::http::Handled;
}

impl<F> Handler for F
where
    F: Fn(&Request, &mut Response) -> crate::http::Handled + Send + Sync,
{
    fn handle(&self, req: &Request, resp: &mut Response) -> crate::http::Handled {
        self(req, resp)
    }
}

struct RouteEntry {
    method: Method,
    pattern: Pattern,
    handler: Arc<dyn Handler>,
}

/// Mapping from `(method, pattern)` to handler, plus an ordered middleware
/// chain, per `spec.md` §3. Read-mostly: [`Router::lock`] forbids further
/// registration, called by each pipeline on its first accepted connection.
pub struct Router {
    entries: Vec<RouteEntry>,
    middlewares: Vec<Arc<dyn Middleware>>,
    locked: AtomicBool,
    debug_mode: bool,
}

impl Router {
    pub fn new() -> Self {
        Router {
            entries: Vec::new(),
            middlewares: Vec::new(),
            locked: AtomicBool::new(false),
            debug_mode: false,
        }
    }

    pub fn with_debug_mode(mut self, debug_mode: bool) -> Self {
        self.debug_mode = debug_mode;
        self
    }

    /// Registers a handler for `(method, pattern)`. Panics if the router
    /// has already accepted its first connection — `spec.md` §3:
    /// "registration forbidden after the server has accepted its first
    /// connection."
    pub fn route(&mut self, method: Method, pattern: &str, handler: impl Handler + 'static) -> &mut Self {
        assert!(
            !self.locked.load(Ordering::Acquire),
            "cannot register routes after the router has been locked"
        );
        self.entries.push(RouteEntry {
            method,
            pattern: Pattern::compile(pattern),
            handler: Arc::new(handler),
        });
        self
    }

    pub fn get(&mut self, pattern: &str, handler: impl Handler + 'static) -> &mut Self {
        self.route(Method::Get, pattern, handler)
    }

    pub fn post(&mut self, pattern: &str, handler: impl Handler + 'static) -> &mut Self {
        self.route(Method::Post, pattern, handler)
    }

    pub fn head(&mut self, pattern: &str, handler: impl Handler + 'static) -> &mut Self {
        self.route(Method::Head, pattern, handler)
    }

    pub fn use_middleware(&mut self, middleware: impl Middleware + 'static) -> &mut Self {
        assert!(
            !self.locked.load(Ordering::Acquire),
            "cannot register middleware after the router has been locked"
        );
        self.middlewares.push(Arc::new(middleware));
        self
    }

    /// Forbids further registration. Idempotent.
    pub fn lock(&self) {
        self.locked.store(true, Ordering::Release);
    }

    pub fn is_locked(&self) -> bool {
        self.locked.load(Ordering::Acquire)
    }

    /// Finds the best-matching route for `(method, path)`, applying the
    /// exact > parameterised > prefix > total-wildcard priority of
    /// `spec.md` §4.1, with ties (multiple parameterised/prefix matches)
    /// broken by registration order (prefix matches additionally prefer
    /// the longest prefix first).
    fn resolve(&self, method: Method, path: &str) -> Option<(&RouteEntry, Vec<(String, String)>)> {
        let candidates = || self.entries.iter().filter(|e| e.method == method);

        for entry in candidates() {
            if matches!(entry.pattern, Pattern::Exact(_)) {
                if let Some(caps) = entry.pattern.matches(path) {
                    return Some((entry, caps));
                }
            }
        }
        for entry in candidates() {
            if matches!(entry.pattern, Pattern::Param(_)) {
                if let Some(caps) = entry.pattern.matches(path) {
                    return Some((entry, caps));
                }
            }
        }
        let mut prefix_matches: Vec<&RouteEntry> = candidates()
            .filter(|e| matches!(e.pattern, Pattern::Prefix(_)) && e.pattern.matches(path).is_some())
            .collect();
        prefix_matches.sort_by(|a, b| b.pattern.specificity().cmp(&a.pattern.specificity()));
        if let Some(entry) = prefix_matches.into_iter().next() {
            return Some((entry, Vec::new()));
        }
        for entry in candidates() {
            if matches!(entry.pattern, Pattern::Wildcard) {
                return Some((entry, Vec::new()));
            }
        }
        None
    }

    /// Routes `request` through the middleware chain to the matched
    /// handler (or a `404`), catching handler/middleware panics into a
    /// `500` per `spec.md` §4.1.
    pub fn dispatch(&self, mut request: Request) -> Response {
        let method = request.method();
        let path = request.url().path().to_string();
        let version = request.version();

        let dispatch_inner = |request: &mut Request| -> Response {
            let mut response = Response::new(version);
            match self.resolve(method, &path) {
                Some((entry, captures)) => {
                    for (name, value) in captures {
                        request.set_attribute(format!("path.{name}"), value);
                    }
                    entry.handler.handle(request, &mut response);
                }
                None => {
                    crate::http::response::not_found(
                        format!("no route matches {path}"),
                        &mut response,
                    );
                }
            }
            response
        };

        let run = chain(&self.middlewares, &dispatch_inner);
        let outcome = catch_unwind(AssertUnwindSafe(|| run(&mut request)));

        match outcome {
            Ok(response) => response,
            Err(panic) => {
                let message = panic_message(&panic);
                let mut response = Response::new(version);
                response.status(StatusCode::InternalServerError);
                let body = if self.debug_mode {
                    message
                } else {
                    "internal server error".to_string()
                };
                response.body(body.into_bytes());
                response
            }
        }
    }
}

impl Default for Router {
    fn default() -> Self {
        Router::new()
    }
}

fn panic_message(panic: &Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "handler panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{HeaderMap, Url};

    fn request(method: Method, path: &str) -> Request {
        Request::new(method, Url::parse(path), Version::Http11, HeaderMap::new(), Vec::new())
    }

    #[test]
    fn exact_beats_parameterised_and_wildcard() {
        let mut router = Router::new();
        router.get("/users/me", |_: &Request, r: &mut Response| r.body(b"exact".to_vec()));
        router.get("/users/{id}", |_: &Request, r: &mut Response| r.body(b"param".to_vec()));
        router.get("/*", |_: &Request, r: &mut Response| r.body(b"wild".to_vec()));

        let resp = router.dispatch(request(Method::Get, "/users/me"));
        assert_eq!(resp.bytes_body(), Some(&b"exact"[..]));
    }

    #[test]
    fn path_param_is_bound_into_request_attributes() {
        let mut router = Router::new();
        router.get("/users/{id}", |req: &Request, r: &mut Response| {
            r.body(req.path_param("id").unwrap_or("").as_bytes().to_vec())
        });
        let resp = router.dispatch(request(Method::Get, "/users/42"));
        assert_eq!(resp.bytes_body(), Some(&b"42"[..]));
    }

    #[test]
    fn routing_miss_is_404_and_mentions_the_path() {
        let router = Router::new();
        let resp = router.dispatch(request(Method::Get, "/nope"));
        assert_eq!(resp.status_code(), StatusCode::NotFound);
        let body = String::from_utf8(resp.bytes_body().unwrap().to_vec()).unwrap();
        assert!(body.contains("/nope"));
    }

    #[test]
    fn handler_panic_becomes_500() {
        let mut router = Router::new();
        router.get("/boom", |_: &Request, _: &mut Response| -> crate::http::Handled {
            panic!("kaboom")
        });
        let resp = router.dispatch(request(Method::Get, "/boom"));
        assert_eq!(resp.status_code(), StatusCode::InternalServerError);
    }

    #[test]
    fn debug_mode_includes_panic_message() {
        let mut router = Router::new().with_debug_mode(true);
        router.get("/boom", |_: &Request, _: &mut Response| -> crate::http::Handled {
            panic!("kaboom")
        });
        let resp = router.dispatch(request(Method::Get, "/boom"));
        let body = String::from_utf8(resp.bytes_body().unwrap().to_vec()).unwrap();
        assert!(body.contains("kaboom"));
    }

    #[test]
    fn prefix_matching_prefers_longest_prefix() {
        let mut router = Router::new();
        router.get("/p/*", |_: &Request, r: &mut Response| r.body(b"short".to_vec()));
        router.get("/p/deep/*", |_: &Request, r: &mut Response| r.body(b"long".to_vec()));
        let resp = router.dispatch(request(Method::Get, "/p/deep/thing"));
        assert_eq!(resp.bytes_body(), Some(&b"long"[..]));
    }
}
