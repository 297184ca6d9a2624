//! Middleware chain.
//!
//! `spec.md` §4.1: "Each middleware receives the request and a `next`
//! continuation that yields a lazy response; it may short-circuit." The
//! "lazy response" is realized here as the continuation itself, rather
//! than a separate future type: calling `next` is what runs the rest of
//! the chain, so a middleware that never calls it has genuinely
//! short-circuited rather than just discarding an already-computed value.

use crate::http::{Request, Response};

/// A step in the router's middleware chain.
pub trait Middleware: Send + Sync {
    fn handle(&self, req: &mut Request, next: &dyn Fn(&mut Request) -> Response) -> Response;
}

impl<F> Middleware for F
where
    F: Fn(&mut Request, &dyn Fn(&mut Request) -> Response) -> Response + Send + Sync,
{
    fn handle(&self, req: &mut Request, next: &dyn Fn(&mut Request) -> Response) -> Response {
        self(req, next)
    }
}

/// Builds a single continuation that runs `middlewares[0..]` in order,
/// finally invoking `dispatch` once the chain is exhausted.
pub(crate) fn chain<'a>(
    middlewares: &'a [std::sync::Arc<dyn Middleware>],
    dispatch: &'a dyn Fn(&mut Request) -> Response,
) -> Box<dyn Fn(&mut Request) -> Response + 'a> {
    if let Some((first, rest)) = middlewares.split_first() {
        let next = chain(rest, dispatch);
        Box::new(move |req| first.handle(req, &*next))
    } else {
        Box::new(move |req| dispatch(req))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{StatusCode, Version};
    use std::sync::Arc;

    fn req() -> Request {
        Request::new(
            crate::http::Method::Get,
            crate::http::Url::parse("/x"),
            Version::Http11,
            crate::http::HeaderMap::new(),
            Vec::new(),
        )
    }

    #[test]
    fn middleware_can_short_circuit() {
        let blocker: Arc<dyn Middleware> = Arc::new(
            |_: &mut Request, _: &dyn Fn(&mut Request) -> Response| {
                let mut r = Response::new(Version::Http11);
                r.status(StatusCode::Forbidden).body(Vec::new());
                r
            },
        );
        let dispatch = |_: &mut Request| {
            panic!("dispatch should not run when blocked");
        };
        let run = chain(std::slice::from_ref(&blocker), &dispatch);
        let resp = run(&mut req());
        assert_eq!(resp.status_code(), StatusCode::Forbidden);
    }

    #[test]
    fn middleware_can_pass_through() {
        let passthrough: Arc<dyn Middleware> =
            Arc::new(|req: &mut Request, next: &dyn Fn(&mut Request) -> Response| next(req));
        let dispatch = |_: &mut Request| {
            let mut r = Response::new(Version::Http11);
            r.status(StatusCode::Ok).body(Vec::new());
            r
        };
        let run = chain(std::slice::from_ref(&passthrough), &dispatch);
        let resp = run(&mut req());
        assert_eq!(resp.status_code(), StatusCode::Ok);
    }
}
