//! Parsed HTTP/1.1 request.
//!
//! Grounded on the teacher's `Request` (`src/http/request.rs`) for the
//! field set (method, url, version, headers, body) but reworked to own its
//! data: a Threaded-pipeline connection hands a `Request` straight to a
//! handler on the same thread, a Hybrid-pipeline connection hands it across
//! to a pool worker thread, and an EventLoop connection keeps it in a
//! `HashMap<Token, _>` on the reactor thread — none of those are a single
//! pinned buffer the way the teacher's tokio-task-per-connection model is.

use crate::http::{HeaderMap, Method, Url, Version};
use std::collections::HashMap;
use std::net::SocketAddr;

/// A value threaded through the request's attribute map by routing and
/// middleware (`spec.md` §3: "an open-ended attribute map used to thread
/// routing-derived values... through middleware").
#[derive(Debug, Clone, PartialEq)]
pub enum Attribute {
    Str(String),
    Bool(bool),
}

impl Attribute {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Attribute::Str(s) => Some(s.as_str()),
            Attribute::Bool(_) => None,
        }
    }
}

impl From<String> for Attribute {
    fn from(value: String) -> Self {
        Attribute::Str(value)
    }
}

impl From<&str> for Attribute {
    fn from(value: &str) -> Self {
        Attribute::Str(value.to_string())
    }
}

impl From<bool> for Attribute {
    fn from(value: bool) -> Self {
        Attribute::Bool(value)
    }
}

/// An immutable (from the handler's perspective, save for its attribute
/// map) parsed HTTP/1.1 request.
#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    url: Url,
    version: Version,
    headers: HeaderMap,
    body: Vec<u8>,
    attributes: HashMap<String, Attribute>,
    client_addr: Option<SocketAddr>,
    server_addr: Option<SocketAddr>,
}

impl Request {
    pub(crate) fn new(
        method: Method,
        url: Url,
        version: Version,
        headers: HeaderMap,
        body: Vec<u8>,
    ) -> Self {
        Request {
            method,
            url,
            version,
            headers,
            body,
            attributes: HashMap::new(),
            client_addr: None,
            server_addr: None,
        }
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn client_addr(&self) -> Option<SocketAddr> {
        self.client_addr
    }

    pub fn server_addr(&self) -> Option<SocketAddr> {
        self.server_addr
    }

    pub(crate) fn set_peers(&mut self, client: SocketAddr, server: SocketAddr) {
        self.client_addr = Some(client);
        self.server_addr = Some(server);
    }

    /// Sets a routing-derived attribute, e.g. `path.id` for a `{id}` capture.
    pub fn set_attribute(&mut self, key: impl Into<String>, value: impl Into<Attribute>) {
        self.attributes.insert(key.into(), value.into());
    }

    pub fn attribute(&self, key: &str) -> Option<&Attribute> {
        self.attributes.get(key)
    }

    /// Convenience accessor for a `path.<name>` capture set by the router.
    pub fn path_param(&self, name: &str) -> Option<&str> {
        self.attributes
            .get(&format!("path.{name}"))
            .and_then(Attribute::as_str)
    }

    /// Whether the client asked to close the connection after this
    /// response (`Connection: close`), independent of protocol version.
    pub fn wants_close(&self) -> bool {
        self.headers
            .get("connection")
            .map(|v| v.eq_ignore_ascii_case("close"))
            .unwrap_or(false)
    }

    pub fn host(&self) -> Option<&str> {
        self.headers.get("host")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Request {
        let mut headers = HeaderMap::new();
        headers.append("Host", "localhost");
        Request::new(
            Method::Get,
            Url::parse("/users/42"),
            Version::Http11,
            headers,
            Vec::new(),
        )
    }

    #[test]
    fn path_params_round_trip() {
        let mut req = sample();
        req.set_attribute("path.id", "42");
        assert_eq!(req.path_param("id"), Some("42"));
        assert_eq!(req.path_param("missing"), None);
    }

    #[test]
    fn host_header_accessor() {
        assert_eq!(sample().host(), Some("localhost"));
    }

    #[test]
    fn wants_close_reads_connection_header() {
        let mut req = sample();
        assert!(!req.wants_close());
        req.headers_mut_for_test().set("Connection", "close");
        assert!(req.wants_close());
    }

    impl Request {
        fn headers_mut_for_test(&mut self) -> &mut HeaderMap {
            &mut self.headers
        }
    }
}
