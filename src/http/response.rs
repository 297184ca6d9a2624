//! Response builder and wire encoding.
//!
//! Grounded on the teacher's `Response`/`Handled` (`src/http/response.rs`):
//! a marker type `Handled(())` that only a body-writing method can produce,
//! so the type system enforces that every code path through a [`Handler`]
//! actually finishes the response. The teacher writes directly into a
//! preallocated connection buffer; this crate builds an owned [`Response`]
//! value instead, since it must be able to leave a pipeline's I/O thread
//! (Hybrid) or be synthesized off the reactor thread (EventLoop's blocking
//! hand-off) before being written to the wire.
//!
//! [`Handler`]: crate::routing::Handler

use crate::http::{HeaderMap, StatusCode, Version};
use std::time::{SystemTime, UNIX_EPOCH};

/// Proof that a handler finished building a response. Constructible only
/// from within this module.
#[derive(Debug)]
pub struct Handled(());

/// Either a fully-buffered body or a lazily-produced stream, per `spec.md`
/// §3 ("body (bytes or a lazily-produced stream)").
pub enum Body {
    Bytes(Vec<u8>),
    /// Called repeatedly; returns `Ok(true)` when more data remains.
    Stream(Box<dyn FnMut(&mut Vec<u8>) -> std::io::Result<bool> + Send>),
}

impl std::fmt::Debug for Body {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Body::Bytes(b) => f.debug_tuple("Bytes").field(&b.len()).finish(),
            Body::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

#[derive(Debug)]
pub struct Response {
    status: StatusCode,
    headers: HeaderMap,
    body: Body,
    pub(crate) version: Version,
    /// Whether the connection should be kept alive after this response is
    /// written, computed by [`Response::finalize`] from the request/response
    /// `Connection` headers and protocol version (`spec.md` §4.2.3 step 4).
    pub(crate) keep_alive: bool,
}

impl Response {
    pub(crate) fn new(version: Version) -> Self {
        Response {
            status: StatusCode::Ok,
            headers: HeaderMap::new(),
            body: Body::Bytes(Vec::new()),
            version,
            keep_alive: version.keep_alive_by_default(),
        }
    }

    pub fn status(&mut self, status: StatusCode) -> &mut Self {
        self.status = status;
        self
    }

    pub fn header(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.headers.set(name, value);
        self
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn status_code(&self) -> StatusCode {
        self.status
    }

    /// Sets a fully-buffered body and returns proof the response is done.
    pub fn body(&mut self, data: impl Into<Vec<u8>>) -> Handled {
        self.body = Body::Bytes(data.into());
        Handled(())
    }

    /// Sets a lazily-produced streaming body.
    pub fn stream(
        &mut self,
        f: impl FnMut(&mut Vec<u8>) -> std::io::Result<bool> + Send + 'static,
    ) -> Handled {
        self.body = Body::Stream(Box::new(f));
        Handled(())
    }

    /// Finalizes default headers (`Content-Length`, `Content-Type`, `Date`,
    /// `Connection`) and computes keep-alive, per `spec.md` §4.1's Response
    /// builder contract. Called once by the pipeline right before encoding.
    pub(crate) fn finalize(&mut self, request_wants_close: bool, force_close_on_error: bool) {
        if let Body::Bytes(data) = &self.body {
            if !self.headers.contains("content-length") {
                self.headers.set("content-length", data.len().to_string());
            }
        }
        if !self.headers.contains("content-type") {
            self.headers.set("content-type", "text/plain; charset=utf-8");
        }
        if !self.headers.contains("date") {
            self.headers.set("date", http_date_now());
        }

        let should_close = request_wants_close
            || self
                .headers
                .get("connection")
                .map(|v| v.eq_ignore_ascii_case("close"))
                .unwrap_or(false)
            || (force_close_on_error && self.status.is_error())
            || !self.version.keep_alive_by_default();

        if !self.headers.contains("connection") {
            self.headers
                .set("connection", if should_close { "close" } else { "keep-alive" });
        }
        self.keep_alive = !should_close;
    }

    /// Encodes the status line, headers, and a fully-buffered body into
    /// `out`. Streaming bodies are drained by the caller via
    /// [`Response::drain_stream`] instead.
    pub(crate) fn encode_head(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(self.version.as_str().as_bytes());
        out.push(b' ');
        out.extend_from_slice(self.status.code().to_string().as_bytes());
        out.push(b' ');
        out.extend_from_slice(self.status.reason_phrase().as_bytes());
        out.extend_from_slice(b"\r\n");
        self.headers.write_to(out);
        out.extend_from_slice(b"\r\n");
    }

    pub(crate) fn body(&mut self) -> &mut Body {
        &mut self.body
    }

    pub(crate) fn bytes_body(&self) -> Option<&[u8]> {
        match &self.body {
            Body::Bytes(b) => Some(b),
            Body::Stream(_) => None,
        }
    }
}

fn http_date_now() -> String {
    // RFC 7231 IMF-fixdate, computed without a chrono dependency: the
    // teacher's own dependency set has no date/time crate, and this value
    // is advisory (clients don't parse it for keep-alive logic), so a
    // hand-rolled civil calendar conversion from Unix time is enough.
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    format_http_date(secs)
}

fn format_http_date(secs: u64) -> String {
    const DAYS: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];
    const MONTHS: [&str; 12] = [
        "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
    ];

    let days_since_epoch = secs / 86400;
    let time_of_day = secs % 86400;
    let (hh, mm, ss) = (time_of_day / 3600, (time_of_day % 3600) / 60, time_of_day % 60);
    let weekday = DAYS[((days_since_epoch + 4) % 7) as usize];

    let (year, month, day) = civil_from_days(days_since_epoch as i64);
    format!(
        "{}, {:02} {} {} {:02}:{:02}:{:02} GMT",
        weekday, day, MONTHS[(month - 1) as usize], year, hh, mm, ss
    )
}

/// Howard Hinnant's `civil_from_days` algorithm, day-count-since-epoch to
/// (year, month, day).
fn civil_from_days(z: i64) -> (i64, i64, i64) {
    let z = z + 719468;
    let era = if z >= 0 { z } else { z - 146096 } / 146097;
    let doe = (z - era * 146097) as i64;
    let yoe = (doe - doe / 1460 + doe / 36524 - doe / 146096) / 365;
    let y = yoe + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = doy - (153 * mp + 2) / 5 + 1;
    let m = if mp < 10 { mp + 3 } else { mp - 9 };
    (if m <= 2 { y + 1 } else { y }, m, d)
}

/// `200 OK` with a raw byte body.
pub fn ok(body: impl Into<Vec<u8>>, resp: &mut Response) -> Handled {
    resp.status(StatusCode::Ok).body(body)
}

/// `200 OK`, `Content-Type: text/plain`.
pub fn text(body: impl Into<String>, resp: &mut Response) -> Handled {
    resp.status(StatusCode::Ok)
        .header("content-type", "text/plain; charset=utf-8")
        .body(body.into().into_bytes())
}

/// `200 OK`, `Content-Type: text/html`.
pub fn html(body: impl Into<String>, resp: &mut Response) -> Handled {
    resp.status(StatusCode::Ok)
        .header("content-type", "text/html; charset=utf-8")
        .body(body.into().into_bytes())
}

/// `200 OK`, `Content-Type: application/json`. `body` must already be
/// valid JSON text; callers building JSON from server data should go
/// through `serde_json` rather than hand-concatenating strings (see
/// `spec.md` §9's note on escaping gaps).
pub fn json(body: impl Into<String>, resp: &mut Response) -> Handled {
    resp.status(StatusCode::Ok)
        .header("content-type", "application/json")
        .body(body.into().into_bytes())
}

pub fn bad_request(msg: impl Into<String>, resp: &mut Response) -> Handled {
    resp.status(StatusCode::BadRequest).body(msg.into().into_bytes())
}

pub fn not_found(msg: impl Into<String>, resp: &mut Response) -> Handled {
    resp.status(StatusCode::NotFound).body(msg.into().into_bytes())
}

pub fn internal_server_error(msg: impl Into<String>, resp: &mut Response) -> Handled {
    resp.status(StatusCode::InternalServerError)
        .body(msg.into().into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finalize_sets_content_length_and_type() {
        let mut r = Response::new(Version::Http11);
        r.body(b"hello".to_vec());
        r.finalize(false, true);
        assert_eq!(r.headers().get("content-length"), Some("5"));
        assert!(r.headers().contains("content-type"));
        assert!(r.headers().contains("date"));
        assert_eq!(r.headers().get("connection"), Some("keep-alive"));
        assert!(r.keep_alive);
    }

    #[test]
    fn finalize_forces_close_on_error_status_when_configured() {
        let mut r = Response::new(Version::Http11);
        r.status(StatusCode::InternalServerError).body(Vec::new());
        r.finalize(false, true);
        assert_eq!(r.headers().get("connection"), Some("close"));
        assert!(!r.keep_alive);
    }

    #[test]
    fn finalize_respects_explicit_connection_header() {
        let mut r = Response::new(Version::Http11);
        r.header("connection", "close");
        r.body(Vec::new());
        r.finalize(false, false);
        assert_eq!(r.headers().get("connection"), Some("close"));
        assert!(!r.keep_alive);
    }

    #[test]
    fn http10_defaults_to_close() {
        let mut r = Response::new(Version::Http10);
        r.body(Vec::new());
        r.finalize(false, false);
        assert!(!r.keep_alive);
    }

    #[test]
    fn civil_date_matches_known_epoch_values() {
        assert_eq!(civil_from_days(0), (1970, 1, 1));
        assert_eq!(civil_from_days(19723), (2023, 12, 25));
    }
}
