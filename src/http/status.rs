//! HTTP status codes.
//!
//! Grounded on the teacher's `set_status_codes!` macro (`src/http/types.rs`),
//! narrowed to the codes this platform actually emits (the benchmark-facing
//! surface, routing misses, and handler errors) plus common codes a
//! `ConnectionFilter`-style consumer might want. The macro produces the
//! numeric code and reason phrase; unlike the teacher, this crate is not
//! zero-copy so the first-line bytes are assembled at write time instead of
//! baked in as `&'static [u8]` per status/version pair.
macro_rules! status_codes {
    ($(
        $(#[$docs:meta])*
        $name:ident = ($num:expr, $str:expr);
    )+) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum StatusCode { $(
            $(#[$docs])*
            $name,
        )+ }

        impl StatusCode {
            pub fn code(&self) -> u16 {
                match self { $( StatusCode::$name => $num, )+ }
            }

            pub fn reason_phrase(&self) -> &'static str {
                match self { $( StatusCode::$name => $str, )+ }
            }
        }
    }
}

status_codes! {
    Ok = (200, "OK");
    NoContent = (204, "No Content");
    MovedPermanently = (301, "Moved Permanently");
    BadRequest = (400, "Bad Request");
    Unauthorized = (401, "Unauthorized");
    Forbidden = (403, "Forbidden");
    NotFound = (404, "Not Found");
    MethodNotAllowed = (405, "Method Not Allowed");
    RequestTimeout = (408, "Request Timeout");
    PayloadTooLarge = (413, "Payload Too Large");
    TooManyRequests = (429, "Too Many Requests");
    InternalServerError = (500, "Internal Server Error");
    NotImplemented = (501, "Not Implemented");
    ServiceUnavailable = (503, "Service Unavailable");
}

impl StatusCode {
    /// Whether a response with this status forces `Connection: close` when
    /// the pipeline is configured to do so for error responses (`spec.md` §3).
    pub fn is_error(&self) -> bool {
        self.code() >= 400
    }
}

impl std::fmt::Display for StatusCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.code(), self.reason_phrase())
    }
}
