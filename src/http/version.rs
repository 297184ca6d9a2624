use crate::errors::RequestError;

/// HTTP protocol version.
///
/// Grounded on the teacher's `Version` enum (`src/http/types.rs`).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Version {
    Http10,
    Http11,
}

impl Version {
    pub(crate) fn from_bytes(src: &[u8]) -> Result<Self, RequestError> {
        match src {
            b"HTTP/1.1" => Ok(Version::Http11),
            b"HTTP/1.0" => Ok(Version::Http10),
            _ => Err(RequestError::BadVersion),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Version::Http10 => "HTTP/1.0",
            Version::Http11 => "HTTP/1.1",
        }
    }

    /// Whether this version defaults to persistent connections absent an
    /// explicit `Connection: close`, per `spec.md` §3.
    pub fn keep_alive_by_default(&self) -> bool {
        matches!(self, Version::Http11)
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
