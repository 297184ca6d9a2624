//! HTTP/1.1 data model and byte-level parser (component C1's data types).

pub mod headers;
pub mod method;
pub mod parse;
pub mod query;
pub mod request;
pub mod response;
pub mod status;
pub mod url;
pub mod version;

pub use headers::HeaderMap;
pub use method::Method;
pub use request::{Attribute, Request};
pub use response::{Body, Handled, Response};
pub use status::StatusCode;
pub use url::Url;
pub use version::Version;
