//! Parsed request-target representation.
//!
//! Grounded on the teacher's `Url` (`src/http/types.rs`): path, raw query
//! string, and `/`-split segments, reworked to own its data.

use crate::http::query;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Url {
    /// The full request target, e.g. `/api/users/123?sort=name`.
    target: String,
    /// Byte offset of `?` in `target`, if any.
    query_start: Option<usize>,
}

impl Url {
    pub(crate) fn parse(target: &str) -> Self {
        let query_start = target.find('?');
        Url {
            target: target.to_string(),
            query_start,
        }
    }

    /// Full request target including the query string.
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Path component only, without the query string.
    pub fn path(&self) -> &str {
        match self.query_start {
            Some(idx) => &self.target[..idx],
            None => &self.target,
        }
    }

    /// Raw query string, without the leading `?`. Empty if absent.
    pub fn raw_query(&self) -> &str {
        match self.query_start {
            Some(idx) => &self.target[idx + 1..],
            None => "",
        }
    }

    /// `/`-delimited path segments, skipping empty segments from a leading
    /// or trailing `/` (so `/a/b/` yields `["a", "b"]`).
    pub fn segments(&self) -> Vec<&str> {
        self.path().split('/').filter(|s| !s.is_empty()).collect()
    }

    /// Decoded query parameters, in order, duplicates preserved.
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        query::parse(self.raw_query())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_path_and_query() {
        let url = Url::parse("/api/users/123?sort=name&debug");
        assert_eq!(url.path(), "/api/users/123");
        assert_eq!(url.raw_query(), "sort=name&debug");
        assert_eq!(url.segments(), vec!["api", "users", "123"]);
    }

    #[test]
    fn handles_no_query() {
        let url = Url::parse("/hello");
        assert_eq!(url.path(), "/hello");
        assert_eq!(url.raw_query(), "");
        assert!(url.query_pairs().is_empty());
    }
}
