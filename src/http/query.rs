//! URL query string parsing.
//!
//! The teacher's `Query` (`src/http/query.rs`) is a zero-copy,
//! no-percent-decoding parser returning borrowed byte slices. This crate's
//! [`crate::http::Request`] owns its data, so `Query::parse` here returns
//! owned, percent-decoded `(String, String)` pairs — using `urlencoding`
//! (already a dependency of `jagadeesh32-cello` in the example pack) for
//! the decode step the teacher explicitly left out ("no decoder support").
//! The order-preserving, repeated-key, empty-value-on-missing-`=` semantics
//! are otherwise identical to the teacher's.

/// Parses a query string (with or without a leading `?`) into an
/// order-preserving list of decoded `(name, value)` pairs.
pub fn parse(query: &str) -> Vec<(String, String)> {
    let query = query.strip_prefix('?').unwrap_or(query);
    if query.is_empty() {
        return Vec::new();
    }

    query
        .split('&')
        .map(|pair| match pair.split_once('=') {
            Some((name, value)) => (decode(name), decode(value)),
            None => (decode(pair), String::new()),
        })
        .collect()
}

fn decode(raw: &str) -> String {
    urlencoding::decode(raw)
        .map(|cow| cow.into_owned())
        .unwrap_or_else(|_| raw.to_string())
}

/// Order-preserving lookup helper mirroring [`crate::http::HeaderMap::get`]'s ergonomics.
pub fn find<'a>(pairs: &'a [(String, String)], name: &str) -> Option<&'a str> {
    pairs.iter().find(|(n, _)| n == name).map(|(_, v)| v.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_all_formats() {
        let pairs = parse("debug&name=&=Qwe&key=sda&&");
        assert_eq!(pairs.len(), 5);
        assert_eq!(pairs[0], ("debug".into(), "".into()));
        assert_eq!(pairs[1], ("name".into(), "".into()));
        assert_eq!(pairs[2], ("".into(), "Qwe".into()));
        assert_eq!(pairs[3], ("key".into(), "sda".into()));
    }

    #[test]
    fn decodes_percent_escapes() {
        let pairs = parse("q=hello%20world");
        assert_eq!(find(&pairs, "q"), Some("hello world"));
    }

    #[test]
    fn strips_leading_question_mark() {
        assert_eq!(parse("?a=1"), parse("a=1"));
    }
}
