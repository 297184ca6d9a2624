//! Route pattern compilation and segment matching.
//!
//! `spec.md` §3: "Compiled pattern: either exact, prefix-wildcard (`"/p/*"`),
//! parameterised (`"/users/{id}"`), or total wildcard (`"/*"`)." This module
//! has no direct teacher analogue (the teacher is a single-handler server
//! with no router); it is grounded structurally on the priority-ordered
//! matching `spec.md` §4.1 specifies.

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pattern {
    /// A literal path with no wildcards or captures, e.g. `/health`.
    Exact(String),
    /// A path with one or more `{name}` captures, e.g. `/users/{id}`.
    Param(Vec<Segment>),
    /// A literal prefix followed by `*`, e.g. `/p/*`.
    Prefix(String),
    /// The `/*` total wildcard.
    Wildcard,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Literal(String),
    Capture(String),
}

impl Pattern {
    /// Compiles a route specification string into a [`Pattern`].
    pub fn compile(spec: &str) -> Pattern {
        if spec == "/*" {
            return Pattern::Wildcard;
        }
        if let Some(prefix) = spec.strip_suffix("/*") {
            return Pattern::Prefix(prefix.to_string());
        }
        if spec.contains('{') {
            let segments = spec
                .split('/')
                .filter(|s| !s.is_empty())
                .map(|s| {
                    if let Some(name) = s.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
                        Segment::Capture(name.to_string())
                    } else {
                        Segment::Literal(s.to_string())
                    }
                })
                .collect();
            return Pattern::Param(segments);
        }
        Pattern::Exact(spec.to_string())
    }

    /// Attempts to match `path` against this pattern, returning captured
    /// `(name, value)` pairs for [`Pattern::Param`] patterns.
    pub fn matches(&self, path: &str) -> Option<Vec<(String, String)>> {
        match self {
            Pattern::Exact(p) => (p == path).then(Vec::new),
            Pattern::Wildcard => Some(Vec::new()),
            Pattern::Prefix(prefix) => path.starts_with(prefix.as_str()).then(Vec::new),
            Pattern::Param(segments) => {
                let path_segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
                if path_segments.len() != segments.len() {
                    return None;
                }
                let mut captures = Vec::new();
                for (seg, value) in segments.iter().zip(path_segments.iter()) {
                    match seg {
                        Segment::Literal(lit) if lit == value => {}
                        Segment::Literal(_) => return None,
                        Segment::Capture(name) => captures.push((name.clone(), value.to_string())),
                    }
                }
                Some(captures)
            }
        }
    }

    /// Length used to break ties among same-kind patterns (longest prefix
    /// wins among [`Pattern::Prefix`] entries, per `spec.md` §4.1).
    pub fn specificity(&self) -> usize {
        match self {
            Pattern::Exact(p) => p.len(),
            Pattern::Param(segments) => segments.len(),
            Pattern::Prefix(p) => p.len(),
            Pattern::Wildcard => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compiles_exact() {
        assert_eq!(Pattern::compile("/health"), Pattern::Exact("/health".into()));
    }

    #[test]
    fn compiles_param() {
        let p = Pattern::compile("/users/{id}");
        assert_eq!(
            p,
            Pattern::Param(vec![
                Segment::Literal("users".into()),
                Segment::Capture("id".into())
            ])
        );
        assert_eq!(p.matches("/users/42"), Some(vec![("id".into(), "42".into())]));
        assert_eq!(p.matches("/users/42/extra"), None);
    }

    #[test]
    fn compiles_prefix_and_wildcard() {
        assert_eq!(Pattern::compile("/p/*"), Pattern::Prefix("/p/".into()));
        assert!(Pattern::compile("/p/*").matches("/p/anything/deep").is_some());
        assert_eq!(Pattern::compile("/*"), Pattern::Wildcard);
        assert!(Pattern::compile("/*").matches("/literally/anything").is_some());
    }
}
