//! Route matching logic.
//!
//! # Responsibilities
//! - Match the request path against a route's pattern
//! - Match the request method
//!
//! # Design Decisions
//! - Paths are cleaned (repeated slashes collapsed) before matching
//! - Path matching is case-sensitive
//! - No regex; every pattern is a literal or a segment shape

use std::borrow::Cow;

use axum::http::Method;

/// What a matcher looks at.
#[derive(Debug, Clone, Copy)]
pub struct RequestView<'a> {
    pub method: &'a Method,
    pub path: &'a str,
}

/// Trait for matching requests against conditions.
pub trait Matcher: Send + Sync + std::fmt::Debug {
    /// Returns true if the request matches this condition.
    fn matches(&self, req: &RequestView<'_>) -> bool;
}

/// Shape of a route path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathPattern {
    /// A literal path, e.g. a hosted payload.
    Exact(String),
    /// `/`
    Root,
    /// `/:segment`
    Segment,
    /// `/:segment/*rest`
    SegmentWithTail,
}

impl PathPattern {
    pub fn is_match(&self, path: &str) -> bool {
        match self {
            PathPattern::Exact(expected) => path == expected,
            PathPattern::Root => path == "/",
            PathPattern::Segment => match path.strip_prefix('/') {
                Some(rest) => !rest.is_empty() && !rest.contains('/'),
                None => false,
            },
            PathPattern::SegmentWithTail => match path.strip_prefix('/') {
                Some(rest) => matches!(rest.find('/'), Some(i) if i > 0),
                None => false,
            },
        }
    }
}

impl std::fmt::Display for PathPattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PathPattern::Exact(path) => f.write_str(path),
            PathPattern::Root => f.write_str("/"),
            PathPattern::Segment => f.write_str("/:val"),
            PathPattern::SegmentWithTail => f.write_str("/:val/*action"),
        }
    }
}

impl Matcher for PathPattern {
    fn matches(&self, req: &RequestView<'_>) -> bool {
        self.is_match(req.path)
    }
}

/// Matches the request method.
#[derive(Debug, Clone)]
pub struct MethodMatcher {
    method: Method,
}

impl MethodMatcher {
    pub fn new(method: Method) -> Self {
        Self { method }
    }

    pub fn method(&self) -> &Method {
        &self.method
    }
}

impl Matcher for MethodMatcher {
    fn matches(&self, req: &RequestView<'_>) -> bool {
        *req.method == self.method
    }
}

/// Collapse runs of `/` so `//a///b` routes like `/a/b`.
pub fn clean_path(path: &str) -> Cow<'_, str> {
    if !path.contains("//") {
        return Cow::Borrowed(path);
    }
    let mut cleaned = String::with_capacity(path.len());
    let mut previous_slash = false;
    for c in path.chars() {
        if c == '/' {
            if previous_slash {
                continue;
            }
            previous_slash = true;
        } else {
            previous_slash = false;
        }
        cleaned.push(c);
    }
    Cow::Owned(cleaned)
}
