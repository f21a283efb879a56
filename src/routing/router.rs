//! Route table construction and lookup.
//!
//! # Responsibilities
//! - Build the ordered route list for one instance
//! - Look up the route for a request
//! - Report "path known, wrong method" separately from "no such path"
//!
//! # Design Decisions
//! - Immutable after construction (shared via Arc, no locks)
//! - Payload routes come first, so a literal path wins over the generic
//!   wildcard routes it would otherwise also match
//! - Each entry owns its own copy of the file identifier
//! - Request paths are percent-decoded before matching, since payload
//!   paths are configured in their decoded form

use axum::http::Method;
use percent_encoding::percent_decode_str;

use crate::config::InstanceConfig;
use crate::routing::matcher::{clean_path, Matcher, MethodMatcher, PathPattern, RequestView};

/// Backend endpoint for agent messages.
pub const AGENT_MESSAGE_PATH: &str = "/agent_message";

/// Backend endpoint prefix for hosted files.
pub const FILE_DOWNLOAD_PREFIX: &str = "/direct/download/";

/// Where a matched request is forwarded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ForwardTarget {
    /// The generic agent message endpoint.
    AgentMessage,
    /// The file-fetch endpoint for one hosted file.
    FileDownload { file_id: String },
}

impl ForwardTarget {
    /// Path on the backend this target rewrites to.
    pub fn backend_path(&self) -> String {
        match self {
            ForwardTarget::AgentMessage => AGENT_MESSAGE_PATH.to_string(),
            ForwardTarget::FileDownload { file_id } => format!("{}{}", FILE_DOWNLOAD_PREFIX, file_id),
        }
    }
}

/// A compiled route: (method, path pattern) → target.
#[derive(Debug)]
pub struct RouteEntry {
    method: MethodMatcher,
    pattern: PathPattern,
    target: ForwardTarget,
}

impl RouteEntry {
    pub fn new(method: Method, pattern: PathPattern, target: ForwardTarget) -> Self {
        Self {
            method: MethodMatcher::new(method),
            pattern,
            target,
        }
    }

    pub fn method(&self) -> &Method {
        self.method.method()
    }

    pub fn pattern(&self) -> &PathPattern {
        &self.pattern
    }

    pub fn target(&self) -> &ForwardTarget {
        &self.target
    }
}

impl Matcher for RouteEntry {
    fn matches(&self, req: &RequestView<'_>) -> bool {
        self.pattern.matches(req) && self.method.matches(req)
    }
}

/// Result of a lookup.
#[derive(Debug)]
pub enum RouteMatch<'a> {
    Found(&'a RouteEntry),
    /// Some route has this path, none with this method.
    MethodNotAllowed(Vec<Method>),
    NotFound,
}

/// Ordered, immutable route list for one instance.
#[derive(Debug)]
pub struct RouteTable {
    entries: Vec<RouteEntry>,
}

impl RouteTable {
    /// Build the routes for an instance, most specific first.
    pub fn from_instance(config: &InstanceConfig) -> Self {
        let mut entries: Vec<RouteEntry> = config
            .payload_host_paths
            .iter()
            .map(|(path, file_id)| {
                RouteEntry::new(
                    Method::GET,
                    PathPattern::Exact(path.clone()),
                    ForwardTarget::FileDownload {
                        file_id: file_id.clone(),
                    },
                )
            })
            .collect();

        for pattern in [PathPattern::SegmentWithTail, PathPattern::Segment, PathPattern::Root] {
            for method in [Method::GET, Method::POST] {
                entries.push(RouteEntry::new(method, pattern.clone(), ForwardTarget::AgentMessage));
            }
        }

        if config.debug {
            for entry in &entries {
                tracing::info!(
                    method = %entry.method(),
                    route = %entry.pattern(),
                    backend_path = %entry.target().backend_path(),
                    "debug route"
                );
            }
        }

        Self { entries }
    }

    /// First matching route wins.
    pub fn match_request(&self, method: &Method, path: &str) -> RouteMatch<'_> {
        let decoded = percent_decode_str(path).decode_utf8_lossy();
        let path = clean_path(&decoded);
        let view = RequestView {
            method,
            path: &path,
        };

        if let Some(entry) = self.entries.iter().find(|e| e.matches(&view)) {
            return RouteMatch::Found(entry);
        }

        let mut allowed: Vec<Method> = Vec::new();
        for entry in self.entries.iter().filter(|e| e.pattern.matches(&view)) {
            if !allowed.contains(entry.method()) {
                allowed.push(entry.method().clone());
            }
        }

        if allowed.is_empty() {
            RouteMatch::NotFound
        } else {
            RouteMatch::MethodNotAllowed(allowed)
        }
    }

    pub fn entries(&self) -> &[RouteEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instance_with_payloads(payloads: &[(&str, &str)]) -> InstanceConfig {
        let mut config = InstanceConfig::plain(8080);
        for (path, id) in payloads {
            config.payload_host_paths.insert(path.to_string(), id.to_string());
        }
        config
    }

    fn target_for<'a>(table: &'a RouteTable, method: Method, path: &str) -> Option<&'a ForwardTarget> {
        match table.match_request(&method, path) {
            RouteMatch::Found(entry) => Some(entry.target()),
            _ => None,
        }
    }

    #[test]
    fn generic_routes_only() {
        let table = RouteTable::from_instance(&InstanceConfig::plain(8080));
        assert_eq!(table.len(), 6);

        for path in ["/", "/index", "/index/more/stuff"] {
            assert_eq!(target_for(&table, Method::GET, path), Some(&ForwardTarget::AgentMessage));
            assert_eq!(target_for(&table, Method::POST, path), Some(&ForwardTarget::AgentMessage));
        }
    }

    #[test]
    fn payload_route_wins_over_generic() {
        let table = RouteTable::from_instance(&instance_with_payloads(&[("/update.bin", "file-uuid-7")]));

        assert_eq!(
            target_for(&table, Method::GET, "/update.bin"),
            Some(&ForwardTarget::FileDownload {
                file_id: "file-uuid-7".into()
            })
        );
        // Payload routes are GET only.
        assert_eq!(
            target_for(&table, Method::POST, "/update.bin"),
            Some(&ForwardTarget::AgentMessage)
        );
    }

    #[test]
    fn encoded_request_path_matches_payload() {
        let table = RouteTable::from_instance(&instance_with_payloads(&[("/my file.exe", "uuid-1")]));

        assert_eq!(
            target_for(&table, Method::GET, "/my%20file.exe"),
            Some(&ForwardTarget::FileDownload {
                file_id: "uuid-1".into()
            })
        );
        assert_eq!(
            target_for(&table, Method::GET, "/my%20file.exe.bak"),
            Some(&ForwardTarget::AgentMessage)
        );
    }

    #[test]
    fn each_payload_keeps_its_own_identifier() {
        let table = RouteTable::from_instance(&instance_with_payloads(&[
            ("/a.bin", "id-a"),
            ("/b.bin", "id-b"),
            ("/nested/c.bin", "id-c"),
        ]));

        assert_eq!(table.len(), 9);
        for (path, id) in [("/a.bin", "id-a"), ("/b.bin", "id-b"), ("/nested/c.bin", "id-c")] {
            assert_eq!(
                target_for(&table, Method::GET, path).map(ForwardTarget::backend_path),
                Some(format!("/direct/download/{}", id))
            );
        }
    }

    #[test]
    fn root_payload_shadows_generic_root_get() {
        let table = RouteTable::from_instance(&instance_with_payloads(&[("/", "root-file")]));
        assert_eq!(
            target_for(&table, Method::GET, "/"),
            Some(&ForwardTarget::FileDownload {
                file_id: "root-file".into()
            })
        );
        assert_eq!(target_for(&table, Method::POST, "/"), Some(&ForwardTarget::AgentMessage));
    }

    #[test]
    fn wrong_method_is_reported() {
        let table = RouteTable::from_instance(&InstanceConfig::plain(8080));
        match table.match_request(&Method::PUT, "/index") {
            RouteMatch::MethodNotAllowed(allowed) => {
                assert_eq!(allowed, vec![Method::GET, Method::POST]);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn unmatched_path_is_not_found() {
        let table = RouteTable::from_instance(&InstanceConfig::plain(8080));
        assert!(matches!(table.match_request(&Method::GET, ""), RouteMatch::NotFound));
    }

    #[test]
    fn extra_slashes_are_cleaned() {
        let table = RouteTable::from_instance(&instance_with_payloads(&[("/update.bin", "id")]));
        assert_eq!(
            target_for(&table, Method::GET, "//update.bin"),
            Some(&ForwardTarget::FileDownload { file_id: "id".into() })
        );
    }
}
