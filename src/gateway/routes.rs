// Gateway route table: public paths mapped onto service paths.
//
// Patterns use `{name}` for one segment and a trailing `{*rest}` for the remainder
// (zero or more segments).

use axum::http::Method;
use std::collections::HashMap;

use crate::types::ServiceKind;

#[derive(Debug, Clone)]
pub struct RouteEntry {
    /// `None` matches any method
    pub method: Option<Method>,
    pub pattern: &'static str,
    pub service: ServiceKind,
    pub target: &'static str,
    /// Method sent upstream when it differs from the incoming one
    pub upstream_method: Option<Method>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteMatch {
    pub service: ServiceKind,
    pub method: Method,
    pub path: String,
}

#[derive(Debug, Clone)]
pub struct RouteTable {
    entries: Vec<RouteEntry>,
}

fn entry(method: Method, pattern: &'static str, service: ServiceKind, target: &'static str) -> RouteEntry {
    RouteEntry {
        method: Some(method),
        pattern,
        service,
        target,
        upstream_method: None,
    }
}

fn rewritten(
    method: Method,
    pattern: &'static str,
    service: ServiceKind,
    target: &'static str,
    upstream: Method,
) -> RouteEntry {
    RouteEntry {
        upstream_method: Some(upstream),
        ..entry(method, pattern, service, target)
    }
}

fn prefix(pattern: &'static str, service: ServiceKind, target: &'static str) -> RouteEntry {
    RouteEntry {
        method: None,
        pattern,
        service,
        target,
        upstream_method: None,
    }
}

impl RouteTable {
    pub fn new(entries: Vec<RouteEntry>) -> Self {
        Self { entries }
    }

    /// Legacy flat routes followed by the `/api/{service}/...` prefixes.
    pub fn standard() -> Self {
        use ServiceKind::*;

        Self::new(vec![
            // Account
            entry(Method::POST, "/login", Account, "/auth/login"),
            entry(Method::POST, "/register", Account, "/auth/register"),
            entry(Method::GET, "/me", Account, "/auth/me"),
            entry(Method::GET, "/users/{id}", Account, "/users/{id}"),
            // Groups
            entry(Method::POST, "/create/group", Groups, "/groups"),
            entry(Method::GET, "/list/groups", Groups, "/groups"),
            entry(Method::GET, "/read/group/{id}", Groups, "/groups/{id}"),
            entry(Method::PUT, "/update/group/{id}", Groups, "/groups/{id}"),
            entry(Method::DELETE, "/delete/group/{id}", Groups, "/groups/{id}"),
            // Projects
            entry(Method::POST, "/create/project", Projects, "/projects"),
            entry(Method::GET, "/list/projects", Projects, "/projects"),
            entry(Method::GET, "/read/project/{id}", Projects, "/projects/{id}"),
            entry(Method::PUT, "/update/project/{id}", Projects, "/projects/{id}"),
            entry(Method::DELETE, "/delete/project/{id}", Projects, "/projects/{id}"),
            // Files and folders
            entry(Method::POST, "/create/file/{pid}", Files, "/projects/{pid}/files"),
            entry(Method::GET, "/list/files/{pid}", Files, "/projects/{pid}/files"),
            entry(Method::GET, "/read/file/{id}", Files, "/files/{id}"),
            rewritten(Method::PUT, "/update/file/{id}", Files, "/files/{id}", Method::PATCH),
            entry(Method::DELETE, "/delete/file/{id}", Files, "/files/{id}"),
            entry(Method::POST, "/create/folder/{pid}", Files, "/projects/{pid}/folders"),
            entry(Method::GET, "/list/folders/{pid}", Files, "/projects/{pid}/folders"),
            rewritten(
                Method::PUT,
                "/update/project/{pid}/folder/{fid}",
                Files,
                "/projects/{pid}/folders/{fid}",
                Method::PATCH,
            ),
            entry(
                Method::DELETE,
                "/delete/folder/project/{pid}/folder/{fid}",
                Files,
                "/projects/{pid}/folders/{fid}",
            ),
            // Prefixes
            prefix("/api/account/{*rest}", Account, "/{rest}"),
            prefix("/api/groups/{*rest}", Groups, "/groups/{rest}"),
            prefix("/api/projects/{*rest}", Projects, "/projects/{rest}"),
            prefix("/api/files/{*rest}", Files, "/{rest}"),
            prefix("/api/process/{*rest}", Process, "/process/{rest}"),
        ])
    }

    /// First matching entry wins. Service-internal paths never resolve.
    pub fn resolve(&self, method: &Method, path: &str) -> Option<RouteMatch> {
        if has_dot_segment(path) {
            return None;
        }
        self.entries.iter().find_map(|entry| {
            if entry.method.as_ref().is_some_and(|m| m != method) {
                return None;
            }
            let params = match_pattern(entry.pattern, path)?;
            let path = render(entry.target, &params);
            if is_internal(&path) {
                return None;
            }
            Some(RouteMatch {
                service: entry.service,
                method: entry.upstream_method.clone().unwrap_or_else(|| method.clone()),
                path,
            })
        })
    }
}

pub fn is_internal(path: &str) -> bool {
    path == "/internal" || path.starts_with("/internal/")
}

/// `.` and `..` segments, plain or percent-encoded, would be collapsed by the
/// upstream URL parser and could climb out of the routed prefix.
pub fn has_dot_segment(path: &str) -> bool {
    path.split('/').any(|segment| {
        let decoded = segment.to_ascii_lowercase().replace("%2e", ".");
        decoded == "." || decoded == ".."
    })
}

fn segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

fn match_pattern(pattern: &str, path: &str) -> Option<HashMap<String, String>> {
    let pattern_segments = segments(pattern);
    let path_segments = segments(path);
    let mut params = HashMap::new();

    for (i, expected) in pattern_segments.iter().enumerate() {
        if let Some(name) = expected.strip_prefix("{*").and_then(|s| s.strip_suffix('}')) {
            params.insert(name.to_string(), path_segments.get(i..).unwrap_or_default().join("/"));
            return Some(params);
        }

        let actual = path_segments.get(i)?;
        match expected.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
            Some(name) => {
                params.insert(name.to_string(), (*actual).to_string());
            }
            None if expected == actual => {}
            None => return None,
        }
    }

    (pattern_segments.len() == path_segments.len()).then_some(params)
}

fn render(template: &str, params: &HashMap<String, String>) -> String {
    let mut rendered = template.to_string();
    for (name, value) in params {
        rendered = rendered.replace(&format!("{{{}}}", name), value);
    }
    if rendered.len() > 1 {
        let trimmed = rendered.trim_end_matches('/');
        if trimmed.is_empty() {
            return "/".to_string();
        }
        return trimmed.to_string();
    }
    rendered
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolve(method: Method, path: &str) -> Option<RouteMatch> {
        RouteTable::standard().resolve(&method, path)
    }

    #[test]
    fn legacy_routes_map_onto_service_paths() {
        let m = resolve(Method::POST, "/login").unwrap();
        assert_eq!((m.service, m.path.as_str()), (ServiceKind::Account, "/auth/login"));

        let m = resolve(Method::GET, "/read/group/42").unwrap();
        assert_eq!((m.service, m.path.as_str()), (ServiceKind::Groups, "/groups/42"));

        let m = resolve(Method::DELETE, "/delete/folder/project/3/folder/9").unwrap();
        assert_eq!((m.service, m.path.as_str()), (ServiceKind::Files, "/projects/3/folders/9"));
    }

    #[test]
    fn method_must_match() {
        assert!(resolve(Method::GET, "/login").is_none());
        assert!(resolve(Method::POST, "/read/group/1").is_none());
    }

    #[test]
    fn legacy_updates_become_patch_where_needed() {
        let m = resolve(Method::PUT, "/update/file/5").unwrap();
        assert_eq!(m.method, Method::PATCH);
        assert_eq!(m.path, "/files/5");

        let m = resolve(Method::PUT, "/update/project/5").unwrap();
        assert_eq!(m.method, Method::PUT);
    }

    #[test]
    fn prefix_routes_keep_the_rest() {
        let m = resolve(Method::GET, "/api/groups/7/members").unwrap();
        assert_eq!((m.service, m.path.as_str()), (ServiceKind::Groups, "/groups/7/members"));

        let m = resolve(Method::GET, "/api/groups").unwrap();
        assert_eq!(m.path, "/groups");

        let m = resolve(Method::POST, "/api/account/auth/login").unwrap();
        assert_eq!((m.service, m.path.as_str()), (ServiceKind::Account, "/auth/login"));

        let m = resolve(Method::GET, "/api/process/todos/3").unwrap();
        assert_eq!(m.path, "/process/todos/3");
    }

    #[test]
    fn internal_paths_are_never_exposed() {
        assert!(resolve(Method::GET, "/api/account/internal/users/1").is_none());
        assert!(resolve(Method::GET, "/api/files/internal").is_none());
        assert!(resolve(Method::GET, "/internal/users/1").is_none());
    }

    #[test]
    fn dot_segments_never_resolve() {
        for path in [
            "/api/groups/../internal/groups/stats",
            "/api/account/./internal/users/1",
            "/api/account/%2e%2e/internal/users/1",
            "/api/files/%2E./internal",
            "/read/group/..",
        ] {
            assert!(resolve(Method::GET, path).is_none(), "{} resolved", path);
        }
        assert!(resolve(Method::GET, "/api/files/files/1/content.v2").is_some());
    }

    #[test]
    fn unknown_paths_do_not_match() {
        assert!(resolve(Method::GET, "/nothing/here").is_none());
        assert!(resolve(Method::GET, "/read/group").is_none());
        assert!(resolve(Method::GET, "/read/group/1/extra").is_none());
    }
}
