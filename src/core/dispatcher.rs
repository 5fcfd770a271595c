//! Request-to-target resolution.
//!
//! The first path segment names the service, the rest of the path is appended
//! to the service's base address. Resolution happens entirely against the
//! published [`RouteTable`] and never touches the network.
use std::sync::Arc;

use hyper::Uri;

use crate::core::{GatewayError, RouteTable};

/// A path split into service name and remainder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedPath<'a> {
    pub service: &'a str,
    /// Everything after the first separator, without the separator; may be empty
    pub remainder: &'a str,
}

/// Split `/{service}[/{rest...}]` into its parts.
///
/// Exactly one leading `/` is stripped, so `//users` has an empty service name.
pub fn resolve(path: &str) -> Result<ResolvedPath<'_>, GatewayError> {
    let trimmed = path.strip_prefix('/').unwrap_or(path);
    let (service, remainder) = trimmed.split_once('/').unwrap_or((trimmed, ""));

    if service.is_empty() {
        return Err(GatewayError::BadRequest(format!(
            "no service name in path '{path}'"
        )));
    }

    Ok(ResolvedPath { service, remainder })
}

/// Join a base address, a path remainder and an optional query.
pub fn build_target(base: &str, remainder: &str, query: Option<&str>) -> String {
    let mut target = if remainder.is_empty() {
        base.to_string()
    } else {
        format!("{}/{}", base.trim_end_matches('/'), remainder)
    };

    if let Some(query) = query.filter(|q| !q.is_empty()) {
        target.push(if target.contains('?') { '&' } else { '?' });
        target.push_str(query);
    }

    target
}

/// Outcome of a successful dispatch.
#[derive(Debug, Clone)]
pub struct Dispatch {
    pub service: String,
    pub target: Uri,
}

/// Resolves inbound URIs to downstream targets using the live route table.
#[derive(Clone)]
pub struct Dispatcher {
    routes: Arc<RouteTable>,
    preserve_query: bool,
}

impl Dispatcher {
    pub fn new(routes: Arc<RouteTable>, preserve_query: bool) -> Self {
        Self {
            routes,
            preserve_query,
        }
    }

    /// Resolve an inbound URI to the downstream URI it should be forwarded to.
    pub fn dispatch(&self, uri: &Uri) -> Result<Dispatch, GatewayError> {
        let ResolvedPath { service, remainder } = resolve(uri.path())?;

        let base = self
            .routes
            .lookup(service)
            .ok_or_else(|| GatewayError::RouteNotFound(service.to_string()))?;

        let query = if self.preserve_query { uri.query() } else { None };
        let target = build_target(&base, remainder, query);

        let invalid = || GatewayError::InvalidTarget {
            service: service.to_string(),
            target: target.clone(),
        };
        let parsed: Uri = target.parse().map_err(|_| invalid())?;
        match parsed.scheme_str() {
            Some("http") | Some("https") if parsed.authority().is_some() => {}
            _ => return Err(invalid()),
        }

        Ok(Dispatch {
            service: service.to_string(),
            target: parsed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ServiceRecord;

    fn dispatcher(preserve_query: bool) -> Dispatcher {
        let routes = Arc::new(RouteTable::new());
        routes.publish(vec![
            ServiceRecord::new("users", "http://users:8080"),
            ServiceRecord::new("orders", "http://orders:9000/api/"),
            ServiceRecord::new("broken", "not a url"),
        ]);
        Dispatcher::new(routes, preserve_query)
    }

    #[test]
    fn test_resolve_splits_on_first_separator() {
        let resolved = resolve("/foo/bar/baz").unwrap();
        assert_eq!(resolved.service, "foo");
        assert_eq!(resolved.remainder, "bar/baz");
    }

    #[test]
    fn test_resolve_service_only() {
        let resolved = resolve("/foo").unwrap();
        assert_eq!(resolved.service, "foo");
        assert_eq!(resolved.remainder, "");

        let resolved = resolve("/foo/").unwrap();
        assert_eq!(resolved.service, "foo");
        assert_eq!(resolved.remainder, "");
    }

    #[test]
    fn test_resolve_rejects_missing_service() {
        assert!(matches!(resolve("/"), Err(GatewayError::BadRequest(_))));
        assert!(matches!(resolve(""), Err(GatewayError::BadRequest(_))));
        assert!(matches!(resolve("//foo"), Err(GatewayError::BadRequest(_))));
    }

    #[test]
    fn test_build_target() {
        assert_eq!(build_target("http://a:1", "", None), "http://a:1");
        assert_eq!(build_target("http://a:1/", "", None), "http://a:1/");
        assert_eq!(build_target("http://a:1/", "x/y", None), "http://a:1/x/y");
        assert_eq!(build_target("http://a:1//", "x", None), "http://a:1/x");
        assert_eq!(
            build_target("http://a:1", "x", Some("q=1&r=2")),
            "http://a:1/x?q=1&r=2"
        );
        assert_eq!(build_target("http://a:1", "x", Some("")), "http://a:1/x");
    }

    #[test]
    fn test_dispatch_builds_target() {
        let dispatch = dispatcher(true)
            .dispatch(&"/orders/v1/items?page=2".parse().unwrap())
            .unwrap();
        assert_eq!(dispatch.service, "orders");
        assert_eq!(
            dispatch.target.to_string(),
            "http://orders:9000/api/v1/items?page=2"
        );
    }

    #[test]
    fn test_dispatch_without_remainder_uses_base() {
        let dispatch = dispatcher(true)
            .dispatch(&"/users".parse().unwrap())
            .unwrap();
        assert_eq!(dispatch.target, "http://users:8080");
    }

    #[test]
    fn test_dispatch_can_drop_query() {
        let dispatch = dispatcher(false)
            .dispatch(&"/users/me?token=abc".parse().unwrap())
            .unwrap();
        assert_eq!(dispatch.target.to_string(), "http://users:8080/me");
    }

    #[test]
    fn test_dispatch_unknown_service() {
        let err = dispatcher(true)
            .dispatch(&"/payments/charge".parse().unwrap())
            .unwrap_err();
        assert!(matches!(err, GatewayError::RouteNotFound(name) if name == "payments"));
    }

    #[test]
    fn test_dispatch_invalid_target() {
        let err = dispatcher(true)
            .dispatch(&"/broken/x".parse().unwrap())
            .unwrap_err();
        assert!(matches!(err, GatewayError::InvalidTarget { .. }));
    }
}
