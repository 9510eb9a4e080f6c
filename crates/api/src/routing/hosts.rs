//! Host header resolution

use axum::{
    extract::{Request, State},
    http::{header::HOST, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::sync::Arc;

/// Which configured host a request matched
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostMatch {
    /// The bare base domain
    BaseDomain,
    /// One of the allowed subdomains
    Subdomain(String),
}

/// Hosts this deployment answers for
#[derive(Debug, Clone)]
pub struct HostPolicy {
    base_domain: String,
    allowed_subdomains: Vec<String>,
}

impl HostPolicy {
    pub fn new(base_domain: &str, allowed_subdomains: &[String]) -> Self {
        Self {
            base_domain: normalize_host(base_domain),
            allowed_subdomains: allowed_subdomains.iter().map(|s| s.trim().to_lowercase()).collect(),
        }
    }

    /// Resolve a Host header value against the policy
    pub fn resolve(&self, host: &str) -> Result<HostMatch, HostResolveError> {
        let host = normalize_host(host);

        if host == self.base_domain {
            return Ok(HostMatch::BaseDomain);
        }

        let base_suffix = format!(".{}", self.base_domain);
        let Some(subdomain) = host.strip_suffix(&base_suffix) else {
            return Err(HostResolveError::ForeignDomain(host));
        };

        if self.allowed_subdomains.iter().any(|allowed| allowed == subdomain) {
            Ok(HostMatch::Subdomain(subdomain.to_string()))
        } else {
            Err(HostResolveError::UnknownSubdomain(subdomain.to_string()))
        }
    }
}

/// Normalize a host header value
fn normalize_host(host: &str) -> String {
    // Remove port if present
    let host = host.trim().split(':').next().unwrap_or(host);
    // Lowercase, without the trailing root dot
    host.trim_end_matches('.').to_lowercase()
}

/// Errors that can occur during host resolution
#[derive(Debug, thiserror::Error)]
pub enum HostResolveError {
    #[error("Missing Host header")]
    MissingHost,

    #[error("Unknown subdomain: {0}")]
    UnknownSubdomain(String),

    #[error("Host not served: {0}")]
    ForeignDomain(String),
}

impl IntoResponse for HostResolveError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": {
                "code": "NOT_FOUND",
                "message": "Resource not found",
            }
        }));

        (StatusCode::NOT_FOUND, body).into_response()
    }
}

/// Middleware that answers 404 for hosts outside the policy
pub async fn require_known_host(
    State(policy): State<Arc<HostPolicy>>,
    request: Request,
    next: Next,
) -> Response {
    let host = request
        .headers()
        .get(HOST)
        .and_then(|h| h.to_str().ok())
        .or_else(|| request.uri().host());

    let resolved = match host {
        Some(host) => policy.resolve(host),
        None => Err(HostResolveError::MissingHost),
    };

    match resolved {
        Ok(_) => next.run(request).await,
        Err(err) => {
            tracing::debug!(error = %err, path = %request.uri().path(), "Rejected request for unserved host");
            err.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> HostPolicy {
        HostPolicy::new("example.com", &["www".to_string(), "app".to_string()])
    }

    #[test]
    fn test_normalize_host() {
        assert_eq!(normalize_host("Example.COM"), "example.com");
        assert_eq!(normalize_host("example.com:8080"), "example.com");
        assert_eq!(normalize_host("EXAMPLE.COM.:443"), "example.com");
    }

    #[test]
    fn test_base_domain_and_allowed_subdomains() {
        let policy = policy();
        assert_eq!(policy.resolve("example.com").unwrap(), HostMatch::BaseDomain);
        assert_eq!(
            policy.resolve("WWW.example.com:443").unwrap(),
            HostMatch::Subdomain("www".to_string())
        );
        assert_eq!(
            policy.resolve("app.example.com").unwrap(),
            HostMatch::Subdomain("app".to_string())
        );
    }

    #[test]
    fn test_unknown_hosts_rejected() {
        let policy = policy();
        assert!(matches!(
            policy.resolve("api.example.com"),
            Err(HostResolveError::UnknownSubdomain(s)) if s == "api"
        ));
        assert!(matches!(
            policy.resolve("a.www.example.com"),
            Err(HostResolveError::UnknownSubdomain(_))
        ));
        assert!(matches!(
            policy.resolve("notexample.com"),
            Err(HostResolveError::ForeignDomain(_))
        ));
    }
}
