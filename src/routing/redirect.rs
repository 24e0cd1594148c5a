//! Canonical scheme/host enforcement.
//!
//! Runs before routing. A request either passes on to the router or is
//! answered here with `301 Moved Permanently`; no backend is contacted.

use axum::body::Body;
use axum::http::{header, HeaderValue, Response, StatusCode};

use crate::config::Scheme;
use crate::routing::matcher::RequestPath;
use crate::routing::table::{RedirectRule, RuleTable};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RedirectDecision {
    Pass,
    Redirect { location: String },
}

/// Decide whether a request must be redirected; `host` must be normalized.
pub fn enforce(
    table: &RuleTable,
    host: &str,
    scheme: Scheme,
    path: &RequestPath<'_>,
    query: Option<&str>,
) -> RedirectDecision {
    match table.lookup_redirect(host, scheme, path) {
        Some(rule) => RedirectDecision::Redirect {
            location: location(rule, path.raw(), query),
        },
        None => RedirectDecision::Pass,
    }
}

/// `target_scheme://target_host` followed by the path and query exactly as received.
pub fn location(rule: &RedirectRule, raw_path: &str, query: Option<&str>) -> String {
    let mut location = format!("{}://{}", rule.target_scheme, rule.target_host);
    if rule.preserve_path {
        location.push_str(raw_path);
        if let Some(query) = query {
            location.push('?');
            location.push_str(query);
        }
    }
    location
}

/// Build the 301 response. Control characters, which a header value cannot
/// carry, are percent-escaped; everything else is sent as received.
pub fn redirect_response(location: &str) -> Response<Body> {
    let value = HeaderValue::from_str(location).unwrap_or_else(|_| {
        let escaped: String = location
            .bytes()
            .map(|b| {
                if b.is_ascii_graphic() {
                    (b as char).to_string()
                } else {
                    format!("%{:02X}", b)
                }
            })
            .collect();
        HeaderValue::from_str(&escaped).unwrap_or_else(|_| HeaderValue::from_static("/"))
    });

    let mut response = Response::new(Body::empty());
    *response.status_mut() = StatusCode::MOVED_PERMANENTLY;
    response.headers_mut().insert(header::LOCATION, value);
    response
}
