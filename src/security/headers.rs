//! Header manipulation for forwarded requests and relayed responses.
//!
//! # Responsibilities
//! - Strip hop-by-hop headers in both directions
//! - Add X-Forwarded-Host, X-Forwarded-Proto, X-Forwarded-For
//! - Force the CORS allow-origin header on flagged routes
//! - Drop conditional and range headers from shared cache fills
//!
//! # Design Decisions
//! - X-Forwarded-Host and X-Forwarded-Proto are overwritten, never appended:
//!   the gateway is the authority on what it received
//! - X-Forwarded-For is appended so an upstream chain stays visible

use std::net::IpAddr;

use axum::http::header::{self, HeaderMap, HeaderName, HeaderValue};

use crate::config::Scheme;

pub const X_FORWARDED_HOST: HeaderName = HeaderName::from_static("x-forwarded-host");
pub const X_FORWARDED_PROTO: HeaderName = HeaderName::from_static("x-forwarded-proto");
pub const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");

const HOP_BY_HOP: [HeaderName; 8] = [
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

/// Headers that make a backend answer for one client only (304, 412, 206).
const VALIDATORS: [HeaderName; 6] = [
    header::IF_NONE_MATCH,
    header::IF_MODIFIED_SINCE,
    header::IF_MATCH,
    header::IF_UNMODIFIED_SINCE,
    header::IF_RANGE,
    header::RANGE,
];

/// Remove hop-by-hop headers, including any listed in `Connection`.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let listed: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();

    for name in listed.iter().chain(HOP_BY_HOP.iter()) {
        headers.remove(name);
    }
}

/// Remove conditional and range headers so a fill request asks for the
/// full representation.
pub fn strip_validators(headers: &mut HeaderMap) {
    for name in &VALIDATORS {
        headers.remove(name);
    }
}

/// Stamp forwarding metadata onto an outbound request.
pub fn set_forwarded_headers(
    headers: &mut HeaderMap,
    original_host: &HeaderValue,
    scheme: Scheme,
    client_ip: Option<IpAddr>,
) {
    headers.insert(X_FORWARDED_HOST, original_host.clone());
    headers.insert(X_FORWARDED_PROTO, HeaderValue::from_static(scheme.as_str()));

    if let Some(ip) = client_ip {
        let forwarded_for = match headers.get(&X_FORWARDED_FOR).and_then(|v| v.to_str().ok()) {
            Some(existing) if !existing.trim().is_empty() => format!("{}, {}", existing, ip),
            _ => ip.to_string(),
        };
        if let Ok(value) = HeaderValue::from_str(&forwarded_for) {
            headers.insert(X_FORWARDED_FOR, value);
        }
    }
}

/// Overwrite `access-control-allow-origin` with `*`.
pub fn apply_cors(headers: &mut HeaderMap) {
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
}
