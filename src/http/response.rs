//! Response handling and transformation.
//!
//! # Responsibilities
//! - Relay backend responses to the client without buffering
//! - Strip hop-by-hop headers on the way back
//! - Apply per-route header overrides (CORS)
//!
//! # Design Decisions
//! - Backend redirects are relayed as-is, never followed
//! - Status and body pass through untouched; only headers are edited

use axum::body::Body;
use axum::http::Response;
use hyper::body::Incoming;

use crate::routing::RouteTarget;
use crate::security::headers::{apply_cors, strip_hop_by_hop};

/// Convert a streamed backend response into a client response.
pub fn relay(response: Response<Incoming>) -> Response<Body> {
    let (mut parts, body) = response.into_parts();
    strip_hop_by_hop(&mut parts.headers);
    Response::from_parts(parts, Body::new(body))
}

/// Apply the matched route's response overrides.
pub fn finalize(mut response: Response<Body>, target: &RouteTarget) -> Response<Body> {
    if target.cors {
        apply_cors(response.headers_mut());
    }
    response
}
