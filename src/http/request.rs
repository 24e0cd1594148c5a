//! Request handling and transformation.
//!
//! # Responsibilities
//! - Generate unique request ID (UUID v4)
//! - Determine the scheme the client used (from `x-forwarded-proto`)
//! - Extract routing-relevant information (host, path, query)
//! - Hold the rest of the request for forwarding to a backend
//! - Derive the neutral request used to fill a shared cache entry
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing
//! - The path is kept exactly as received; decoding happens only for matching
//! - Original Host preserved for `x-forwarded-host`; the outbound Host is rewritten

use std::net::SocketAddr;

use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, Method, Request};
use tower_http::request_id::{MakeRequestId, RequestId};
use uuid::Uuid;

use crate::cache::CacheKey;
use crate::config::Scheme;
use crate::error::GatewayError;
use crate::routing::{normalize_host, RequestPath};
use crate::security::headers::{strip_validators, X_FORWARDED_PROTO};

pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Generates a fresh UUID v4 for requests that arrive without an id.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidRequestId;

impl MakeRequestId for UuidRequestId {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        HeaderValue::from_str(&Uuid::new_v4().to_string())
            .ok()
            .map(RequestId::new)
    }
}

/// Scheme the client used to reach the edge. Only the first hop counts.
pub fn client_scheme(headers: &HeaderMap) -> Scheme {
    let first = headers
        .get(X_FORWARDED_PROTO)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim);

    match first {
        Some(proto) if proto.eq_ignore_ascii_case("https") => Scheme::Https,
        _ => Scheme::Http,
    }
}

/// An incoming request, decomposed for the gateway pipeline.
#[derive(Debug)]
pub struct RequestContext {
    pub request_id: String,
    pub method: Method,
    pub scheme: Scheme,
    /// Host as the client sent it, port included.
    pub original_host: HeaderValue,
    /// Lowercased host without port, used for rule lookup.
    pub host: String,
    /// Raw path, escapes preserved.
    pub path: String,
    pub query: Option<String>,
    pub headers: HeaderMap,
    pub body: Body,
    pub client_addr: Option<SocketAddr>,
}

impl RequestContext {
    pub fn from_request(request: Request<Body>) -> Result<Self, GatewayError> {
        let client_addr = request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);

        let (parts, body) = request.into_parts();

        let original_host = match parts.headers.get(header::HOST) {
            Some(host) => host.clone(),
            None => parts
                .uri
                .authority()
                .and_then(|a| HeaderValue::from_str(a.as_str()).ok())
                .ok_or(GatewayError::MissingHost)?,
        };
        let host = original_host
            .to_str()
            .map(normalize_host)
            .map_err(|_| GatewayError::MissingHost)?;
        if host.is_empty() {
            return Err(GatewayError::MissingHost);
        }

        let request_id = parts
            .headers
            .get(X_REQUEST_ID)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("unknown")
            .to_string();

        Ok(Self {
            request_id,
            method: parts.method,
            scheme: client_scheme(&parts.headers),
            original_host,
            host,
            path: parts.uri.path().to_string(),
            query: parts.uri.query().map(str::to_string),
            headers: parts.headers,
            body,
            client_addr,
        })
    }

    pub fn request_path(&self) -> RequestPath<'_> {
        RequestPath::new(&self.path)
    }

    pub fn cache_key(&self) -> CacheKey {
        CacheKey::new(self.scheme, &self.host, &self.path, self.query.as_deref())
    }

    /// The request sent upstream to populate a cache entry on behalf of every
    /// caller of this key: same target, no body, no conditional or range
    /// headers. The original context stays with its caller.
    pub fn fill_request(&self) -> RequestContext {
        let mut headers = self.headers.clone();
        strip_validators(&mut headers);

        RequestContext {
            request_id: self.request_id.clone(),
            method: self.method.clone(),
            scheme: self.scheme,
            original_host: self.original_host.clone(),
            host: self.host.clone(),
            path: self.path.clone(),
            query: self.query.clone(),
            headers,
            body: Body::empty(),
            client_addr: self.client_addr,
        }
    }
}
