//! Per-request error taxonomy.
//!
//! Every variant is local to one request and maps to exactly one status code.
//! Errors are `Clone` so a single failed upstream fetch can be handed to every
//! request waiting on it.

use std::time::Duration;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    /// No Host header and no authority in the request target.
    #[error("request has no host")]
    MissingHost,

    #[error("no route for {host}{path}")]
    NoRouteMatch { host: String, path: String },

    #[error("upstream {backend} unreachable: {reason}")]
    UpstreamUnreachable { backend: String, reason: String },

    #[error("upstream {backend} timed out after {timeout:?}")]
    UpstreamTimeout { backend: String, timeout: Duration },

    /// Response body could not be read.
    #[error("upstream {backend} body failed: {reason}")]
    UpstreamBody { backend: String, reason: String },

    /// Response body is larger than a cache entry may be. The caller relays
    /// it directly instead.
    #[error("upstream {backend} body exceeds {limit} bytes")]
    UpstreamBodyTooLarge { backend: String, limit: usize },

    /// A shared upstream fetch ended without producing an outcome.
    #[error("internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::MissingHost => StatusCode::BAD_REQUEST,
            GatewayError::NoRouteMatch { .. } => StatusCode::NOT_FOUND,
            GatewayError::UpstreamUnreachable { .. }
            | GatewayError::UpstreamBody { .. }
            | GatewayError::UpstreamBodyTooLarge { .. } => StatusCode::BAD_GATEWAY,
            GatewayError::UpstreamTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            GatewayError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Short label used for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            GatewayError::MissingHost => "missing_host",
            GatewayError::NoRouteMatch { .. } => "no_route",
            GatewayError::UpstreamUnreachable { .. } => "unreachable",
            GatewayError::UpstreamTimeout { .. } => "timeout",
            GatewayError::UpstreamBody { .. } => "body",
            GatewayError::UpstreamBodyTooLarge { .. } => "body_too_large",
            GatewayError::Internal(_) => "internal",
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let body = match &self {
            GatewayError::MissingHost => "Missing Host header",
            GatewayError::NoRouteMatch { .. } => "No matching route found",
            GatewayError::UpstreamTimeout { .. } => "Upstream request timed out",
            GatewayError::UpstreamUnreachable { .. }
            | GatewayError::UpstreamBody { .. }
            | GatewayError::UpstreamBodyTooLarge { .. } => "Upstream request failed",
            GatewayError::Internal(_) => "Internal error",
        };
        (self.status(), body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let no_route = GatewayError::NoRouteMatch {
            host: "a".into(),
            path: "/".into(),
        };
        assert_eq!(no_route.status(), StatusCode::NOT_FOUND);

        let timeout = GatewayError::UpstreamTimeout {
            backend: "b:1".into(),
            timeout: Duration::from_secs(1),
        };
        assert_eq!(timeout.status(), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(timeout.into_response().status(), StatusCode::GATEWAY_TIMEOUT);

        let refused = GatewayError::UpstreamUnreachable {
            backend: "b:1".into(),
            reason: "connection refused".into(),
        };
        assert_eq!(refused.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(GatewayError::MissingHost.status(), StatusCode::BAD_REQUEST);
    }
}
