//! Upstream forwarding.
//!
//! # Responsibilities
//! - Rebuild the client request for the selected backend
//! - Send it over a pooled HTTP/1.1 client
//! - Enforce connect and response deadlines, and an idle limit on streamed bodies
//! - Return either a streamed response or a fully buffered one for the cache
//!
//! # Design Decisions
//! - Connect failures map to 502, deadline expiry to 504
//! - A body too large to cache is reported as such, so the caller can relay
//!   it instead of failing
//! - The outbound Host is the backend authority; the original host travels
//!   in `x-forwarded-host`
//! - Backend redirects are returned, never followed

use std::error::Error as StdError;
use std::time::Duration;

use axum::body::{Body, Bytes};
use axum::http::{header, uri, HeaderMap, HeaderValue, Request, Response, Uri, Version};
use futures_util::{stream, StreamExt};
use hyper::body::Incoming;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;

use crate::cache::CachedResponse;
use crate::config::TimeoutConfig;
use crate::error::GatewayError;
use crate::http::request::RequestContext;
use crate::http::response::relay;
use crate::observability::metrics;
use crate::resilience::timeouts::with_deadline;
use crate::routing::Backend;
use crate::security::headers::{set_forwarded_headers, strip_hop_by_hop};

/// Pooled client for talking to backends. Cloning shares the pool.
#[derive(Clone)]
pub struct Forwarder {
    client: Client<HttpConnector, Body>,
    upstream_timeout: Duration,
    body_idle_timeout: Duration,
}

impl Forwarder {
    pub fn new(timeouts: &TimeoutConfig) -> Self {
        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(Duration::from_secs(timeouts.connect_secs)));
        connector.set_nodelay(true);

        let client = Client::builder(TokioExecutor::new()).build(connector);

        Self {
            client,
            upstream_timeout: Duration::from_secs(timeouts.upstream_secs),
            body_idle_timeout: Duration::from_secs(timeouts.body_idle_secs),
        }
    }

    /// Forward and stream the backend response back. The deadline covers
    /// the response head; the body streams as the backend produces it, and
    /// is cut off if the backend goes quiet for longer than the idle limit.
    pub async fn forward(
        &self,
        backend: &Backend,
        upstream_path: &str,
        ctx: RequestContext,
    ) -> Result<Response<Body>, GatewayError> {
        let result = with_deadline(backend, self.upstream_timeout, self.send(backend, upstream_path, ctx)).await;
        let response = observe(backend, result).map(relay)?;
        let idle = self.body_idle_timeout;
        Ok(response.map(|body| with_idle_timeout(body, idle, backend.to_string())))
    }

    /// Forward and read the whole body, for populating the cache. The
    /// deadline covers the body as well. Bodies over `max_body` yield
    /// [`GatewayError::UpstreamBodyTooLarge`].
    pub async fn fetch(
        &self,
        backend: &Backend,
        upstream_path: &str,
        ctx: RequestContext,
        max_body: usize,
    ) -> Result<CachedResponse, GatewayError> {
        let result = with_deadline(backend, self.upstream_timeout, async {
            let response = self.send(backend, upstream_path, ctx).await?;
            let (mut parts, body) = response.into_parts();
            strip_hop_by_hop(&mut parts.headers);

            let body = read_bounded(backend, &parts.headers, Body::new(body), max_body).await?;
            Ok::<_, GatewayError>(CachedResponse::new(parts.status, parts.headers, body))
        })
        .await;
        observe(backend, result)
    }

    async fn send(
        &self,
        backend: &Backend,
        upstream_path: &str,
        ctx: RequestContext,
    ) -> Result<Response<Incoming>, GatewayError> {
        let request = build_request(backend, upstream_path, ctx)?;
        tracing::debug!(backend = %backend, uri = %request.uri(), "Sending upstream request");

        self.client
            .request(request)
            .await
            .map_err(|e| GatewayError::UpstreamUnreachable {
                backend: backend.to_string(),
                reason: error_chain(&e),
            })
    }
}

/// Build the outbound request: backend URI, hop-by-hop headers removed,
/// forwarding headers stamped, Host rewritten.
pub fn build_request(
    backend: &Backend,
    upstream_path: &str,
    ctx: RequestContext,
) -> Result<Request<Body>, GatewayError> {
    let path_and_query = match &ctx.query {
        Some(query) => format!("{}?{}", upstream_path, query),
        None => upstream_path.to_string(),
    };

    let uri = Uri::builder()
        .scheme(uri::Scheme::HTTP)
        .authority(backend.authority().clone())
        .path_and_query(path_and_query)
        .build()
        .map_err(|e| GatewayError::Internal(format!("upstream uri for {}: {}", backend, e)))?;

    let host = HeaderValue::from_str(backend.authority().as_str())
        .map_err(|e| GatewayError::Internal(format!("upstream host {}: {}", backend, e)))?;

    let mut headers = ctx.headers;
    strip_hop_by_hop(&mut headers);
    set_forwarded_headers(
        &mut headers,
        &ctx.original_host,
        ctx.scheme,
        ctx.client_addr.map(|addr| addr.ip()),
    );
    headers.insert(header::HOST, host);

    let mut request = Request::new(ctx.body);
    *request.method_mut() = ctx.method;
    *request.uri_mut() = uri;
    *request.version_mut() = Version::HTTP_11;
    *request.headers_mut() = headers;
    Ok(request)
}

/// Buffer `body`, giving up as soon as it is known to exceed `limit`.
async fn read_bounded(
    backend: &Backend,
    headers: &HeaderMap,
    body: Body,
    limit: usize,
) -> Result<Bytes, GatewayError> {
    let too_large = || GatewayError::UpstreamBodyTooLarge {
        backend: backend.to_string(),
        limit,
    };

    let declared = headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok());
    if declared.is_some_and(|len| len > limit as u64) {
        return Err(too_large());
    }

    let mut buffered = Vec::with_capacity(declared.map_or(0, |len| len as usize));
    let mut chunks = body.into_data_stream();
    while let Some(chunk) = chunks.next().await {
        let chunk = chunk.map_err(|e| GatewayError::UpstreamBody {
            backend: backend.to_string(),
            reason: error_chain(&e),
        })?;
        if buffered.len() + chunk.len() > limit {
            return Err(too_large());
        }
        buffered.extend_from_slice(&chunk);
    }
    Ok(Bytes::from(buffered))
}

/// Re-stream `body`, failing it once no chunk arrives within `idle`.
fn with_idle_timeout(body: Body, idle: Duration, backend: String) -> Body {
    let chunks = stream::unfold(Some(body.into_data_stream()), move |state| {
        let backend = backend.clone();
        async move {
            let mut chunks = state?;
            match tokio::time::timeout(idle, chunks.next()).await {
                Ok(Some(Ok(chunk))) => Some((Ok(chunk), Some(chunks))),
                Ok(Some(Err(e))) => Some((
                    Err(GatewayError::UpstreamBody {
                        backend,
                        reason: error_chain(&e),
                    }),
                    None,
                )),
                Ok(None) => None,
                Err(_) => {
                    tracing::warn!(backend = %backend, idle = ?idle, "Upstream body stalled, aborting relay");
                    metrics::record_upstream_error("body_idle");
                    Some((
                        Err(GatewayError::UpstreamTimeout {
                            backend,
                            timeout: idle,
                        }),
                        None,
                    ))
                }
            }
        }
    });
    Body::from_stream(chunks)
}

fn observe<T>(backend: &Backend, result: Result<T, GatewayError>) -> Result<T, GatewayError> {
    if let Err(e) = &result {
        tracing::warn!(backend = %backend, error = %e, "Upstream request failed");
        metrics::record_upstream_error(e.kind());
    }
    result
}

/// Render an error with its sources, e.g. "client error (Connect): tcp connect error: Connection refused".
fn error_chain(error: &dyn StdError) -> String {
    let mut rendered = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        rendered.push_str(": ");
        rendered.push_str(&cause.to_string());
        source = cause.source();
    }
    rendered
}
