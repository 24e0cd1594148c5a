//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the gateway handler
//! - Wire up middleware (request ID, tracing, timeout, limits)
//! - Run the per-request pipeline: redirect → route → cache → forward
//! - Relay responses too large to cache instead of failing them
//! - Apply rule table reloads and sweep the cache in the background
//! - Serve until the shutdown signal, then drain

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::{Request, State},
    http::{Method, Response},
    response::IntoResponse,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower::limit::ConcurrencyLimitLayer;
use tower::ServiceBuilder;
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::cache::{CacheStatus, ResponseCache};
use crate::config::{ConfigError, GatewayConfig};
use crate::error::GatewayError;
use crate::http::forward::Forwarder;
use crate::http::request::{RequestContext, UuidRequestId};
use crate::http::response::finalize;
use crate::observability::metrics;
use crate::routing::{redirect, resolve, RedirectDecision, RouteTarget, Router as RuleRouter, RuleTable};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub router: Arc<RuleRouter>,
    pub cache: ResponseCache,
    pub forwarder: Forwarder,
    pub max_entry_bytes: usize,
}

/// The gateway's HTTP front end.
pub struct HttpServer {
    app: Router,
    state: AppState,
    config: GatewayConfig,
}

impl HttpServer {
    /// Compile the rule table and build the service stack. Fails if the
    /// configuration does not validate.
    pub fn new(config: GatewayConfig) -> Result<Self, ConfigError> {
        let table = RuleTable::from_config(&config)?;
        tracing::info!(
            hosts = table.host_count(),
            routes = config.routes.len(),
            redirects = config.redirects.len(),
            "Rule table compiled"
        );

        let state = AppState {
            router: Arc::new(RuleRouter::new(table)),
            cache: ResponseCache::new(&config.cache),
            forwarder: Forwarder::new(&config.timeouts),
            max_entry_bytes: config.cache.max_entry_bytes,
        };

        let app = Self::build_router(&config, state.clone());
        Ok(Self { app, state, config })
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &GatewayConfig, state: AppState) -> Router {
        Router::new()
            .fallback(gateway_handler)
            .with_state(state)
            .layer(
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::x_request_id(UuidRequestId))
                    .layer(TraceLayer::new_for_http())
                    .layer(PropagateRequestIdLayer::x_request_id())
                    .layer(RequestBodyLimitLayer::new(config.security.max_body_size))
                    .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
                    .layer(ConcurrencyLimitLayer::new(config.listener.max_concurrent_requests)),
            )
    }

    /// Shared handle to the response cache.
    pub fn cache(&self) -> ResponseCache {
        self.state.cache.clone()
    }

    /// Shared handle to the rule router.
    pub fn router(&self) -> Arc<RuleRouter> {
        self.state.router.clone()
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Serve on `listener` until `shutdown` fires. Configs arriving on
    /// `config_updates` replace the rule table; the cache is kept.
    pub async fn run(
        self,
        listener: TcpListener,
        config_updates: mpsc::UnboundedReceiver<GatewayConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        tokio::spawn(apply_reloads(
            self.state.router.clone(),
            config_updates,
            shutdown.resubscribe(),
        ));

        if self.config.cache.sweep_interval_secs > 0 {
            let every = Duration::from_secs(self.config.cache.sweep_interval_secs);
            tokio::spawn(self.state.cache.clone().run_sweeper(every, shutdown.resubscribe()));
        }

        let app = self.app.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received, draining connections");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

async fn apply_reloads(
    router: Arc<RuleRouter>,
    mut config_updates: mpsc::UnboundedReceiver<GatewayConfig>,
    mut shutdown: broadcast::Receiver<()>,
) {
    loop {
        tokio::select! {
            update = config_updates.recv() => {
                let Some(config) = update else { break };
                match RuleTable::from_config(&config) {
                    Ok(table) => router.replace(table),
                    Err(e) => tracing::error!(error = %e, "Reloaded configuration rejected, keeping current rules"),
                }
            }
            _ = shutdown.recv() => break,
        }
    }
}

/// Main gateway handler.
async fn gateway_handler(State(state): State<AppState>, request: Request) -> Response<Body> {
    let start = Instant::now();
    let method = request.method().to_string();

    let (response, outcome) = match RequestContext::from_request(request) {
        Ok(ctx) => handle(&state, ctx).await,
        Err(e) => {
            tracing::warn!(error = %e, "Rejected request");
            (e.into_response(), "error")
        }
    };

    metrics::record_request(&method, response.status().as_u16(), outcome, start);
    response
}

/// Redirect, route, then serve from cache or forward.
async fn handle(state: &AppState, ctx: RequestContext) -> (Response<Body>, &'static str) {
    let table = state.router.snapshot();

    let target = {
        let path = ctx.request_path();

        if let RedirectDecision::Redirect { location } =
            redirect::enforce(&table, &ctx.host, ctx.scheme, &path, ctx.query.as_deref())
        {
            tracing::debug!(
                request_id = %ctx.request_id,
                host = %ctx.host,
                location = %location,
                "Redirecting to canonical location"
            );
            return (redirect::redirect_response(&location), "redirect");
        }

        match resolve(&table, &ctx.host, &path) {
            Ok(target) => target,
            Err(e) => {
                tracing::warn!(request_id = %ctx.request_id, host = %ctx.host, path = %ctx.path, "No route matched");
                return (e.into_response(), "no_route");
            }
        }
    };

    let request_id = ctx.request_id.clone();
    tracing::debug!(
        request_id = %request_id,
        method = %ctx.method,
        host = %ctx.host,
        path = %ctx.path,
        backend = %target.backend,
        cacheable = target.cacheable,
        "Route matched"
    );

    let result = if target.cacheable && ctx.method == Method::GET {
        serve_cached(state, &target, ctx).await
    } else {
        state
            .forwarder
            .forward(&target.backend, &target.upstream_path, ctx)
            .await
            .map(|response| (response, "forward"))
    };

    match result {
        Ok((response, outcome)) => (finalize(response, &target), outcome),
        Err(e) => {
            tracing::error!(request_id = %request_id, backend = %target.backend, error = %e, "Request failed");
            (e.into_response(), "error")
        }
    }
}

async fn serve_cached(
    state: &AppState,
    target: &RouteTarget,
    ctx: RequestContext,
) -> Result<(Response<Body>, &'static str), GatewayError> {
    let key = ctx.cache_key();
    let ttl = target.cache_ttl.unwrap_or_else(|| state.cache.default_ttl());

    let forwarder = state.forwarder.clone();
    let backend = target.backend.clone();
    let upstream_path = target.upstream_path.clone();
    let max_body = state.max_entry_bytes;
    let fill = ctx.fill_request();

    let result = state
        .cache
        .get_or_fetch(key, ttl, move || async move {
            forwarder.fetch(&backend, &upstream_path, fill, max_body).await
        })
        .await;

    match result {
        Ok((cached, status)) => {
            let outcome = match status {
                CacheStatus::Hit => "hit",
                CacheStatus::Miss => "miss",
            };
            Ok((cached.to_response(status), outcome))
        }
        Err(GatewayError::UpstreamBodyTooLarge { limit, .. }) => {
            tracing::debug!(
                request_id = %ctx.request_id,
                backend = %target.backend,
                limit,
                "Response too large to cache, relaying directly"
            );
            state
                .forwarder
                .forward(&target.backend, &target.upstream_path, ctx)
                .await
                .map(|response| (response, "forward"))
        }
        Err(e) => Err(e),
    }
}
