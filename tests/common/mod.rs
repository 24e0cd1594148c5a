//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Request, State},
    http::{HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json, Router,
};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use transit_gateway::config::{parse_config, GatewayConfig};
use transit_gateway::{net, HttpServer, Shutdown};

/// How the echo backend answers.
#[derive(Clone)]
pub struct BackendBehavior {
    pub status: StatusCode,
    pub delay: Duration,
    pub headers: Vec<(&'static str, &'static str)>,
    /// Answer 304 with no body whenever the request carries If-None-Match.
    pub honor_if_none_match: bool,
}

impl Default for BackendBehavior {
    fn default() -> Self {
        Self {
            status: StatusCode::OK,
            delay: Duration::ZERO,
            headers: Vec::new(),
            honor_if_none_match: false,
        }
    }
}

#[derive(Clone)]
struct BackendState {
    behavior: BackendBehavior,
    hits: Arc<AtomicUsize>,
}

/// A running echo backend.
pub struct EchoBackend {
    pub addr: SocketAddr,
    hits: Arc<AtomicUsize>,
}

impl EchoBackend {
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

/// Start a backend that answers every request with a JSON description of
/// what it received.
pub async fn start_echo_backend() -> EchoBackend {
    start_backend(BackendBehavior::default()).await
}

pub async fn start_backend(behavior: BackendBehavior) -> EchoBackend {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let hits = Arc::new(AtomicUsize::new(0));

    let app = Router::new().fallback(echo).with_state(BackendState {
        behavior,
        hits: hits.clone(),
    });

    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    EchoBackend { addr, hits }
}

async fn echo(State(state): State<BackendState>, request: Request) -> Response {
    let hit = state.hits.fetch_add(1, Ordering::SeqCst) + 1;
    if !state.behavior.delay.is_zero() {
        tokio::time::sleep(state.behavior.delay).await;
    }

    if state.behavior.honor_if_none_match && request.headers().contains_key("if-none-match") {
        return StatusCode::NOT_MODIFIED.into_response();
    }

    let header = |name: &str| {
        request
            .headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };

    let body = serde_json::json!({
        "host": header("host"),
        "method": request.method().as_str(),
        "path": request.uri().path(),
        "query": request.uri().query(),
        "x-forwarded-host": header("x-forwarded-host"),
        "x-forwarded-proto": header("x-forwarded-proto"),
        "x-forwarded-for": header("x-forwarded-for"),
        "x-request-id": header("x-request-id"),
        "hit": hit,
    });

    let mut response = (state.behavior.status, Json(body)).into_response();
    for (name, value) in &state.behavior.headers {
        response.headers_mut().append(
            HeaderName::from_static(*name),
            HeaderValue::from_static(*value),
        );
    }
    response
}

/// A running gateway bound to an ephemeral port.
pub struct TestGateway {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    pub updates: mpsc::UnboundedSender<GatewayConfig>,
}

impl TestGateway {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

impl Drop for TestGateway {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

/// Parse `toml`, bind to 127.0.0.1:0 and serve in the background.
pub async fn start_gateway(toml: &str) -> TestGateway {
    let mut config = parse_config(toml).unwrap();
    config.listener.bind_address = "127.0.0.1:0".into();

    let listener = net::bind(&config.listener).await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = HttpServer::new(config).unwrap();

    let shutdown = Shutdown::new();
    let (updates, config_updates) = mpsc::unbounded_channel();
    let server_shutdown = shutdown.subscribe();

    tokio::spawn(async move {
        let _ = server.run(listener, config_updates, server_shutdown).await;
    });

    TestGateway {
        addr,
        shutdown,
        updates,
    }
}

/// Client that neither follows redirects nor uses a system proxy.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .no_proxy()
        .build()
        .unwrap()
}
