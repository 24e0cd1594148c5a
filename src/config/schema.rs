//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address, concurrency cap).
    pub listener: ListenerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Response cache settings.
    pub cache: CacheConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Request limits.
    pub security: SecurityConfig,

    /// Route definitions mapping (host, path prefix) to backends.
    pub routes: Vec<RouteConfig>,

    /// Canonical scheme/host redirects, evaluated before routes.
    pub redirects: Vec<RedirectConfig>,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:9000").
    pub bind_address: String,

    /// Maximum requests processed concurrently (backpressure).
    pub max_concurrent_requests: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:9000".to_string(),
            max_concurrent_requests: 10_000,
        }
    }
}

/// Incoming request scheme, as reported by the TLS terminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Scheme {
    Http,
    Https,
}

impl Scheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scheme::Http => "http",
            Scheme::Https => "https",
        }
    }
}

impl std::fmt::Display for Scheme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Route configuration: one entry may cover several virtual hosts.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RouteConfig {
    /// Host headers to match (exact, case-insensitive, or `*.suffix`).
    pub hosts: Vec<String>,

    /// Path prefix to match.
    #[serde(default = "default_path_prefix")]
    pub path_prefix: String,

    /// Match the path exactly instead of by prefix.
    #[serde(default)]
    pub exact: bool,

    /// Backend address as `host:port`, always reached over plain HTTP.
    pub backend: String,

    /// Pass GET requests through the response cache.
    #[serde(default)]
    pub cacheable: bool,

    /// Per-route cache TTL; falls back to `cache.default_ttl_secs`.
    #[serde(default)]
    pub cache_ttl_secs: Option<u64>,

    /// Force `access-control-allow-origin: *` on responses.
    #[serde(default)]
    pub cors: bool,

    /// Replacement for the matched prefix on the outbound path.
    #[serde(default)]
    pub rewrite: Option<String>,
}

/// Redirect configuration: one entry may cover several virtual hosts.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RedirectConfig {
    /// Host headers to match.
    pub hosts: Vec<String>,

    /// Path prefix to match; everything when absent.
    #[serde(default)]
    pub path_prefix: Option<String>,

    /// Match the path exactly instead of by prefix.
    #[serde(default)]
    pub exact: bool,

    /// Only redirect requests that arrived over this scheme.
    #[serde(default)]
    pub when_scheme: Option<Scheme>,

    /// Scheme of the canonical site.
    pub target_scheme: Scheme,

    /// Host of the canonical site.
    pub target_host: String,

    /// Append the original path and query to the Location.
    #[serde(default = "default_true")]
    pub preserve_path: bool,
}

fn default_path_prefix() -> String {
    "/".to_string()
}

fn default_true() -> bool {
    true
}

/// Timeout configuration for various operations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Backend connection establishment timeout in seconds.
    pub connect_secs: u64,

    /// Deadline for an upstream response (headers, plus body when cached) in seconds.
    pub upstream_secs: u64,

    /// Total inbound request timeout in seconds.
    pub request_secs: u64,

    /// Longest gap between body chunks of a streamed response, in seconds.
    pub body_idle_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 2,
            upstream_secs: 10,
            request_secs: 30,
            body_idle_secs: 15,
        }
    }
}

/// Response cache configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    /// TTL used when a route does not set its own.
    pub default_ttl_secs: u64,

    /// Upper bound on stored entries.
    pub max_entries: usize,

    /// Largest response body that may be cached, in bytes.
    pub max_entry_bytes: usize,

    /// Background sweep interval; 0 disables the sweeper.
    pub sweep_interval_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_ttl_secs: 60,
            max_entries: 10_000,
            max_entry_bytes: 16 * 1024 * 1024,
            sweep_interval_secs: 30,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Request limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Maximum inbound body size in bytes.
    pub max_body_size: usize,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_body_size: 2 * 1024 * 1024, // 2MB
        }
    }
}
