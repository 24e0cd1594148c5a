//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate backend addresses and redirect targets
//! - Validate value ranges (timeouts > 0, bind address parses)
//! - Detect duplicate and self-looping rules
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::net::SocketAddr;

use axum::http::uri::Authority;
use thiserror::Error;
use url::Url;

use crate::config::schema::{GatewayConfig, RedirectConfig, RouteConfig};

/// A single semantic defect in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("invalid bind address '{0}'")]
    InvalidBindAddress(String),

    #[error("{kind} #{index} has no hosts")]
    EmptyHosts { kind: &'static str, index: usize },

    #[error("{kind} #{index} has invalid host '{host}'")]
    InvalidHost {
        kind: &'static str,
        index: usize,
        host: String,
    },

    #[error("{kind} #{index} path '{path}' must start with '/'")]
    InvalidPath {
        kind: &'static str,
        index: usize,
        path: String,
    },

    #[error("route #{index} backend '{backend}' is not a host:port pair")]
    InvalidBackend { index: usize, backend: String },

    #[error("redirect #{index} target '{target}' is malformed")]
    MalformedRedirectTarget { index: usize, target: String },

    #[error("redirect #{index} on host '{host}' redirects to itself")]
    RedirectLoop { index: usize, host: String },

    #[error("duplicate {kind} for host '{host}' and path '{path}'")]
    DuplicateRule {
        kind: &'static str,
        host: String,
        path: String,
    },

    #[error("{0} must be greater than zero")]
    ZeroValue(&'static str),
}

/// Validate a parsed configuration, collecting every defect.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidBindAddress(
            config.listener.bind_address.clone(),
        ));
    }
    if config.listener.max_concurrent_requests == 0 {
        errors.push(ValidationError::ZeroValue("listener.max_concurrent_requests"));
    }
    if config.timeouts.connect_secs == 0 {
        errors.push(ValidationError::ZeroValue("timeouts.connect_secs"));
    }
    if config.timeouts.upstream_secs == 0 {
        errors.push(ValidationError::ZeroValue("timeouts.upstream_secs"));
    }
    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::ZeroValue("timeouts.request_secs"));
    }
    if config.timeouts.body_idle_secs == 0 {
        errors.push(ValidationError::ZeroValue("timeouts.body_idle_secs"));
    }
    if config.cache.max_entries == 0 {
        errors.push(ValidationError::ZeroValue("cache.max_entries"));
    }

    let mut seen_routes = HashSet::new();
    for (index, route) in config.routes.iter().enumerate() {
        validate_route(index, route, &mut seen_routes, &mut errors);
    }

    let mut seen_redirects = HashSet::new();
    for (index, redirect) in config.redirects.iter().enumerate() {
        validate_redirect(index, redirect, &mut seen_redirects, &mut errors);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_route(
    index: usize,
    route: &RouteConfig,
    seen: &mut HashSet<(String, String, bool)>,
    errors: &mut Vec<ValidationError>,
) {
    validate_hosts("route", index, &route.hosts, errors);

    if !route.path_prefix.starts_with('/') {
        errors.push(ValidationError::InvalidPath {
            kind: "route",
            index,
            path: route.path_prefix.clone(),
        });
    }
    if let Some(rewrite) = &route.rewrite {
        if !rewrite.starts_with('/') {
            errors.push(ValidationError::InvalidPath {
                kind: "route",
                index,
                path: rewrite.clone(),
            });
        }
    }

    if !is_host_port(&route.backend) {
        errors.push(ValidationError::InvalidBackend {
            index,
            backend: route.backend.clone(),
        });
    }

    for host in &route.hosts {
        let host = host.to_lowercase();
        if !seen.insert((host.clone(), route.path_prefix.clone(), route.exact)) {
            errors.push(ValidationError::DuplicateRule {
                kind: "route",
                host,
                path: route.path_prefix.clone(),
            });
        }
    }
}

fn validate_redirect(
    index: usize,
    redirect: &RedirectConfig,
    seen: &mut HashSet<(String, String, bool, Option<&'static str>)>,
    errors: &mut Vec<ValidationError>,
) {
    validate_hosts("redirect", index, &redirect.hosts, errors);

    let path = redirect.path_prefix.as_deref().unwrap_or("/");
    if !path.starts_with('/') {
        errors.push(ValidationError::InvalidPath {
            kind: "redirect",
            index,
            path: path.to_string(),
        });
    }

    if !is_valid_target(redirect) {
        errors.push(ValidationError::MalformedRedirectTarget {
            index,
            target: format!("{}://{}", redirect.target_scheme, redirect.target_host),
        });
    }

    let scheme_key = redirect.when_scheme.map(|s| s.as_str());
    for host in &redirect.hosts {
        let host = host.to_lowercase();

        let same_scheme = redirect
            .when_scheme
            .map_or(true, |scheme| scheme == redirect.target_scheme);
        if redirect.preserve_path && same_scheme && host == redirect.target_host.to_lowercase() {
            errors.push(ValidationError::RedirectLoop {
                index,
                host: host.clone(),
            });
        }

        if !seen.insert((host.clone(), path.to_string(), redirect.exact, scheme_key)) {
            errors.push(ValidationError::DuplicateRule {
                kind: "redirect",
                host,
                path: path.to_string(),
            });
        }
    }
}

fn validate_hosts(
    kind: &'static str,
    index: usize,
    hosts: &[String],
    errors: &mut Vec<ValidationError>,
) {
    if hosts.is_empty() {
        errors.push(ValidationError::EmptyHosts { kind, index });
    }
    for host in hosts {
        if !is_valid_host_pattern(host) {
            errors.push(ValidationError::InvalidHost {
                kind,
                index,
                host: host.clone(),
            });
        }
    }
}

/// Exact hostnames, or a single leading `*.` wildcard label.
fn is_valid_host_pattern(host: &str) -> bool {
    let name = host.strip_prefix("*.").unwrap_or(host);
    !name.is_empty()
        && !name.contains('*')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.' || c == '_')
}

fn is_host_port(value: &str) -> bool {
    match value.parse::<Authority>() {
        Ok(authority) => {
            authority.port_u16().is_some()
                && !authority.host().is_empty()
                && !value.contains('@')
        }
        Err(_) => false,
    }
}

fn is_valid_target(redirect: &RedirectConfig) -> bool {
    let raw = format!("{}://{}", redirect.target_scheme, redirect.target_host);
    match Url::parse(&raw) {
        Ok(url) => {
            url.host_str().is_some()
                && url.path() == "/"
                && url.query().is_none()
                && url.fragment().is_none()
                && url.username().is_empty()
                && !redirect.target_host.contains('/')
        }
        Err(_) => false,
    }
}
