//! Route lookup and dispatch.
//!
//! # Responsibilities
//! - Hold the current rule table and swap it on reload
//! - Resolve a (host, path) pair to a backend target
//! - Return matched target or explicit no-match
//!
//! # Design Decisions
//! - Readers take an `Arc` snapshot per request (lock-free via ArcSwap)
//! - A request sees one table for its whole pipeline, even across a reload
//! - Explicit NoMatch rather than silent default

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;

use crate::error::GatewayError;
use crate::routing::matcher::RequestPath;
use crate::routing::table::{Backend, RuleTable};

/// Where and how a routed request is forwarded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteTarget {
    pub backend: Backend,
    pub cacheable: bool,
    pub cache_ttl: Option<Duration>,
    pub cors: bool,
    /// Outbound path, after any prefix rewrite; raw escapes preserved.
    pub upstream_path: String,
}

/// Shared holder of the active rule table.
#[derive(Debug)]
pub struct Router {
    table: ArcSwap<RuleTable>,
}

impl Router {
    pub fn new(table: RuleTable) -> Self {
        Self {
            table: ArcSwap::from_pointee(table),
        }
    }

    /// The table in effect right now.
    pub fn snapshot(&self) -> Arc<RuleTable> {
        self.table.load_full()
    }

    /// Atomically replace the table; in-flight requests keep their snapshot.
    pub fn replace(&self, table: RuleTable) {
        self.table.store(Arc::new(table));
        tracing::info!("Rule table replaced");
    }
}

/// Resolve a request against `table`; `host` must be normalized.
pub fn resolve(
    table: &RuleTable,
    host: &str,
    path: &RequestPath<'_>,
) -> Result<RouteTarget, GatewayError> {
    let rule = table
        .lookup_route(host, path)
        .ok_or_else(|| GatewayError::NoRouteMatch {
            host: host.to_string(),
            path: path.raw().to_string(),
        })?;

    let upstream_path = match &rule.rewrite {
        Some(replacement) => rule.path.rewrite(path, replacement),
        None => path.raw().to_string(),
    };

    Ok(RouteTarget {
        backend: rule.backend.clone(),
        cacheable: rule.cacheable,
        cache_ttl: rule.cache_ttl,
        cors: rule.cors,
        upstream_path,
    })
}
