//! Timeout enforcement.
//!
//! # Responsibilities
//! - Wrap backend calls with a deadline
//! - Cancel the wrapped operation cleanly on timeout
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities
//! - Timeout errors are distinct from other errors
//! - Timed-out requests return 504 Gateway Timeout

use std::future::Future;
use std::time::Duration;

use crate::error::GatewayError;
use crate::routing::Backend;

/// Run `operation` against `backend`, failing with `UpstreamTimeout` after `timeout`.
pub async fn with_deadline<T, F>(
    backend: &Backend,
    timeout: Duration,
    operation: F,
) -> Result<T, GatewayError>
where
    F: Future<Output = Result<T, GatewayError>>,
{
    match tokio::time::timeout(timeout, operation).await {
        Ok(result) => result,
        Err(_) => Err(GatewayError::UpstreamTimeout {
            backend: backend.to_string(),
            timeout,
        }),
    }
}
