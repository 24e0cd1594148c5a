//! TCP listener setup.
//!
//! # Responsibilities
//! - Parse and bind the configured address
//! - Report the bound address (port 0 resolves here)
//!
//! The in-flight cap lives in the HTTP stack as a tower concurrency limit,
//! so the listener hands the socket straight to the server.

use std::net::SocketAddr;

use thiserror::Error;
use tokio::net::TcpListener;

use crate::config::ListenerConfig;

#[derive(Debug, Error)]
pub enum ListenerError {
    #[error("Invalid bind address '{address}': {source}")]
    Address {
        address: String,
        #[source]
        source: std::net::AddrParseError,
    },

    #[error("Failed to bind {address}: {source}")]
    Bind {
        address: SocketAddr,
        #[source]
        source: std::io::Error,
    },
}

/// Bind the gateway's listening socket.
pub async fn bind(config: &ListenerConfig) -> Result<TcpListener, ListenerError> {
    let address: SocketAddr = config
        .bind_address
        .parse()
        .map_err(|source| ListenerError::Address {
            address: config.bind_address.clone(),
            source,
        })?;

    let listener = TcpListener::bind(address)
        .await
        .map_err(|source| ListenerError::Bind { address, source })?;

    let local_addr = listener
        .local_addr()
        .map_err(|source| ListenerError::Bind { address, source })?;

    tracing::info!(
        address = %local_addr,
        max_concurrent_requests = config.max_concurrent_requests,
        "Listener bound"
    );

    Ok(listener)
}
