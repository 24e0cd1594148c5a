//! Transit Gateway
//!
//! A host- and path-routing HTTP gateway built with Tokio and Axum.
//!
//! # Architecture Overview
//!
//! ```text
//!                          ┌──────────────────────────────────────────────────────┐
//!                          │                    TRANSIT GATEWAY                    │
//!                          │                                                      │
//!     Client Request       │  ┌─────────┐    ┌─────────┐    ┌──────────────┐      │
//!     ─────────────────────┼─▶│   net   │───▶│  http   │───▶│   routing    │      │
//!                          │  │listener │    │ server  │    │ redirect/rule│      │
//!                          │  └─────────┘    └─────────┘    └──────┬───────┘      │
//!                          │                                       │              │
//!                          │                                       ▼              │
//!                          │                               ┌──────────────┐       │
//!                          │                               │    cache     │       │
//!                          │                               │ singleflight │       │
//!                          │                               └──────┬───────┘       │
//!                          │                                       │              │
//!                          │                                       ▼              │
//!     Client Response      │  ┌─────────┐    ┌─────────┐    ┌──────────────┐      │
//!     ◀────────────────────┼──│response │◀───│ forward │◀───│   backend    │◀─────┼── Backend
//!                          │  └─────────┘    └─────────┘    └──────────────┘      │
//!                          │                                                      │
//!                          │  Cross-cutting: config (+ hot reload), observability,│
//!                          │  security (headers, limits), resilience (timeouts),  │
//!                          │  lifecycle (signals, shutdown)                       │
//!                          └──────────────────────────────────────────────────────┘
//! ```

// Core subsystems
pub mod cache;
pub mod config;
pub mod error;
pub mod http;
pub mod net;
pub mod routing;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;
pub mod resilience;
pub mod security;

pub use config::GatewayConfig;
pub use error::GatewayError;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
