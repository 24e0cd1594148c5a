//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, limits, tracing)
//!     → request.rs (scheme, host, path, query)
//!     → [routing layer: redirect or route]
//!     → [cache layer for cacheable GETs]
//!     → forward.rs (rebuild request, send with deadlines)
//!     → response.rs (strip hop-by-hop, CORS override)
//!     → Send to client
//! ```

pub mod forward;
pub mod request;
pub mod response;
pub mod server;

pub use forward::Forwarder;
pub use request::{client_scheme, RequestContext, UuidRequestId, X_REQUEST_ID};
pub use server::{AppState, HttpServer};
