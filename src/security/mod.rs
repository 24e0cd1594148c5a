//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → limits (body size, in-flight cap; tower layers in http::server)
//!     → headers.rs (strip hop-by-hop, add X-Forwarded-*)
//!     → Forward to backend
//! Backend response:
//!     → headers.rs (strip hop-by-hop, CORS override)
//! ```
//!
//! # Design Decisions
//! - No trust in client-supplied forwarding headers for host and scheme
//! - Limits enforced before any backend work

pub mod headers;
