//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Request to backend:
//!     → connect timeout (HttpConnector) → 502 on failure
//!     → timeouts.rs (response deadline) → 504 on expiry
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every backend call has a deadline
//! - No automatic retries: a failed request fails once, to its caller

pub mod timeouts;
