//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (host, scheme, path)
//!     → redirect.rs (canonical scheme/host; may answer 301)
//!     → router.rs (route lookup)
//!     → table.rs / matcher.rs (evaluate host and path conditions)
//!     → Return: RouteTarget or NoRouteMatch
//!
//! Table Compilation (at startup and on reload):
//!     RouteConfig[] + RedirectConfig[]
//!     → Expand to one rule per host
//!     → Bucket by host, sort by path specificity
//!     → Freeze as immutable RuleTable
//! ```
//!
//! # Design Decisions
//! - Rules compiled once, immutable at runtime
//! - No regex in hot path (prefix matching only)
//! - Deterministic: same input always matches same rule
//! - Redirects always win over routes

pub mod matcher;
pub mod redirect;
pub mod router;
pub mod table;

pub use matcher::{normalize_host, RequestPath};
pub use redirect::RedirectDecision;
pub use router::{resolve, RouteTarget, Router};
pub use table::{Backend, RuleTable};
