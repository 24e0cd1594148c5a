//! Response cache subsystem.
//!
//! # Data Flow
//! ```text
//! Cacheable GET (route flagged cacheable)
//!     → key.rs (scheme + host + path + query)
//!     → store.rs lookup
//!         live entry  → HIT, backend untouched
//!         in flight   → join the running fetch → MISS
//!         otherwise   → start a fetch (forwarder) → MISS
//!     → entry.rs (storage policy, response materialization)
//! ```
//!
//! Everything else bypasses the cache and carries no `x-proxy-cache` header.

pub mod entry;
pub mod key;
pub mod store;

pub use entry::{CacheStatus, CachedResponse, X_PROXY_CACHE};
pub use key::CacheKey;
pub use store::ResponseCache;
