//! TTL Cache Engine - a thread-safe in-memory cache
//!
//! Provides bounded-capacity caching with per-entry TTL expiration,
//! capacity-driven eviction, and host-driven value release under memory
//! pressure.

pub mod cache;
pub mod error;
pub mod scheduler;

pub use cache::{CacheStats, CacheStatsSnapshot, EvictionPolicy, Opportunistic, TtlCache};
pub use error::{CacheError, Result};
pub use scheduler::{shutdown_global, ExpirationScheduler, DEFAULT_SHUTDOWN_GRACE};
