//! Error types for the cache engine
//!
//! Provides unified error handling using thiserror.

use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for cache construction and mutation.
///
/// Absence of a key, an expired entry, or a released value are not errors;
/// read operations report those as `None`/`false`.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Cache was constructed with a capacity below the minimum of 1
    #[error("Cache capacity must be greater than 0, got: {0}")]
    InvalidCapacity(usize),

    /// A TTL insert was issued after the expiration scheduler shut down
    #[error("Expiration scheduler has been shut down")]
    SchedulerStopped,

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

// == Result Type Alias ==
/// Convenience Result type for the cache engine.
pub type Result<T> = std::result::Result<T, CacheError>;
