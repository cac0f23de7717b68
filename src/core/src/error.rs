//! Collaborator error types
//!
//! "Not found" is never represented here: lookups return `Option` so callers
//! can branch on absence without inspecting an error.

use thiserror::Error;

/// Errors raised by a persistence backend
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// Backend could not be reached (pool exhausted, connection refused, ...)
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// Query was rejected or failed mid-flight
    #[error("Query failed: {0}")]
    Query(String),

    /// A stored row could not be decoded
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A write referenced a record outside the scope it was issued in
    #[error("Scope mismatch: {0}")]
    ScopeMismatch(String),
}

impl StoreError {
    /// Create an unavailable error
    pub fn unavailable<S: Into<String>>(msg: S) -> Self {
        StoreError::Unavailable(msg.into())
    }

    /// Create a query error
    pub fn query<S: Into<String>>(msg: S) -> Self {
        StoreError::Query(msg.into())
    }
}

/// Errors raised by a cache backend
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CacheError {
    /// Backend failure
    #[error("Cache backend error: {0}")]
    Backend(String),

    /// Payload could not be encoded or decoded
    #[error("Cache serialization error: {0}")]
    Serialization(String),
}
