//! Error types for the reactive engine.
//!
//! Handler panics are never caught by the engine; they unwind through the
//! write (or `batch`) that triggered them. The errors below cover the
//! asynchronous edges of the system: deferred waits and resource producers.

use std::time::Duration;

use thiserror::Error;

/// Errors surfaced by [`Deferred`](crate::Deferred) and
/// [`Resource`](crate::reactive::Resource).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// The deferred value was rejected by its owner.
    #[error("wait was rejected: {0}")]
    Rejected(String),

    /// The deferred value was rejected by a timer started with
    /// [`Deferred::reject_after`](crate::Deferred::reject_after).
    #[error("wait timed out after {0:?}")]
    Timeout(Duration),

    /// An asynchronous producer needs a tokio runtime and none was current.
    #[error("no tokio runtime is available to drive asynchronous producers")]
    NoRuntime,
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
