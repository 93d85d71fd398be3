//! Error types for the synchronization system
//!
//! This module defines all error types used throughout the crate.

use thiserror::Error;

/// Result type alias for synchronization operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the synchronization system
#[derive(Error, Debug)]
pub enum Error {
    /// Transport-level failure (connection refused, timeout, DNS, ...)
    #[error("Transport error: {0}")]
    Transport(String),

    /// Non-success HTTP status from the remote store
    #[error("HTTP error: status {status}: {body}")]
    Http {
        /// The HTTP status code
        status: u16,
        /// The response body, as far as it could be read
        body: String,
    },

    /// Provider-enforced throttling was detected
    #[error("Rate limited: status {status}")]
    RateLimited {
        /// The rate-limit status code returned by the provider
        status: u16,
    },

    /// More items were submitted than a single partition can hold.
    /// This is a caller bug and is never retried.
    #[error("Capacity exceeded: {requested} items submitted, partition capacity is {capacity}")]
    CapacityExceeded {
        /// Number of items the caller submitted
        requested: usize,
        /// The partition capacity
        capacity: usize,
    },

    /// A partition vanished between the read and the patch
    #[error("Partition not found: {0}")]
    PartitionNotFound(String),

    /// All retry attempts were spent without a success
    #[error("Retries exhausted for {operation} after {attempts} attempts (last status: {status:?}): {body}")]
    RetryExhausted {
        /// The operation that was being retried
        operation: String,
        /// Number of attempts made
        attempts: usize,
        /// Last observed HTTP status, if any
        status: Option<u16>,
        /// Last observed response body or error text
        body: String,
    },

    /// An algorithmic invariant was violated; always fatal
    #[error("Invariant violation: {0}")]
    Invariant(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Store-specific error
    #[error("Store error ({store}): {message}")]
    Store {
        /// Store backend name
        store: String,
        /// Error message
        message: String,
    },

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a transport error
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    /// Create an HTTP status error
    pub fn http(status: u16, body: impl Into<String>) -> Self {
        Self::Http {
            status,
            body: body.into(),
        }
    }

    /// Create a rate-limit error
    pub fn rate_limited(status: u16) -> Self {
        Self::RateLimited { status }
    }

    /// Create a capacity-exceeded error
    pub fn capacity_exceeded(requested: usize, capacity: usize) -> Self {
        Self::CapacityExceeded {
            requested,
            capacity,
        }
    }

    /// Create a "partition not found" error
    pub fn partition_not_found(msg: impl Into<String>) -> Self {
        Self::PartitionNotFound(msg.into())
    }

    /// Create an invariant violation error
    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::Invariant(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a store-specific error
    pub fn store(store: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Store {
            store: store.into(),
            message: message.into(),
        }
    }

    /// Create a generic error
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    /// The HTTP status carried by this error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } | Self::RateLimited { status } => Some(*status),
            Self::RetryExhausted { status, .. } => *status,
            _ => None,
        }
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}
