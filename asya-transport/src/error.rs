//! Error types for the concrete transport adapters.
//!
//! Follows the same shape as `asya_core::CoreError`: struct-style
//! `thiserror` variants wrapping the underlying client's error, plus a
//! `category()` tag and an `is_retryable()` predicate the backoff helper
//! and callers use instead of matching on variant names.

use thiserror::Error;

/// Result type alias for transport-adapter operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// Errors produced by the AMQP and cloud-queue adapters.
#[derive(Error, Debug)]
pub enum TransportError {
    /// The underlying AMQP client reported a failure.
    #[error("AMQP error: {0}")]
    Amqp(#[from] lapin::Error),

    /// The underlying SQS client reported a failure dispatching a request.
    #[error("SQS error: {0}")]
    CloudQueue(String),

    /// A queue name could not be resolved to a provider-side URL/ARN.
    #[error("queue '{queue_name}' could not be resolved")]
    QueueNotResolved { queue_name: String },

    /// The publisher pool could not obtain a healthy channel within its
    /// configured number of recreation attempts.
    #[error("publisher pool exhausted {attempts} channel recreation attempts for '{queue_name}'")]
    PoolExhausted { queue_name: String, attempts: u32 },

    /// A retryable operation exhausted its backoff attempt budget.
    #[error("operation '{operation}' did not succeed after {attempts} attempts")]
    RetriesExhausted { operation: String, attempts: u32 },
}

impl TransportError {
    /// Creates a queue-not-resolved error.
    pub fn queue_not_resolved(queue_name: impl Into<String>) -> Self {
        Self::QueueNotResolved {
            queue_name: queue_name.into(),
        }
    }

    /// Creates a pool-exhausted error.
    pub fn pool_exhausted(queue_name: impl Into<String>, attempts: u32) -> Self {
        Self::PoolExhausted {
            queue_name: queue_name.into(),
            attempts,
        }
    }

    /// Creates a retries-exhausted error.
    pub fn retries_exhausted(operation: impl Into<String>, attempts: u32) -> Self {
        Self::RetriesExhausted {
            operation: operation.into(),
            attempts,
        }
    }

    /// Returns true if retrying this operation unchanged might succeed
    /// (connection resets, throttling, closed channels) as opposed to a
    /// structural failure (bad queue name, malformed request).
    pub fn is_retryable(&self) -> bool {
        match self {
            TransportError::Amqp(err) => !matches!(
                err,
                lapin::Error::InvalidChannelState(_) | lapin::Error::InvalidConnectionState(_)
            ),
            TransportError::CloudQueue(_) => true,
            TransportError::PoolExhausted { .. } => true,
            TransportError::QueueNotResolved { .. } => false,
            TransportError::RetriesExhausted { .. } => false,
        }
    }

    /// Returns a short category tag, useful as a structured log/metric field.
    pub fn category(&self) -> &'static str {
        match self {
            TransportError::Amqp(_) => "amqp",
            TransportError::CloudQueue(_) => "cloud_queue",
            TransportError::QueueNotResolved { .. } => "queue_not_resolved",
            TransportError::PoolExhausted { .. } => "pool_exhausted",
            TransportError::RetriesExhausted { .. } => "retries_exhausted",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structural_errors_are_not_retryable() {
        assert!(!TransportError::queue_not_resolved("summarize").is_retryable());
        assert!(!TransportError::retries_exhausted("publish", 5).is_retryable());
    }

    #[test]
    fn pool_exhaustion_is_retryable_by_the_caller() {
        assert!(TransportError::pool_exhausted("summarize", 3).is_retryable());
    }

    #[test]
    fn category_is_stable_per_variant() {
        assert_eq!(
            TransportError::queue_not_resolved("x").category(),
            "queue_not_resolved"
        );
        assert_eq!(
            TransportError::pool_exhausted("x", 1).category(),
            "pool_exhausted"
        );
    }
}
