//! Error types shared by every crate that manipulates envelopes directly.
//!
//! Follows the same shape across the workspace: struct-style `thiserror`
//! variants, constructor helpers, and classification predicates used for
//! logging and retry decisions rather than matching on variant names at
//! call sites.

use thiserror::Error;

/// Result type alias for core envelope operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors produced while constructing or mutating envelopes and routes.
#[derive(Error, Debug, Clone)]
pub enum CoreError {
    /// A route index was out of bounds for the route's actor list.
    #[error("route index {current} out of bounds for {len} actors")]
    RouteIndexOutOfBounds { current: usize, len: usize },

    /// A reserved actor name appeared in a user-configured route.
    #[error("actor name '{name}' is reserved and cannot appear in a user-configured route")]
    ReservedActorName { name: String },

    /// A progress update tried to rewrite the immutable route prefix.
    #[error("progress update actors list (len {reported_len}) is shorter than the immutable prefix (len {prefix_len})")]
    PrefixRewriteRejected {
        reported_len: usize,
        prefix_len: usize,
    },

    /// An attempt was made to mutate a terminal envelope.
    #[error("envelope '{id}' is already terminal with status {status}")]
    AlreadyTerminal { id: String, status: String },

    /// The envelope id was empty or otherwise malformed.
    #[error("envelope id must be non-empty and must not contain '/'")]
    InvalidEnvelopeId,
}

impl CoreError {
    /// Creates a route-index-out-of-bounds error.
    pub fn route_index_out_of_bounds(current: usize, len: usize) -> Self {
        Self::RouteIndexOutOfBounds { current, len }
    }

    /// Creates a reserved-actor-name error.
    pub fn reserved_actor_name(name: impl Into<String>) -> Self {
        Self::ReservedActorName { name: name.into() }
    }

    /// Creates a prefix-rewrite-rejected error.
    pub fn prefix_rewrite_rejected(reported_len: usize, prefix_len: usize) -> Self {
        Self::PrefixRewriteRejected {
            reported_len,
            prefix_len,
        }
    }

    /// Creates an already-terminal error.
    pub fn already_terminal(id: impl Into<String>, status: impl Into<String>) -> Self {
        Self::AlreadyTerminal {
            id: id.into(),
            status: status.into(),
        }
    }

    /// Returns true if this error is a client-caused validation failure
    /// (as opposed to a structural/internal failure).
    pub fn is_validation_error(&self) -> bool {
        matches!(
            self,
            CoreError::RouteIndexOutOfBounds { .. }
                | CoreError::ReservedActorName { .. }
                | CoreError::PrefixRewriteRejected { .. }
                | CoreError::InvalidEnvelopeId
        )
    }

    /// Returns a short category tag, useful as a structured log/metric field.
    pub fn category(&self) -> &'static str {
        match self {
            CoreError::RouteIndexOutOfBounds { .. } => "route_bounds",
            CoreError::ReservedActorName { .. } => "reserved_name",
            CoreError::PrefixRewriteRejected { .. } => "prefix_rewrite",
            CoreError::AlreadyTerminal { .. } => "already_terminal",
            CoreError::InvalidEnvelopeId => "invalid_id",
        }
    }
}
