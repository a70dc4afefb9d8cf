//! Error type for the sidecar router.

use thiserror::Error;

/// Result type alias for sidecar router operations.
pub type SidecarResult<T> = Result<T, SidecarError>;

/// Errors produced while routing a single envelope.
#[derive(Error, Debug)]
pub enum SidecarError {
    /// The envelope's deadline had already passed before dispatch.
    #[error("envelope '{id}' deadline already passed before dispatch")]
    DeadlineExpiredBeforeDispatch { id: String },

    /// The runtime bridge reported a failure or the dispatch itself failed.
    #[error("runtime bridge error for envelope '{id}': {source}")]
    RuntimeBridge {
        id: String,
        #[source]
        source: asya_runtime_bridge::BridgeError,
    },

    /// The runtime reported an application-level error for this envelope.
    #[error("runtime reported an error for envelope '{id}': {message}")]
    RuntimeReportedError { id: String, message: String },

    /// Publishing a downstream envelope failed.
    #[error("failed to publish envelope '{id}' to actor '{actor_name}'")]
    Publish {
        id: String,
        actor_name: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Core route/envelope validation failed (e.g. prefix rewrite rejected).
    #[error(transparent)]
    Core(#[from] asya_core::CoreError),

    /// Configuration was missing a required field or otherwise malformed.
    #[error("sidecar configuration error: {0}")]
    Config(String),
}

impl SidecarError {
    /// True if this failure should route the envelope to `error-end`
    /// rather than simply being retried at the transport level.
    pub fn routes_to_error_end(&self) -> bool {
        !matches!(self, SidecarError::Publish { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deadline_and_runtime_errors_route_to_error_end() {
        let err = SidecarError::DeadlineExpiredBeforeDispatch { id: "e1".into() };
        assert!(err.routes_to_error_end());
    }

    #[test]
    fn publish_failures_do_not_route_to_error_end() {
        let err = SidecarError::Publish {
            id: "e1".into(),
            actor_name: "summarize".into(),
            source: "boom".into(),
        };
        assert!(!err.routes_to_error_end());
    }
}
