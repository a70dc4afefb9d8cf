//! Error type for the operator, following the same shape as every other
//! crate in the workspace: struct-style `thiserror` variants, a retryable
//! predicate, and a category tag for log fields.

use thiserror::Error;

/// Result type alias for operator reconcile operations.
pub type OperatorResult<T> = Result<T, OperatorError>;

#[derive(Error, Debug)]
pub enum OperatorError {
    /// Any failure from the Kubernetes API.
    #[error("kubernetes api error: {source}")]
    Kube {
        #[from]
        source: kube::Error,
    },

    /// A reserved actor name appeared in a route derived from the resource.
    #[error("actor name '{name}' is reserved and cannot be used as a resource name")]
    ReservedActorName { name: String },

    /// The user's container list used the operator's reserved sidecar name.
    #[error("container named '{name}' is reserved for the operator-injected sidecar")]
    ReservedContainerName { name: String },

    /// The template didn't contain exactly one runtime container.
    #[error("workload template must contain exactly one container named '{expected}', found {found}")]
    MissingRuntimeContainer { expected: String, found: usize },

    /// The user overrode the command on the runtime container.
    #[error("runtime container command must not be overridden")]
    RuntimeContainerCommandOverridden,

    /// A user template set a reserved environment variable.
    #[error("reserved environment variable '{name}' set by user template")]
    ReservedEnvVar { name: String },

    /// A user template declared a reserved volume name.
    #[error("reserved volume name '{name}' used by user template")]
    ReservedVolumeName { name: String },

    /// A user template mounted a container volume at a path the operator
    /// reserves for the sidecar socket or runtime script.
    #[error("reserved mount path '{path}' used by user template")]
    ReservedMountPath { path: String },

    /// A user label used a reserved prefix.
    #[error("label '{label}' uses reserved prefix '{prefix}'")]
    ReservedLabelPrefix { label: String, prefix: String },

    /// The spec referenced a transport not present in the operator's config.
    #[error("unknown transport '{name}' referenced by actor")]
    UnknownTransport { name: String },

    /// Auto-create is off and the named queue does not exist.
    #[error("transport queue '{queue}' does not exist and auto-create is disabled")]
    QueueMissing { queue: String },

    /// Optimistic-concurrency status update retries were exhausted.
    #[error("status update conflict exceeded retry budget for '{name}'")]
    StatusConflictRetriesExhausted { name: String },

    /// Operator configuration was missing a required field or malformed.
    #[error("operator configuration error: {message}")]
    Config { message: String },

    /// A transport adapter call (declare/exists/delete queue) failed.
    #[error("transport error managing queue '{queue}': {source}")]
    Transport {
        queue: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl OperatorError {
    pub fn reserved_actor_name(name: impl Into<String>) -> Self {
        Self::ReservedActorName { name: name.into() }
    }

    pub fn reserved_container_name(name: impl Into<String>) -> Self {
        Self::ReservedContainerName { name: name.into() }
    }

    pub fn missing_runtime_container(expected: impl Into<String>, found: usize) -> Self {
        Self::MissingRuntimeContainer {
            expected: expected.into(),
            found,
        }
    }

    pub fn reserved_env_var(name: impl Into<String>) -> Self {
        Self::ReservedEnvVar { name: name.into() }
    }

    pub fn reserved_volume_name(name: impl Into<String>) -> Self {
        Self::ReservedVolumeName { name: name.into() }
    }

    pub fn reserved_mount_path(path: impl Into<String>) -> Self {
        Self::ReservedMountPath { path: path.into() }
    }

    pub fn reserved_label_prefix(label: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self::ReservedLabelPrefix {
            label: label.into(),
            prefix: prefix.into(),
        }
    }

    pub fn unknown_transport(name: impl Into<String>) -> Self {
        Self::UnknownTransport { name: name.into() }
    }

    pub fn queue_missing(queue: impl Into<String>) -> Self {
        Self::QueueMissing { queue: queue.into() }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// True if the validation failure is caused by the user's resource
    /// rather than cluster/transport state, so callers can pick a condition
    /// reason without re-matching on variants.
    pub fn is_validation_error(&self) -> bool {
        matches!(
            self,
            OperatorError::ReservedActorName { .. }
                | OperatorError::ReservedContainerName { .. }
                | OperatorError::MissingRuntimeContainer { .. }
                | OperatorError::RuntimeContainerCommandOverridden
                | OperatorError::ReservedEnvVar { .. }
                | OperatorError::ReservedVolumeName { .. }
                | OperatorError::ReservedMountPath { .. }
                | OperatorError::ReservedLabelPrefix { .. }
                | OperatorError::UnknownTransport { .. }
        )
    }

    pub fn category(&self) -> &'static str {
        match self {
            OperatorError::Kube { .. } => "kube",
            OperatorError::ReservedActorName { .. }
            | OperatorError::ReservedContainerName { .. }
            | OperatorError::MissingRuntimeContainer { .. }
            | OperatorError::RuntimeContainerCommandOverridden
            | OperatorError::ReservedEnvVar { .. }
            | OperatorError::ReservedVolumeName { .. }
            | OperatorError::ReservedMountPath { .. }
            | OperatorError::ReservedLabelPrefix { .. } => "validation",
            OperatorError::UnknownTransport { .. } => "config",
            OperatorError::QueueMissing { .. } => "transport",
            OperatorError::StatusConflictRetriesExhausted { .. } => "status",
            OperatorError::Config { .. } => "config",
            OperatorError::Transport { .. } => "transport",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_errors_are_classified() {
        assert!(OperatorError::reserved_actor_name("happy-end").is_validation_error());
        assert!(OperatorError::reserved_label_prefix("asya.sh/x", "asya.sh/").is_validation_error());
        assert!(!OperatorError::queue_missing("q").is_validation_error());
    }

    #[test]
    fn category_is_stable_per_variant() {
        assert_eq!(OperatorError::queue_missing("q").category(), "transport");
        assert_eq!(OperatorError::unknown_transport("t").category(), "config");
    }
}
