//! Reserved identifiers shared by the sidecar, gateway, and operator.
//!
//! This is the single point of coupling called out in the design notes:
//! every layer that validates or injects one of these names reads it from
//! here instead of re-declaring its own copy.

/// The actor name a sidecar publishes to when an envelope finishes its
/// user-defined route successfully.
pub const HAPPY_END: &str = "happy-end";

/// The actor name a sidecar publishes to when a runtime error or deadline
/// expiry terminates an envelope.
pub const ERROR_END: &str = "error-end";

/// Both reserved actor names, in the order they occupy the final two route
/// positions.
pub const TERMINAL_ACTORS: [&str; 2] = [HAPPY_END, ERROR_END];

/// The sidecar's own container name, injected by the operator and never
/// user-configurable.
pub const SIDECAR_CONTAINER_NAME: &str = "asya-sidecar";

/// The user container name the operator expects to find exactly one of.
pub const RUNTIME_CONTAINER_NAME: &str = "asya-runtime";

/// Reserved volume names injected by the operator.
pub const RESERVED_VOLUME_NAMES: [&str; 3] = ["socket-dir", "tmp", "asya-runtime"];

/// Reserved mount path for the sidecar's local stream socket.
pub const SOCKET_MOUNT_PATH: &str = "/var/run/asya";

/// Reserved mount path for the shared runtime script.
pub const RUNTIME_SCRIPT_MOUNT_PATH: &str = "/opt/asya/asya_runtime.py";

/// Environment variables reserved for operator injection; a user template
/// that sets one of these directly is rejected during validation.
pub const RESERVED_ENV_VARS: [&str; 8] = [
    "ASYA_TRANSPORT",
    "ASYA_SOCKET_DIR",
    "ASYA_ENABLE_VALIDATION",
    "ASYA_RABBITMQ_HOST",
    "ASYA_RABBITMQ_PORT",
    "ASYA_AWS_REGION",
    "ASYA_SQS_ENDPOINT",
    "ASYA_SQS_QUEUE_URL",
];

/// Environment variables a user template is explicitly allowed to set even
/// though they share the `ASYA_` prefix with reserved names.
pub const ALLOWED_USER_ENV_VARS: [&str; 2] = ["ASYA_HANDLER", "ASYA_HANDLER_MODE"];

/// Label key prefixes reserved for operator-managed labels. User labels
/// using one of these prefixes are rejected, except for the one name
/// carved out in [`ALLOWED_RESERVED_PREFIX_LABEL`].
pub const RESERVED_LABEL_PREFIXES: [&str; 4] = [
    "app.kubernetes.io/",
    "asya.sh/",
    "keda.sh/",
    "kubernetes.io/",
];

/// The one label under a reserved prefix that user templates may still set.
pub const ALLOWED_RESERVED_PREFIX_LABEL: &str = "app.kubernetes.io/managed-by";

/// Returns true if `name` is one of the reserved terminal actor names.
pub fn is_terminal_actor(name: &str) -> bool {
    TERMINAL_ACTORS.contains(&name)
}

/// Returns true if `var` is a reserved environment variable name, i.e. one
/// the operator injects and a user template must not set itself.
pub fn is_reserved_env_var(var: &str) -> bool {
    RESERVED_ENV_VARS.contains(&var) && !ALLOWED_USER_ENV_VARS.contains(&var)
}

/// Returns true if `volume` collides with a reserved volume name.
pub fn is_reserved_volume_name(volume: &str) -> bool {
    RESERVED_VOLUME_NAMES.contains(&volume)
}

/// Returns true if `mount_path` collides with a path the operator mounts
/// into the runtime container itself (the sidecar socket directory or the
/// runtime script), i.e. a user template must not claim it.
pub fn is_reserved_mount_path(mount_path: &str) -> bool {
    mount_path == SOCKET_MOUNT_PATH || mount_path == RUNTIME_SCRIPT_MOUNT_PATH
}

/// Returns the reserved prefix `label` violates, if any. A label exactly
/// equal to [`ALLOWED_RESERVED_PREFIX_LABEL`] never violates.
pub fn reserved_label_prefix_violation(label: &str) -> Option<&'static str> {
    if label == ALLOWED_RESERVED_PREFIX_LABEL {
        return None;
    }
    RESERVED_LABEL_PREFIXES
        .iter()
        .find(|prefix| label.starts_with(**prefix))
        .copied()
}
