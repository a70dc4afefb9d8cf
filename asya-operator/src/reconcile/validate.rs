//! Step 2: validate the resource before touching the cluster — transport
//! name resolves, reserved names/paths/env vars are absent from the user's
//! template, and the template carries exactly one runtime container with
//! no overridden command.

use asya_core::reserved::{
    is_reserved_env_var, is_reserved_mount_path, is_reserved_volume_name, RUNTIME_CONTAINER_NAME,
    SIDECAR_CONTAINER_NAME,
};

use crate::config::OperatorConfig;
use crate::crd::AsyncActorSpec;
use crate::error::{OperatorError, OperatorResult};
use crate::labels::validate_user_labels;

/// Runs every validation rule against `spec`. Returns the first violation.
pub fn validate(spec: &AsyncActorSpec, config: &OperatorConfig) -> OperatorResult<()> {
    config.resolve_transport(&spec.transport)?;

    if let Some(labels) = spec.template.metadata.labels.as_ref() {
        let labels = labels
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        validate_user_labels(&labels)?;
    }

    let Some(pod_spec) = spec.template.spec.as_ref() else {
        return Err(OperatorError::missing_runtime_container(RUNTIME_CONTAINER_NAME, 0));
    };

    let mut runtime_containers = 0;
    for container in &pod_spec.containers {
        if container.name == SIDECAR_CONTAINER_NAME {
            return Err(OperatorError::reserved_container_name(container.name.clone()));
        }
        if container.name == RUNTIME_CONTAINER_NAME {
            runtime_containers += 1;
            if container.command.is_some() {
                return Err(OperatorError::RuntimeContainerCommandOverridden);
            }
        }
        if let Some(envs) = container.env.as_ref() {
            for var in envs {
                if is_reserved_env_var(&var.name) {
                    return Err(OperatorError::reserved_env_var(var.name.clone()));
                }
            }
        }
        if let Some(mounts) = container.volume_mounts.as_ref() {
            for mount in mounts {
                if is_reserved_mount_path(&mount.mount_path) {
                    return Err(OperatorError::reserved_mount_path(mount.mount_path.clone()));
                }
            }
        }
    }
    if runtime_containers != 1 {
        return Err(OperatorError::missing_runtime_container(
            RUNTIME_CONTAINER_NAME,
            runtime_containers,
        ));
    }

    if let Some(volumes) = pod_spec.volumes.as_ref() {
        for volume in volumes {
            if is_reserved_volume_name(&volume.name) {
                return Err(OperatorError::reserved_volume_name(volume.name.clone()));
            }
        }
    }

    Ok(())
}
