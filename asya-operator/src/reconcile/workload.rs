//! Step 5: reconcile the owned `Deployment` — inject the sidecar
//! container, reserved volumes, the runtime command, and propagate user
//! labels, while leaving `spec.replicas` untouched so the autoscaler is the
//! only writer of that field.

use std::collections::BTreeMap;

use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{
    ConfigMapVolumeSource, Container, EnvVar, KeyToPath, PodSpec, PodTemplateSpec, Volume, VolumeMount,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
use kube::api::{Api, ObjectMeta, Patch, PatchParams};
use kube::{Client, Resource, ResourceExt};

use asya_core::reserved::{
    RUNTIME_CONTAINER_NAME, RUNTIME_SCRIPT_MOUNT_PATH, SIDECAR_CONTAINER_NAME, SOCKET_MOUNT_PATH,
};

use crate::config::OperatorConfig;
use crate::crd::AsyncActor;
use crate::error::{OperatorError, OperatorResult};
use crate::labels::propagate_labels;
use crate::reconcile::runtime_script::RUNTIME_SCRIPT_CONFIGMAP_NAME;

const FIELD_MANAGER: &str = "asya-operator";
const VOLUME_SOCKET_DIR: &str = "socket-dir";
const VOLUME_TMP: &str = "tmp";
const VOLUME_RUNTIME_SCRIPT: &str = "asya-runtime";
const RUNTIME_SCRIPT_DIR: &str = "/opt/asya";

/// Builds the desired `Deployment` for `actor`, without setting
/// `spec.replicas` — the caller is responsible for leaving that field out
/// of whatever gets sent to the apiserver, so the autoscaler remains the
/// sole writer of replica count.
pub fn build_workload(actor: &AsyncActor, config: &OperatorConfig, queue_name: &str) -> OperatorResult<Deployment> {
    let namespace = actor.namespace().unwrap_or_else(|| "default".to_string());
    let mut pod_spec = actor
        .spec
        .template
        .spec
        .clone()
        .ok_or_else(|| OperatorError::missing_runtime_container(RUNTIME_CONTAINER_NAME, 0))?;

    inject_runtime_command(&mut pod_spec, config)?;
    inject_sidecar(&mut pod_spec, actor, config, queue_name);
    inject_reserved_volumes(&mut pod_spec);

    let mut managed_labels = BTreeMap::new();
    managed_labels.insert("asya.sh/actor".to_string(), actor.name_any());
    managed_labels.insert("app.kubernetes.io/managed-by".to_string(), "asya-operator".to_string());

    let user_labels: BTreeMap<String, String> = actor
        .spec
        .template
        .metadata
        .labels
        .clone()
        .unwrap_or_default()
        .into_iter()
        .collect();
    let labels = propagate_labels(&user_labels, &managed_labels);

    let selector_labels: BTreeMap<String, String> =
        [("asya.sh/actor".to_string(), actor.name_any())].into_iter().collect();

    let owner_ref = actor.controller_owner_ref(&()).ok_or_else(|| {
        OperatorError::config("AsyncActor is missing required fields for an owner reference")
    })?;

    Ok(Deployment {
        metadata: ObjectMeta {
            name: Some(actor.name_any()),
            namespace: Some(namespace),
            labels: Some(labels.clone()),
            owner_references: Some(vec![owner_ref]),
            ..Default::default()
        },
        spec: Some(DeploymentSpec {
            selector: LabelSelector {
                match_labels: Some(selector_labels),
                ..Default::default()
            },
            template: PodTemplateSpec {
                metadata: ObjectMeta {
                    labels: Some(labels),
                    ..Default::default()
                },
                spec: Some(pod_spec),
            },
            replicas: None,
            ..Default::default()
        }),
        status: None,
    })
}

fn inject_runtime_command(pod_spec: &mut PodSpec, config: &OperatorConfig) -> OperatorResult<()> {
    let runtime = pod_spec
        .containers
        .iter_mut()
        .find(|c| c.name == RUNTIME_CONTAINER_NAME)
        .ok_or_else(|| OperatorError::missing_runtime_container(RUNTIME_CONTAINER_NAME, 0))?;
    runtime.command = Some(vec![
        config.sidecar.runtime_python_path.clone(),
        RUNTIME_SCRIPT_MOUNT_PATH.to_string(),
    ]);
    runtime.volume_mounts.get_or_insert_with(Vec::new).extend([
        VolumeMount {
            name: VOLUME_SOCKET_DIR.to_string(),
            mount_path: SOCKET_MOUNT_PATH.to_string(),
            ..Default::default()
        },
        VolumeMount {
            name: VOLUME_TMP.to_string(),
            mount_path: "/tmp".to_string(),
            ..Default::default()
        },
        VolumeMount {
            name: VOLUME_RUNTIME_SCRIPT.to_string(),
            mount_path: RUNTIME_SCRIPT_DIR.to_string(),
            read_only: Some(true),
            ..Default::default()
        },
    ]);
    Ok(())
}

fn inject_sidecar(pod_spec: &mut PodSpec, actor: &AsyncActor, config: &OperatorConfig, queue_name: &str) {
    pod_spec.containers.retain(|c| c.name != SIDECAR_CONTAINER_NAME);
    pod_spec.containers.push(Container {
        name: SIDECAR_CONTAINER_NAME.to_string(),
        image: Some(config.sidecar.image.clone()),
        env: Some(vec![
            EnvVar {
                name: "ASYA_TRANSPORT".to_string(),
                value: Some(actor.spec.transport.clone()),
                ..Default::default()
            },
            EnvVar {
                name: "ASYA_SOCKET_DIR".to_string(),
                value: Some(SOCKET_MOUNT_PATH.to_string()),
                ..Default::default()
            },
            EnvVar {
                name: "ASYA_ENABLE_VALIDATION".to_string(),
                value: Some("true".to_string()),
                ..Default::default()
            },
            EnvVar {
                name: "ASYA_ACTOR_QUEUE".to_string(),
                value: Some(queue_name.to_string()),
                ..Default::default()
            },
        ]),
        volume_mounts: Some(vec![
            VolumeMount {
                name: VOLUME_SOCKET_DIR.to_string(),
                mount_path: SOCKET_MOUNT_PATH.to_string(),
                ..Default::default()
            },
            VolumeMount {
                name: VOLUME_TMP.to_string(),
                mount_path: "/tmp".to_string(),
                ..Default::default()
            },
        ]),
        ..Default::default()
    });
}

fn inject_reserved_volumes(pod_spec: &mut PodSpec) {
    let volumes = pod_spec.volumes.get_or_insert_with(Vec::new);
    volumes.retain(|v| {
        v.name != VOLUME_SOCKET_DIR && v.name != VOLUME_TMP && v.name != VOLUME_RUNTIME_SCRIPT
    });
    volumes.push(Volume {
        name: VOLUME_SOCKET_DIR.to_string(),
        empty_dir: Some(Default::default()),
        ..Default::default()
    });
    volumes.push(Volume {
        name: VOLUME_TMP.to_string(),
        empty_dir: Some(Default::default()),
        ..Default::default()
    });
    volumes.push(Volume {
        name: VOLUME_RUNTIME_SCRIPT.to_string(),
        config_map: Some(ConfigMapVolumeSource {
            name: RUNTIME_SCRIPT_CONFIGMAP_NAME.to_string(),
            items: Some(vec![KeyToPath {
                key: crate::reconcile::runtime_script::RUNTIME_SCRIPT_KEY.to_string(),
                path: "asya_runtime.py".to_string(),
                ..Default::default()
            }]),
            ..Default::default()
        }),
        ..Default::default()
    });
}

/// Applies `desired` server-side. `desired.spec.replicas` is always `None`
/// (see [`build_workload`]), so this never forwards a replica-count change
/// — the autoscaler is the only writer of that field at runtime.
pub async fn reconcile_workload(client: Client, desired: &Deployment) -> OperatorResult<Deployment> {
    let name = desired
        .metadata
        .name
        .clone()
        .ok_or_else(|| OperatorError::config("desired workload is missing a name"))?;
    let namespace = desired
        .metadata
        .namespace
        .clone()
        .ok_or_else(|| OperatorError::config("desired workload is missing a namespace"))?;
    let api: Api<Deployment> = Api::namespaced(client, &namespace);
    Ok(api
        .patch(&name, &PatchParams::apply(FIELD_MANAGER), &Patch::Apply(desired))
        .await?)
}
