//! Step 4: reconcile the shared runtime-script delivery object — a single
//! `ConfigMap` per namespace, never owned by any individual `AsyncActor`,
//! that every actor's runtime container mounts the launcher script from.

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::ConfigMap;
use kube::api::{Api, ObjectMeta, Patch, PatchParams};
use kube::Client;

use crate::error::OperatorResult;

pub const RUNTIME_SCRIPT_CONFIGMAP_NAME: &str = "asya-runtime-script";
pub const RUNTIME_SCRIPT_KEY: &str = "asya_runtime.py";
const FIELD_MANAGER: &str = "asya-operator";

pub fn build_runtime_script_configmap(namespace: &str, script_contents: &str) -> ConfigMap {
    let mut data = BTreeMap::new();
    data.insert(RUNTIME_SCRIPT_KEY.to_string(), script_contents.to_string());

    ConfigMap {
        metadata: ObjectMeta {
            name: Some(RUNTIME_SCRIPT_CONFIGMAP_NAME.to_string()),
            namespace: Some(namespace.to_string()),
            ..Default::default()
        },
        data: Some(data),
        ..Default::default()
    }
}

/// Creates or updates the namespace-wide runtime-script `ConfigMap` via
/// server-side apply. Idempotent: re-applying identical contents is a
/// no-op on the apiserver side.
pub async fn reconcile_runtime_script(
    client: Client,
    namespace: &str,
    script_contents: &str,
) -> OperatorResult<ConfigMap> {
    let api: Api<ConfigMap> = Api::namespaced(client, namespace);
    let desired = build_runtime_script_configmap(namespace, script_contents);
    Ok(api
        .patch(
            RUNTIME_SCRIPT_CONFIGMAP_NAME,
            &PatchParams::apply(FIELD_MANAGER),
            &Patch::Apply(&desired),
        )
        .await?)
}
