//! Finalizer add/remove, grounded on the ytdl-operator's merge-patch
//! finalizer helpers.

use kube::api::{Patch, PatchParams};
use kube::{Api, Client};
use serde_json::{json, Value};

use crate::crd::AsyncActor;
use crate::error::OperatorResult;

pub const FINALIZER: &str = "asya.sh/finalizer";

pub fn has_finalizer(actor: &AsyncActor) -> bool {
    actor
        .metadata
        .finalizers
        .as_ref()
        .is_some_and(|finalizers| finalizers.iter().any(|f| f == FINALIZER))
}

/// Adds the finalizer if absent. A no-op if it's already present.
pub async fn add(client: Client, name: &str, namespace: &str) -> OperatorResult<AsyncActor> {
    let api: Api<AsyncActor> = Api::namespaced(client, namespace);
    let patch: Value = json!({
        "metadata": {
            "finalizers": [FINALIZER]
        }
    });
    let patch: Patch<&Value> = Patch::Merge(&patch);
    Ok(api.patch(name, &PatchParams::default(), &patch).await?)
}

/// Removes the finalizer. A no-op if it's already absent.
pub async fn remove(client: Client, name: &str, namespace: &str) -> OperatorResult<AsyncActor> {
    let api: Api<AsyncActor> = Api::namespaced(client, namespace);
    let patch: Value = json!({
        "metadata": {
            "finalizers": null
        }
    });
    let patch: Patch<&Value> = Patch::Merge(&patch);
    Ok(api.patch(name, &PatchParams::default(), &patch).await?)
}
