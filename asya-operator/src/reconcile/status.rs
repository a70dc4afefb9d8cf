//! Step 8: observe live cluster state for an actor, classify it, and write
//! the result back onto `AsyncActor.status` with optimistic-concurrency
//! retry — grounded on the `patch_status`-with-closure pattern in
//! `ytdl-operator`'s executor action module.

use std::time::Duration;

use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Pod;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{Condition, Time};
use kube::api::{Api, ListParams, Patch, PatchParams};
use kube::{Client, Resource, ResourceExt};
use rand::Rng;
use serde_json::json;

use crate::crd::{condition_types, AsyncActor, AsyncActorStatus, LastScaleEvent, ReplicaCounts};
use crate::error::{OperatorError, OperatorResult};
use crate::status::{classify, ActorStatus, ObservedState};

const FIELD_MANAGER: &str = "asya-operator";
const MAX_STATUS_RETRIES: u32 = 5;
const CRASH_LOOP_REASON: &str = "CrashLoopBackOff";

/// Everything this step needs beyond what it reads straight off the live
/// `Deployment`/`Pod` objects.
pub struct StatusInputs {
    pub transport_ready: bool,
    pub scaling_enabled: bool,
    pub scaling_ready: bool,
    pub last_scale_event: Option<LastScaleEvent>,
}

/// Reads the owned `Deployment` and its pods and folds them, together with
/// `inputs`, into an [`ObservedState`] snapshot.
pub async fn gather_observed_state(
    client: Client,
    actor: &AsyncActor,
    inputs: &StatusInputs,
) -> OperatorResult<ObservedState> {
    let namespace = actor.namespace().unwrap_or_else(|| "default".to_string());
    let name = actor.name_any();

    let deployments: Api<Deployment> = Api::namespaced(client.clone(), &namespace);
    let deployment = deployments.get_opt(&name).await?;

    let (workload_ready, workload_ready_message, desired, total, ready) = match &deployment {
        None => (false, Some("workload not yet created".to_string()), 0, 0, 0),
        Some(deployment) => {
            let status = deployment.status.clone().unwrap_or_default();
            let desired = deployment
                .spec
                .as_ref()
                .and_then(|s| s.replicas)
                .unwrap_or(status.replicas.unwrap_or(0));
            let total = status.replicas.unwrap_or(0);
            let ready = status.ready_replicas.unwrap_or(0);
            let available = status
                .conditions
                .iter()
                .flatten()
                .find(|c| c.type_ == "Available")
                .map(|c| c.status == "True")
                .unwrap_or(false);
            let message = status
                .conditions
                .iter()
                .flatten()
                .find(|c| c.type_ == "Available" && c.status != "True")
                .and_then(|c| c.message.clone());
            (available || ready > 0, message, desired, total, ready)
        }
    };

    let pods: Api<Pod> = Api::namespaced(client, &namespace);
    let pod_list = pods
        .list(&ListParams::default().labels(&format!("asya.sh/actor={name}")))
        .await?;

    let mut failing_pods = 0;
    let mut crashlooping_container = None;
    for pod in &pod_list.items {
        let statuses = pod
            .status
            .as_ref()
            .and_then(|s| s.container_statuses.as_ref())
            .cloned()
            .unwrap_or_default();
        let mut pod_failing = false;
        for container_status in statuses {
            if let Some(waiting) = container_status.state.as_ref().and_then(|s| s.waiting.as_ref()) {
                if waiting.reason.as_deref() == Some(CRASH_LOOP_REASON) {
                    pod_failing = true;
                    crashlooping_container.get_or_insert(container_status.name.clone());
                }
            }
        }
        if pod_failing {
            failing_pods += 1;
        }
    }

    Ok(ObservedState {
        deletion_timestamp_set: actor.meta().deletion_timestamp.is_some(),
        observed_generation: actor.meta().generation.unwrap_or(0),
        transport_ready: inputs.transport_ready,
        workload_ready,
        workload_ready_message,
        crashlooping_container,
        scaling_enabled: inputs.scaling_enabled,
        scaling_ready: inputs.scaling_ready,
        failing_pods,
        ready,
        desired,
        total,
        last_scale_event_age: inputs
            .last_scale_event
            .as_ref()
            .map(|e| (chrono::Utc::now() - e.time).to_std().unwrap_or(Duration::ZERO)),
    })
}

fn build_conditions(observed: &ObservedState, status: ActorStatus) -> Vec<Condition> {
    let now = Time(chrono::Utc::now());
    let bool_status = |ok: bool| if ok { "True" } else { "False" }.to_string();
    vec![
        Condition {
            type_: condition_types::TRANSPORT_READY.to_string(),
            status: bool_status(observed.transport_ready),
            reason: status.to_string(),
            message: String::new(),
            last_transition_time: now.clone(),
            observed_generation: Some(observed.observed_generation),
        },
        Condition {
            type_: condition_types::WORKLOAD_READY.to_string(),
            status: bool_status(observed.workload_ready),
            reason: status.to_string(),
            message: observed.workload_ready_message.clone().unwrap_or_default(),
            last_transition_time: now.clone(),
            observed_generation: Some(observed.observed_generation),
        },
        Condition {
            type_: condition_types::SCALING_READY.to_string(),
            status: bool_status(!observed.scaling_enabled || observed.scaling_ready),
            reason: status.to_string(),
            message: String::new(),
            last_transition_time: now,
            observed_generation: Some(observed.observed_generation),
        },
    ]
}

fn build_status(observed: &ObservedState, last_scale_event: Option<LastScaleEvent>) -> AsyncActorStatus {
    let status = classify(observed);
    AsyncActorStatus {
        observed_generation: observed.observed_generation,
        status: status.to_string(),
        conditions: build_conditions(observed, status),
        replicas: ReplicaCounts {
            desired: observed.desired,
            ready: observed.ready,
            total: observed.total,
            failing: observed.failing_pods,
        },
        last_scale_event,
    }
}

/// Writes the classified status onto `AsyncActor.status`, retrying on
/// update conflicts with a small jittered backoff. Bounded at
/// `MAX_STATUS_RETRIES` attempts so a persistently contested resource fails
/// the reconcile loudly instead of retrying forever.
pub async fn reconcile_status(
    client: Client,
    actor: &AsyncActor,
    observed: &ObservedState,
    last_scale_event: Option<LastScaleEvent>,
) -> OperatorResult<AsyncActor> {
    let namespace = actor.namespace().unwrap_or_else(|| "default".to_string());
    let name = actor.name_any();
    let api: Api<AsyncActor> = Api::namespaced(client, &namespace);
    let desired_status = build_status(observed, last_scale_event);

    let mut attempt = 0;
    loop {
        let patch = json!({ "status": desired_status });
        match api
            .patch_status(&name, &PatchParams::apply(FIELD_MANAGER), &Patch::Merge(&patch))
            .await
        {
            Ok(updated) => return Ok(updated),
            Err(kube::Error::Api(err)) if err.code == 409 && attempt < MAX_STATUS_RETRIES => {
                attempt += 1;
                let jitter_ms: u32 = rand::thread_rng().gen_range(10..100) * attempt;
                tokio::time::sleep(Duration::from_millis(jitter_ms as u64)).await;
                continue;
            }
            Err(kube::Error::Api(err)) if err.code == 409 => {
                return Err(OperatorError::StatusConflictRetriesExhausted { name });
            }
            Err(err) => return Err(err.into()),
        }
    }
}
