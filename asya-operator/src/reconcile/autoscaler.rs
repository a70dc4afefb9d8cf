//! Step 6: reconcile the external autoscaler (KEDA `ScaledObject`) that
//! targets the owned workload and observes queue length.
//!
//! KEDA's CRD is installed and owned by a different operator entirely, so
//! this talks to it through `kube::core::DynamicObject` + `ApiResource`
//! rather than a `#[derive(CustomResource)]` type this crate would have to
//! own and keep in lockstep with KEDA's schema.

use kube::api::{Api, ApiResource, DeleteParams, DynamicObject, GroupVersionKind, Patch, PatchParams};
use kube::{Client, Resource, ResourceExt};
use serde_json::{json, Value};

use crate::config::TransportKindTag;
use crate::crd::{AsyncActor, ScalingSpec};
use crate::error::{OperatorError, OperatorResult};

const FIELD_MANAGER: &str = "asya-operator";
pub const SCALED_OBJECT_GROUP: &str = "keda.sh";
pub const SCALED_OBJECT_VERSION: &str = "v1alpha1";
pub const SCALED_OBJECT_KIND: &str = "ScaledObject";

fn api_resource() -> ApiResource {
    ApiResource::from_gvk(&GroupVersionKind::gvk(
        SCALED_OBJECT_GROUP,
        SCALED_OBJECT_VERSION,
        SCALED_OBJECT_KIND,
    ))
}

/// Builds the KEDA trigger block for the actor's queue, per transport kind.
fn build_trigger(kind: TransportKindTag, queue_name: &str, queue_length: i32) -> Value {
    match kind {
        TransportKindTag::Amqp => json!({
            "type": "rabbitmq",
            "metadata": {
                "queueName": queue_name,
                "queueLength": queue_length.to_string(),
            },
        }),
        TransportKindTag::CloudQueue => json!({
            "type": "aws-sqs-queue",
            "metadata": {
                "queueURL": queue_name,
                "queueLength": queue_length.to_string(),
            },
        }),
    }
}

/// Builds the desired `ScaledObject` for `actor`. Returns `None` if scaling
/// is not enabled, in which case the caller should delete any existing one.
pub fn build_scaled_object(
    actor: &AsyncActor,
    scaling: &ScalingSpec,
    transport_kind: TransportKindTag,
    queue_name: &str,
) -> OperatorResult<DynamicObject> {
    let name = actor.name_any();
    let namespace = actor
        .namespace()
        .ok_or_else(|| OperatorError::config("AsyncActor is missing a namespace"))?;

    let mut trigger = build_trigger(transport_kind, queue_name, scaling.queue_length);
    let mut scaling_modifiers = Value::Null;
    if let Some(advanced) = &scaling.advanced {
        if let Some(metric_type) = &advanced.metric_type {
            trigger["metricType"] = json!(metric_type);
        }
        if advanced.formula.is_some() || advanced.target.is_some() {
            scaling_modifiers = json!({
                "formula": advanced.formula,
                "target": advanced.target,
            });
        }
    }

    let mut spec = json!({
        "scaleTargetRef": { "name": name },
        "minReplicaCount": scaling.min_replicas,
        "maxReplicaCount": scaling.max_replicas,
        "pollingInterval": scaling.polling_interval_seconds,
        "cooldownPeriod": scaling.cooldown_period_seconds,
        "triggers": [trigger],
    });
    if !scaling_modifiers.is_null() {
        spec["advanced"] = json!({ "scalingModifiers": scaling_modifiers });
    }

    let owner_ref = actor
        .controller_owner_ref(&())
        .ok_or_else(|| OperatorError::config("AsyncActor is missing required fields for an owner reference"))?;

    let mut object = DynamicObject::new(&name, &api_resource());
    object.metadata.namespace = Some(namespace);
    object.metadata.owner_references = Some(vec![owner_ref]);
    object.data = json!({ "spec": spec });
    Ok(object)
}

/// Applies the desired `ScaledObject` when scaling is enabled, or deletes
/// any previously-created one when it's been turned off.
pub async fn reconcile_autoscaler(
    client: Client,
    actor: &AsyncActor,
    scaling: Option<&ScalingSpec>,
    transport_kind: TransportKindTag,
    queue_name: &str,
) -> OperatorResult<()> {
    let namespace = actor
        .namespace()
        .ok_or_else(|| OperatorError::config("AsyncActor is missing a namespace"))?;
    let api: Api<DynamicObject> = Api::namespaced_with(client, &namespace, &api_resource());

    match scaling {
        Some(scaling) if scaling.enabled => {
            let desired = build_scaled_object(actor, scaling, transport_kind, queue_name)?;
            api.patch(
                &actor.name_any(),
                &PatchParams::apply(FIELD_MANAGER),
                &Patch::Apply(&desired),
            )
            .await?;
        }
        _ => {
            let _ = api.delete(&actor.name_any(), &DeleteParams::default()).await;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::AsyncActorSpec;
    use k8s_openapi::api::core::v1::PodTemplateSpec;

    fn actor() -> AsyncActor {
        let mut actor = AsyncActor::new(
            "summarize",
            AsyncActorSpec {
                transport: "primary".into(),
                template: PodTemplateSpec::default(),
                replicas: None,
                scaling: None,
            },
        );
        actor.meta_mut().namespace = Some("default".to_string());
        actor.meta_mut().uid = Some("abc-123".to_string());
        actor
    }

    fn scaling() -> ScalingSpec {
        ScalingSpec {
            enabled: true,
            queue_length: 5,
            min_replicas: 0,
            max_replicas: 10,
            polling_interval_seconds: Some(15),
            cooldown_period_seconds: Some(60),
            advanced: None,
        }
    }

    #[test]
    fn amqp_trigger_uses_rabbitmq_type() {
        let trigger = build_trigger(TransportKindTag::Amqp, "summarize", 5);
        assert_eq!(trigger["type"], "rabbitmq");
        assert_eq!(trigger["metadata"]["queueName"], "summarize");
    }

    #[test]
    fn cloud_queue_trigger_uses_aws_sqs_type() {
        let trigger = build_trigger(TransportKindTag::CloudQueue, "asya-ns-summarize", 5);
        assert_eq!(trigger["type"], "aws-sqs-queue");
    }

    #[test]
    fn scaled_object_carries_replica_bounds() {
        let object = build_scaled_object(&actor(), &scaling(), TransportKindTag::Amqp, "summarize").unwrap();
        assert_eq!(object.data["spec"]["minReplicaCount"], 0);
        assert_eq!(object.data["spec"]["maxReplicaCount"], 10);
    }

    #[test]
    fn advanced_formula_is_carried_through() {
        let mut scaling = scaling();
        scaling.advanced = Some(crate::crd::ScalingAdvanced {
            formula: Some("queueLength / 2".into()),
            target: Some("5".into()),
            metric_type: None,
        });
        let object = build_scaled_object(&actor(), &scaling, TransportKindTag::Amqp, "summarize").unwrap();
        assert_eq!(
            object.data["spec"]["advanced"]["scalingModifiers"]["formula"],
            "queueLength / 2"
        );
    }
}
