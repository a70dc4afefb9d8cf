//! The `AsyncActor` custom resource: one per actor role in a route,
//! grounded on the mirrord operator's `TargetCrd`/`MirrordOperatorCrd` shape
//! (`CustomResource` + `JsonSchema` derive, typed spec/status split).

use k8s_openapi::api::core::v1::PodTemplateSpec;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Condition;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(CustomResource, Clone, Debug, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "asya.sh",
    version = "v1alpha1",
    kind = "AsyncActor",
    namespaced,
    status = "AsyncActorStatus",
    printcolumn = r#"{"name":"Status", "type":"string", "jsonPath":".status.status"}"#,
    printcolumn = r#"{"name":"Ready", "type":"integer", "jsonPath":".status.replicas.ready"}"#,
    printcolumn = r#"{"name":"Desired", "type":"integer", "jsonPath":".status.replicas.desired"}"#,
    printcolumn = r#"{"name":"Age", "type":"date", "jsonPath":".metadata.creationTimestamp"}"#
)]
pub struct AsyncActorSpec {
    /// Name of the transport in the operator's configured registry.
    pub transport: String,
    /// The pod template the operator injects the sidecar and reserved
    /// volumes/env into. Must contain exactly one container named
    /// `asya-runtime` with no overridden command.
    pub template: PodTemplateSpec,
    /// Manual replica count, used only while `scaling.enabled` is false.
    #[serde(default)]
    pub replicas: Option<i32>,
    #[serde(default)]
    pub scaling: Option<ScalingSpec>,
}

#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct ScalingSpec {
    pub enabled: bool,
    pub queue_length: i32,
    pub min_replicas: i32,
    pub max_replicas: i32,
    #[serde(default)]
    pub polling_interval_seconds: Option<i32>,
    #[serde(default)]
    pub cooldown_period_seconds: Option<i32>,
    #[serde(default)]
    pub advanced: Option<ScalingAdvanced>,
}

/// Escape hatch for autoscaler configurations the base fields can't model.
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct ScalingAdvanced {
    #[serde(default)]
    pub formula: Option<String>,
    #[serde(default)]
    pub target: Option<String>,
    #[serde(default)]
    pub metric_type: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
pub struct AsyncActorStatus {
    #[serde(default)]
    pub observed_generation: i64,
    /// The single human status tag computed by [`crate::status::classify`].
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub conditions: Vec<Condition>,
    #[serde(default)]
    pub replicas: ReplicaCounts,
    #[serde(default)]
    pub last_scale_event: Option<LastScaleEvent>,
}

#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct ReplicaCounts {
    pub desired: i32,
    pub ready: i32,
    pub total: i32,
    pub failing: i32,
}

#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct LastScaleEvent {
    pub direction: ScaleDirection,
    pub time: chrono::DateTime<chrono::Utc>,
}

#[derive(Clone, Copy, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ScaleDirection {
    Up,
    Down,
}

/// Condition types this operator writes onto `status.conditions`.
pub mod condition_types {
    pub const TRANSPORT_READY: &str = "TransportReady";
    pub const WORKLOAD_READY: &str = "WorkloadReady";
    pub const SCALING_READY: &str = "ScalingReady";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spec_round_trips_through_json() {
        let spec = AsyncActorSpec {
            transport: "primary".into(),
            template: PodTemplateSpec::default(),
            replicas: Some(2),
            scaling: None,
        };
        let json = serde_json::to_value(&spec).unwrap();
        let back: AsyncActorSpec = serde_json::from_value(json).unwrap();
        assert_eq!(back.transport, "primary");
        assert_eq!(back.replicas, Some(2));
    }

    #[test]
    fn status_defaults_to_empty_counters() {
        let status = AsyncActorStatus::default();
        assert_eq!(status.replicas, ReplicaCounts::default());
        assert!(status.conditions.is_empty());
    }
}
