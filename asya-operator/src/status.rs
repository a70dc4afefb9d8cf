//! The pure status-priority function: from a plain snapshot of observed
//! cluster state, compute the single `status` tag written to
//! `AsyncActor.status.status`. No I/O, no cluster access — exhaustively
//! table-tested against every scenario without a cluster.

use std::fmt;
use std::time::Duration;

/// A cluster-agnostic snapshot of everything [`classify`] needs. Built by
/// the `reconcile::status` step from live objects; kept separate so the
/// classification logic itself never touches `kube`.
#[derive(Debug, Clone, Default)]
pub struct ObservedState {
    pub deletion_timestamp_set: bool,
    pub observed_generation: i64,
    pub transport_ready: bool,
    pub workload_ready: bool,
    pub workload_ready_message: Option<String>,
    pub crashlooping_container: Option<String>,
    pub scaling_enabled: bool,
    pub scaling_ready: bool,
    pub failing_pods: i32,
    pub ready: i32,
    pub desired: i32,
    pub total: i32,
    pub last_scale_event_age: Option<Duration>,
}

/// The sub-classification of a `WorkloadReady=False` condition, derived by
/// pattern-matching the condition message / crash-looping container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkloadErrorKind {
    PendingResources,
    ImagePullError,
    RuntimeError,
    SidecarError,
    VolumeError,
    ConfigError,
}

impl fmt::Display for WorkloadErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self {
            WorkloadErrorKind::PendingResources => "PendingResources",
            WorkloadErrorKind::ImagePullError => "ImagePullError",
            WorkloadErrorKind::RuntimeError => "RuntimeError",
            WorkloadErrorKind::SidecarError => "SidecarError",
            WorkloadErrorKind::VolumeError => "VolumeError",
            WorkloadErrorKind::ConfigError => "ConfigError",
        };
        f.write_str(tag)
    }
}

/// The single status tag written to the custom resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActorStatus {
    Terminating,
    Creating,
    TransportError,
    WorkloadError(WorkloadErrorKind),
    ScalingError,
    Napping,
    ScalingUp,
    ScalingDown,
    Degraded,
    Running,
}

impl fmt::Display for ActorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActorStatus::Terminating => f.write_str("Terminating"),
            ActorStatus::Creating => f.write_str("Creating"),
            ActorStatus::TransportError => f.write_str("TransportError"),
            ActorStatus::WorkloadError(kind) => write!(f, "{kind}"),
            ActorStatus::ScalingError => f.write_str("ScalingError"),
            ActorStatus::Napping => f.write_str("Napping"),
            ActorStatus::ScalingUp => f.write_str("ScalingUp"),
            ActorStatus::ScalingDown => f.write_str("ScalingDown"),
            ActorStatus::Degraded => f.write_str("Degraded"),
            ActorStatus::Running => f.write_str("Running"),
        }
    }
}

const DEGRADED_THRESHOLD: Duration = Duration::from_secs(5 * 60);

/// Classifies a `WorkloadReady=False` condition message into a sub-reason.
/// Falls back to `RuntimeError` when nothing more specific matches.
fn classify_workload_error(message: &str, crashlooping_container: Option<&str>) -> WorkloadErrorKind {
    let lower = message.to_ascii_lowercase();
    if lower.contains("insufficient") {
        return WorkloadErrorKind::PendingResources;
    }
    if lower.contains("imagepullbackoff") || lower.contains("errimagepull") || lower.contains("image pull") {
        return WorkloadErrorKind::ImagePullError;
    }
    if lower.contains("volume") || lower.contains("mount") {
        return WorkloadErrorKind::VolumeError;
    }
    if lower.contains("configmap") || lower.contains("config resolution") || lower.contains("secret") {
        return WorkloadErrorKind::ConfigError;
    }
    match crashlooping_container {
        Some(name) if name == asya_core::reserved::SIDECAR_CONTAINER_NAME => WorkloadErrorKind::SidecarError,
        _ => WorkloadErrorKind::RuntimeError,
    }
}

/// The status-priority function described in the design notes: evaluates
/// each rule in order and returns the first that matches.
pub fn classify(observed: &ObservedState) -> ActorStatus {
    if observed.deletion_timestamp_set {
        return ActorStatus::Terminating;
    }
    if observed.observed_generation == 0 {
        return ActorStatus::Creating;
    }
    if !observed.transport_ready {
        return ActorStatus::TransportError;
    }
    if !observed.workload_ready {
        let kind = classify_workload_error(
            observed.workload_ready_message.as_deref().unwrap_or(""),
            observed.crashlooping_container.as_deref(),
        );
        return ActorStatus::WorkloadError(kind);
    }
    if observed.scaling_enabled && !observed.scaling_ready {
        return ActorStatus::ScalingError;
    }
    if observed.failing_pods >= 1 && observed.ready < observed.desired {
        let kind = classify_workload_error(
            observed.workload_ready_message.as_deref().unwrap_or(""),
            observed.crashlooping_container.as_deref(),
        );
        return ActorStatus::WorkloadError(kind);
    }
    if observed.scaling_enabled && observed.desired == 0 {
        return ActorStatus::Napping;
    }
    if observed.total < observed.desired && observed.desired > 0 {
        return ActorStatus::ScalingUp;
    }
    if observed.total > observed.desired {
        return ActorStatus::ScalingDown;
    }
    if observed.ready < observed.total {
        return match observed.last_scale_event_age {
            Some(age) if age > DEGRADED_THRESHOLD => ActorStatus::Degraded,
            _ => ActorStatus::ScalingUp,
        };
    }
    ActorStatus::Running
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> ObservedState {
        ObservedState {
            observed_generation: 1,
            transport_ready: true,
            workload_ready: true,
            scaling_ready: true,
            ..Default::default()
        }
    }

    #[test]
    fn terminating_wins_over_everything() {
        let mut observed = base();
        observed.deletion_timestamp_set = true;
        observed.transport_ready = false;
        assert_eq!(classify(&observed), ActorStatus::Terminating);
    }

    #[test]
    fn generation_zero_is_creating() {
        let mut observed = base();
        observed.observed_generation = 0;
        assert_eq!(classify(&observed), ActorStatus::Creating);
    }

    #[test]
    fn transport_not_ready_is_transport_error() {
        let mut observed = base();
        observed.transport_ready = false;
        assert_eq!(classify(&observed), ActorStatus::TransportError);
    }

    #[test]
    fn image_pull_back_off_classifies_as_image_pull_error() {
        let mut observed = base();
        observed.workload_ready = false;
        observed.workload_ready_message = Some("container in ImagePullBackOff".into());
        assert_eq!(
            classify(&observed),
            ActorStatus::WorkloadError(WorkloadErrorKind::ImagePullError)
        );
    }

    #[test]
    fn insufficient_cpu_classifies_as_pending_resources() {
        let mut observed = base();
        observed.workload_ready = false;
        observed.workload_ready_message = Some("0/3 nodes are available: Insufficient cpu".into());
        assert_eq!(
            classify(&observed),
            ActorStatus::WorkloadError(WorkloadErrorKind::PendingResources)
        );
    }

    #[test]
    fn crash_loop_scoped_to_sidecar_classifies_as_sidecar_error() {
        let mut observed = base();
        observed.workload_ready = false;
        observed.workload_ready_message = Some("container is crash looping".into());
        observed.crashlooping_container = Some("asya-sidecar".into());
        assert_eq!(
            classify(&observed),
            ActorStatus::WorkloadError(WorkloadErrorKind::SidecarError)
        );
    }

    #[test]
    fn crash_loop_scoped_to_runtime_classifies_as_runtime_error() {
        let mut observed = base();
        observed.workload_ready = false;
        observed.workload_ready_message = Some("container is crash looping".into());
        observed.crashlooping_container = Some("asya-runtime".into());
        assert_eq!(
            classify(&observed),
            ActorStatus::WorkloadError(WorkloadErrorKind::RuntimeError)
        );
    }

    #[test]
    fn scaling_enabled_and_not_ready_is_scaling_error() {
        let mut observed = base();
        observed.scaling_enabled = true;
        observed.scaling_ready = false;
        assert_eq!(classify(&observed), ActorStatus::ScalingError);
    }

    #[test]
    fn scaling_enabled_desired_zero_is_napping() {
        let mut observed = base();
        observed.scaling_enabled = true;
        observed.desired = 0;
        observed.total = 0;
        observed.ready = 0;
        assert_eq!(classify(&observed), ActorStatus::Napping);
    }

    #[test]
    fn total_below_desired_is_scaling_up() {
        let mut observed = base();
        observed.desired = 3;
        observed.total = 1;
        observed.ready = 1;
        assert_eq!(classify(&observed), ActorStatus::ScalingUp);
    }

    #[test]
    fn total_above_desired_is_scaling_down() {
        let mut observed = base();
        observed.desired = 1;
        observed.total = 3;
        observed.ready = 3;
        assert_eq!(classify(&observed), ActorStatus::ScalingDown);
    }

    #[test]
    fn ready_below_total_past_threshold_is_degraded() {
        let mut observed = base();
        observed.desired = 2;
        observed.total = 2;
        observed.ready = 1;
        observed.last_scale_event_age = Some(Duration::from_secs(10 * 60));
        assert_eq!(classify(&observed), ActorStatus::Degraded);
    }

    #[test]
    fn ready_below_total_recent_scale_is_scaling_up() {
        let mut observed = base();
        observed.desired = 2;
        observed.total = 2;
        observed.ready = 1;
        observed.last_scale_event_age = Some(Duration::from_secs(30));
        assert_eq!(classify(&observed), ActorStatus::ScalingUp);
    }

    #[test]
    fn ready_equals_desired_is_running() {
        let mut observed = base();
        observed.desired = 3;
        observed.total = 3;
        observed.ready = 3;
        assert_eq!(classify(&observed), ActorStatus::Running);
    }

    #[test]
    fn manual_scale_zero_is_running() {
        let mut observed = base();
        observed.desired = 0;
        observed.total = 0;
        observed.ready = 0;
        assert_eq!(classify(&observed), ActorStatus::Running);
    }

    #[test]
    fn failing_pods_with_ready_below_desired_is_workload_error() {
        let mut observed = base();
        observed.failing_pods = 1;
        observed.desired = 2;
        observed.ready = 1;
        observed.total = 2;
        observed.workload_ready_message = Some("container in ImagePullBackOff".into());
        assert_eq!(
            classify(&observed),
            ActorStatus::WorkloadError(WorkloadErrorKind::ImagePullError)
        );
    }

    #[test]
    fn display_renders_the_expected_tags() {
        assert_eq!(ActorStatus::Running.to_string(), "Running");
        assert_eq!(
            ActorStatus::WorkloadError(WorkloadErrorKind::PendingResources).to_string(),
            "PendingResources"
        );
    }
}
