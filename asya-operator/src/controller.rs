//! `AsyncActor` controller wiring. Simplified from the reflector-sharing,
//! custom-metrics form in the kaniop echo controller down to plain
//! `Controller::new(..).owns(..).shutdown_on_signal().run(..)`, since this
//! operator doesn't need cross-resource reload triggers beyond `owns`.

use std::collections::HashMap;
use std::sync::Arc;

use futures::StreamExt;
use k8s_openapi::api::apps::v1::Deployment;
use kube::api::Api;
use kube::runtime::controller::{Action, Controller};
use kube::runtime::watcher;
use kube::{Client, Resource, ResourceExt};
use tokio::time::Duration;
use tracing::{error, info, warn};

use crate::config::OperatorConfig;
use crate::crd::AsyncActor;
use crate::error::{OperatorError, OperatorResult};
use crate::reconcile::queue::QueueManager;
use crate::reconcile::{autoscaler, finalizer, queue, runtime_script, status, validate, workload};

const REQUEUE_INTERVAL: Duration = Duration::from_secs(30);
const ERROR_REQUEUE_INTERVAL: Duration = Duration::from_secs(15);
const DEFAULT_RUNTIME_SCRIPT: &str = include_str!("../resources/asya_runtime.py");

pub struct Context {
    pub client: Client,
    pub config: Arc<OperatorConfig>,
    pub transports: HashMap<String, Arc<dyn QueueManager>>,
}

impl Context {
    fn manager_for(&self, transport_name: &str) -> OperatorResult<&Arc<dyn QueueManager>> {
        self.transports
            .get(transport_name)
            .ok_or_else(|| OperatorError::unknown_transport(transport_name))
    }
}

pub async fn run(client: Client, config: Arc<OperatorConfig>, transports: HashMap<String, Arc<dyn QueueManager>>) {
    let actors = Api::<AsyncActor>::all(client.clone());
    if let Err(err) = actors.list(&kube::api::ListParams::default().limit(1)).await {
        error!(%err, "AsyncActor CRD is not queryable; is it installed?");
        std::process::exit(1);
    }

    let context = Arc::new(Context { client: client.clone(), config, transports });

    info!("starting asya-operator controller");
    Controller::new(actors, watcher::Config::default())
        .owns(Api::<Deployment>::all(client), watcher::Config::default())
        .shutdown_on_signal()
        .run(reconcile, error_policy, context)
        .for_each(|result| async move {
            if let Err(err) = result {
                warn!(%err, "reconcile failed");
            }
        })
        .await;
}

fn error_policy(_actor: Arc<AsyncActor>, error: &OperatorError, _ctx: Arc<Context>) -> Action {
    error!(%error, "reconciling AsyncActor failed");
    Action::requeue(ERROR_REQUEUE_INTERVAL)
}

async fn reconcile(actor: Arc<AsyncActor>, ctx: Arc<Context>) -> OperatorResult<Action> {
    let name = actor.name_any();
    let namespace = actor.namespace().unwrap_or_else(|| "default".to_string());

    if actor.meta().deletion_timestamp.is_some() {
        return reconcile_delete(&actor, &ctx).await;
    }

    if !finalizer::has_finalizer(&actor) {
        finalizer::add(ctx.client.clone(), &name, &namespace).await?;
    }

    validate::validate(&actor.spec, &ctx.config)?;
    let transport = ctx.config.resolve_transport(&actor.spec.transport)?;
    let manager = ctx.manager_for(&actor.spec.transport)?;

    let queue_name = queue::reconcile_queue(manager.as_ref(), transport, &namespace, &name).await?;

    runtime_script::reconcile_runtime_script(ctx.client.clone(), &namespace, DEFAULT_RUNTIME_SCRIPT).await?;

    let desired_workload = workload::build_workload(&actor, &ctx.config, &queue_name)?;
    workload::reconcile_workload(ctx.client.clone(), &desired_workload).await?;

    autoscaler::reconcile_autoscaler(
        ctx.client.clone(),
        &actor,
        actor.spec.scaling.as_ref(),
        transport.kind,
        &queue_name,
    )
    .await?;

    let inputs = status::StatusInputs {
        transport_ready: true,
        scaling_enabled: actor.spec.scaling.as_ref().map(|s| s.enabled).unwrap_or(false),
        scaling_ready: true,
        last_scale_event: actor.status.as_ref().and_then(|s| s.last_scale_event.clone()),
    };
    let observed = status::gather_observed_state(ctx.client.clone(), &actor, &inputs).await?;
    status::reconcile_status(ctx.client.clone(), &actor, &observed, inputs.last_scale_event.clone()).await?;

    Ok(Action::requeue(REQUEUE_INTERVAL))
}

async fn reconcile_delete(actor: &AsyncActor, ctx: &Context) -> OperatorResult<Action> {
    let name = actor.name_any();
    let namespace = actor.namespace().unwrap_or_else(|| "default".to_string());

    if !finalizer::has_finalizer(actor) {
        return Ok(Action::await_change());
    }

    if !ctx.config.disable_queue_management {
        if let Ok(transport) = ctx.config.resolve_transport(&actor.spec.transport) {
            if let Ok(manager) = ctx.manager_for(&actor.spec.transport) {
                let queue_name =
                    asya_core::queue::derive_queue_name(queue::queue_kind(transport.kind), &namespace, &name);
                let _ = manager.delete_queue(&queue_name).await;
            }
        }
    }

    finalizer::remove(ctx.client.clone(), &name, &namespace).await?;
    Ok(Action::await_change())
}
