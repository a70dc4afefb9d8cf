//! Step 3: reconcile the actor's input queue (and DLQ, if enabled).
//!
//! `TransportAdapter` carries associated types and so isn't object-safe;
//! [`QueueManager`] is the same narrowing trick used by
//! `asya_gateway::publisher::QueuePublisher` and
//! `asya_sidecar::router::RouterTransport`, scoped to just the three
//! methods this reconcile step needs.

use async_trait::async_trait;

use asya_core::queue::{derive_queue_name, TransportKind as QueueTransportKind};
use asya_core::{QueueDeclareOptions, TransportAdapter};

use crate::config::TransportConfig;
use crate::config::TransportKindTag;
use crate::error::{OperatorError, OperatorResult};

#[async_trait]
pub trait QueueManager: Send + Sync {
    async fn declare_queue(&self, queue_name: &str, opts: &QueueDeclareOptions) -> OperatorResult<()>;
    async fn queue_exists(&self, queue_name: &str) -> OperatorResult<bool>;
    async fn delete_queue(&self, queue_name: &str) -> OperatorResult<()>;
}

#[async_trait]
impl<T> QueueManager for T
where
    T: TransportAdapter + Send + Sync,
{
    async fn declare_queue(&self, queue_name: &str, opts: &QueueDeclareOptions) -> OperatorResult<()> {
        TransportAdapter::declare_queue(self, queue_name, opts)
            .await
            .map_err(|err| OperatorError::Transport {
                queue: queue_name.to_string(),
                source: Box::new(err),
            })
    }

    async fn queue_exists(&self, queue_name: &str) -> OperatorResult<bool> {
        TransportAdapter::queue_exists(self, queue_name)
            .await
            .map_err(|err| OperatorError::Transport {
                queue: queue_name.to_string(),
                source: Box::new(err),
            })
    }

    async fn delete_queue(&self, queue_name: &str) -> OperatorResult<()> {
        TransportAdapter::delete_queue(self, queue_name)
            .await
            .map_err(|err| OperatorError::Transport {
                queue: queue_name.to_string(),
                source: Box::new(err),
            })
    }
}

pub fn queue_kind(kind: TransportKindTag) -> QueueTransportKind {
    match kind {
        TransportKindTag::Amqp => QueueTransportKind::Amqp,
        TransportKindTag::CloudQueue => QueueTransportKind::CloudQueue,
    }
}

/// Merges operator-config tags with the `{asya.sh/actor, asya.sh/namespace}`
/// defaults. Operator values win on any key collision, since these are the
/// only reserved-prefix keys in play here.
pub fn merge_tags(
    configured: &std::collections::HashMap<String, String>,
    namespace: &str,
    actor_name: &str,
) -> std::collections::BTreeMap<String, String> {
    let mut tags: std::collections::BTreeMap<String, String> =
        configured.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
    tags.insert("asya.sh/actor".to_string(), actor_name.to_string());
    tags.insert("asya.sh/namespace".to_string(), namespace.to_string());
    tags
}

/// Creates the queue idempotently if auto-create is on; otherwise verifies
/// it already exists. Returns the derived queue name either way.
pub async fn reconcile_queue(
    manager: &dyn QueueManager,
    transport: &TransportConfig,
    namespace: &str,
    actor_name: &str,
) -> OperatorResult<String> {
    let queue_name = derive_queue_name(queue_kind(transport.kind), namespace, actor_name);

    if transport.queues.auto_create {
        let opts = QueueDeclareOptions {
            dlq_enabled: transport.queues.dlq.enabled,
            dlq_max_retry_count: transport.queues.dlq.max_retry_count,
            dlq_retention_days: transport.queues.dlq.retention_days,
            tags: merge_tags(&transport.tags, namespace, actor_name),
        };
        manager.declare_queue(&queue_name, &opts).await?;
    } else if !manager.queue_exists(&queue_name).await? {
        return Err(OperatorError::queue_missing(queue_name));
    }

    Ok(queue_name)
}
