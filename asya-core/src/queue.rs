//! Queue name derivation: the single point of coupling between the
//! operator, sidecar, and gateway. Every layer computes the same name from
//! `(transport kind, namespace, actor name)` rather than storing it anywhere.

use serde::{Deserialize, Serialize};

/// The broad shape of a transport, which determines how queue names are
/// derived (AMQP brokers are namespaced by the broker itself; cloud queues
/// are global and need the namespace baked into the name).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TransportKind {
    Amqp,
    CloudQueue,
}

/// Derives the queue name for `actor_name` in `namespace` on `kind`.
///
/// - AMQP: the broker itself is namespaced (e.g. a per-cluster vhost), so
///   the queue name is just the actor name, which also doubles as the
///   routing key.
/// - Cloud queue: queues are a flat global namespace, so the namespace and
///   a fixed prefix are folded into the name.
pub fn derive_queue_name(kind: TransportKind, namespace: &str, actor_name: &str) -> String {
    match kind {
        TransportKind::Amqp => actor_name.to_string(),
        TransportKind::CloudQueue => format!("asya-{namespace}-{actor_name}"),
    }
}

/// The AMQP routing key used to publish to `actor_name`: identical to the
/// queue name for AMQP, called out separately so call sites read their
/// intent rather than reusing `derive_queue_name` implicitly.
pub fn amqp_routing_key(actor_name: &str) -> &str {
    actor_name
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cloud_queue_name_includes_namespace_and_prefix() {
        assert_eq!(
            derive_queue_name(TransportKind::CloudQueue, "ns", "x"),
            "asya-ns-x"
        );
    }

    #[test]
    fn amqp_queue_name_is_bare_actor_name() {
        assert_eq!(derive_queue_name(TransportKind::Amqp, "ns", "x"), "x");
    }

    #[test]
    fn amqp_routing_key_matches_actor_name() {
        assert_eq!(amqp_routing_key("summarize"), "summarize");
    }
}
