//! The transport-adapter trait boundary: `publish`, `consume`, `ack`/`nack`,
//! `declare_queue`, `queue_metrics`. Concrete AMQP and cloud-queue
//! implementations live in the `asya-transport` crate; this module only
//! defines the capability set every adapter must provide.

use async_trait::async_trait;
use futures::stream::BoxStream;
use std::error::Error;
use std::fmt::Debug;

use crate::envelope::Envelope;

/// Options used when declaring a queue.
#[derive(Debug, Clone, Default)]
pub struct QueueDeclareOptions {
    /// Whether to also declare a dead-letter queue alongside the main one.
    pub dlq_enabled: bool,
    /// Maximum redelivery attempts before a message is routed to the DLQ.
    pub dlq_max_retry_count: Option<u32>,
    /// Retention, in days, for messages parked in the DLQ.
    pub dlq_retention_days: Option<u32>,
    /// Tags/attributes to attach to the queue (merged with operator
    /// defaults by the caller, not by the adapter).
    pub tags: std::collections::BTreeMap<String, String>,
}

/// A snapshot of a queue's depth, used to drive autoscaling decisions and
/// the `TransportReady` condition.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct QueueMetrics {
    /// Number of messages visible and ready for consumption.
    pub ready: u64,
    /// Number of messages currently checked out by a consumer, if the
    /// transport can report it.
    pub inflight: Option<u64>,
}

/// An opaque handle returned alongside a consumed message, used to
/// acknowledge or reject it on the same connection/channel it arrived on.
pub trait AckToken: Debug + Send + Sync {}

/// A message delivered by [`TransportAdapter::consume`]: the envelope plus
/// the token needed to ack or nack it.
pub struct Delivery<T: AckToken> {
    pub envelope: Envelope,
    pub ack_token: T,
}

/// Capability set every transport (AMQP, cloud-queue) must provide.
///
/// Implementations must be cheap to clone (an `Arc`-backed handle) since
/// the sidecar and the publisher pool share one adapter across many
/// concurrent publishes.
#[async_trait]
pub trait TransportAdapter: Send + Sync {
    /// Error type surfaced by every fallible operation on this adapter.
    type Error: Error + Send + Sync + 'static;
    /// The ack-token type this adapter hands back from `consume`.
    type AckToken: AckToken;

    /// Publishes `envelope` to the queue backing `actor_name`, retrying
    /// transiently-failed attempts with backoff up to a small internal
    /// bound before returning an error to the caller.
    async fn publish(&self, envelope: &Envelope, actor_name: &str) -> Result<(), Self::Error>;

    /// Opens a consumer subscription on `queue_name`, yielding at most one
    /// un-acked delivery at a time. The returned stream's ack tokens are
    /// only valid on the connection/channel they were delivered on.
    async fn consume(
        &self,
        queue_name: &str,
    ) -> Result<BoxStream<'static, Result<Delivery<Self::AckToken>, Self::Error>>, Self::Error>;

    /// Declares the input queue (and DLQ, if requested) for `actor_name`.
    /// Idempotent: calling this twice with the same options is a no-op the
    /// second time.
    async fn declare_queue(
        &self,
        queue_name: &str,
        opts: &QueueDeclareOptions,
    ) -> Result<(), Self::Error>;

    /// Returns true if `queue_name` already exists.
    async fn queue_exists(&self, queue_name: &str) -> Result<bool, Self::Error>;

    /// Deletes `queue_name`. Idempotent: deleting a queue that does not
    /// exist is not an error.
    async fn delete_queue(&self, queue_name: &str) -> Result<(), Self::Error>;

    /// Returns current depth/inflight counts for `queue_name`.
    async fn queue_metrics(&self, queue_name: &str) -> Result<QueueMetrics, Self::Error>;

    /// Acknowledges successful processing of a delivered message.
    async fn ack(&self, token: Self::AckToken) -> Result<(), Self::Error>;

    /// Rejects a delivered message, requesting redelivery.
    async fn nack(&self, token: Self::AckToken) -> Result<(), Self::Error>;

    /// Closes the adapter's underlying connection(s).
    async fn close(&self) -> Result<(), Self::Error>;
}
