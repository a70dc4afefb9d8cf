//! `lapin`-backed [`TransportAdapter`] implementation.
//!
//! Routing key equals the destination actor's name (see
//! `asya_core::queue::amqp_routing_key`); the broker/vhost itself provides
//! the per-cluster namespace, so queue declaration is idempotent and
//! unqualified by namespace, unlike the cloud-queue adapter.

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};
use lapin::acker::Acker;
use lapin::options::{
    BasicAckOptions, BasicConsumeOptions, BasicNackOptions, BasicPublishOptions,
    ExchangeDeclareOptions, QueueBindOptions, QueueDeclareOptions as LapinQueueDeclareOptions,
    QueueDeleteOptions,
};
use lapin::types::FieldTable;
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties, ExchangeKind};
use tracing::{debug, warn};

use asya_core::{AckToken, Delivery, Envelope, QueueDeclareOptions, QueueMetrics, TransportAdapter};

use crate::backoff::{retry, BackoffPolicy};
use crate::error::{TransportError, TransportResult};
use crate::pool::{PooledResource, ResourcePool};

/// The dead-letter exchange every DLQ-enabled queue is bound to.
const DLX_NAME: &str = "asya.dlx";

impl PooledResource for Channel {
    fn is_healthy(&self) -> bool {
        self.status().connected()
    }
}

/// An ack/nack handle for a message received over AMQP.
#[derive(Debug)]
pub struct AmqpAckToken(pub(crate) Acker);

impl AckToken for AmqpAckToken {}

/// A [`TransportAdapter`] backed by a single AMQP connection and a pool of
/// per-queue channels.
pub struct AmqpTransport {
    connection: Arc<Connection>,
    channels: ResourcePool<Channel>,
    backoff: BackoffPolicy,
}

impl AmqpTransport {
    /// Connects to `uri` and builds an adapter whose publisher pool tracks
    /// at most `max_queues` distinct queue names.
    pub async fn connect(uri: &str, max_queues: usize) -> TransportResult<Self> {
        let connection = Connection::connect(uri, ConnectionProperties::default())
            .await
            .map_err(TransportError::Amqp)?;
        Ok(Self {
            connection: Arc::new(connection),
            channels: ResourcePool::new(max_queues),
            backoff: BackoffPolicy::default().with_jitter(0.2),
        })
    }

    async fn channel_for(&self, queue_name: &str) -> TransportResult<Channel> {
        let connection = self.connection.clone();
        self.channels
            .checkout(queue_name, || async move {
                connection
                    .create_channel()
                    .await
                    .map_err(TransportError::Amqp)
            })
            .await
    }
}

#[async_trait]
impl TransportAdapter for AmqpTransport {
    type Error = TransportError;
    type AckToken = AmqpAckToken;

    async fn publish(&self, envelope: &Envelope, actor_name: &str) -> TransportResult<()> {
        let body = serde_json::to_vec(envelope).map_err(|err| {
            TransportError::CloudQueue(format!("failed to serialize envelope: {err}"))
        })?;
        let routing_key = asya_core::amqp_routing_key(actor_name).to_string();

        retry(
            &self.backoff,
            TransportError::is_retryable,
            || {
                let routing_key = routing_key.clone();
                let body = body.clone();
                async move {
                    let channel = self.channel_for(&routing_key).await?;
                    channel
                        .basic_publish(
                            "",
                            &routing_key,
                            BasicPublishOptions::default(),
                            &body,
                            BasicProperties::default().with_delivery_mode(2),
                        )
                        .await
                        .map_err(TransportError::Amqp)?
                        .await
                        .map_err(TransportError::Amqp)?;
                    Ok(())
                }
            },
        )
        .await
    }

    async fn consume(
        &self,
        queue_name: &str,
    ) -> TransportResult<BoxStream<'static, TransportResult<Delivery<AmqpAckToken>>>> {
        let channel = self.channel_for(queue_name).await?;
        let consumer = channel
            .basic_consume(
                queue_name,
                "asya-sidecar",
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(TransportError::Amqp)?;

        let stream = consumer.filter_map(|delivery| async move {
            match delivery {
                Ok(delivery) => match serde_json::from_slice::<Envelope>(&delivery.data) {
                    Ok(envelope) => Some(Ok(Delivery {
                        envelope,
                        ack_token: AmqpAckToken(delivery.acker),
                    })),
                    Err(err) => {
                        warn!(%err, "dropping malformed AMQP delivery");
                        None
                    }
                },
                Err(err) => Some(Err(TransportError::Amqp(err))),
            }
        });

        Ok(Box::pin(stream))
    }

    async fn declare_queue(
        &self,
        queue_name: &str,
        opts: &QueueDeclareOptions,
    ) -> TransportResult<()> {
        let channel = self.channel_for(queue_name).await?;

        let mut args = FieldTable::default();
        if opts.dlq_enabled {
            channel
                .exchange_declare(
                    DLX_NAME,
                    ExchangeKind::Direct,
                    ExchangeDeclareOptions {
                        durable: true,
                        ..Default::default()
                    },
                    FieldTable::default(),
                )
                .await
                .map_err(TransportError::Amqp)?;

            let dlq_name = format!("{queue_name}.dlq");
            channel
                .queue_declare(
                    &dlq_name,
                    LapinQueueDeclareOptions {
                        durable: true,
                        ..Default::default()
                    },
                    FieldTable::default(),
                )
                .await
                .map_err(TransportError::Amqp)?;
            channel
                .queue_bind(
                    &dlq_name,
                    DLX_NAME,
                    queue_name,
                    QueueBindOptions::default(),
                    FieldTable::default(),
                )
                .await
                .map_err(TransportError::Amqp)?;

            args.insert("x-dead-letter-exchange".into(), DLX_NAME.into());
            args.insert("x-dead-letter-routing-key".into(), queue_name.into());
            if let Some(max_retry) = opts.dlq_max_retry_count {
                args.insert("x-delivery-limit".into(), (max_retry as i32).into());
            }
        }

        channel
            .queue_declare(
                queue_name,
                LapinQueueDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                args,
            )
            .await
            .map_err(TransportError::Amqp)?;
        debug!(queue_name, "declared AMQP queue");
        Ok(())
    }

    async fn queue_exists(&self, queue_name: &str) -> TransportResult<bool> {
        let channel = self.channel_for(queue_name).await?;
        let result = channel
            .queue_declare(
                queue_name,
                LapinQueueDeclareOptions {
                    passive: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await;
        Ok(result.is_ok())
    }

    async fn delete_queue(&self, queue_name: &str) -> TransportResult<()> {
        let channel = self.channel_for(queue_name).await?;
        match channel
            .queue_delete(queue_name, QueueDeleteOptions::default())
            .await
        {
            Ok(_) => Ok(()),
            Err(lapin::Error::ProtocolError(_)) => Ok(()),
            Err(err) => Err(TransportError::Amqp(err)),
        }
    }

    async fn queue_metrics(&self, queue_name: &str) -> TransportResult<QueueMetrics> {
        let channel = self.channel_for(queue_name).await?;
        let declared = channel
            .queue_declare(
                queue_name,
                LapinQueueDeclareOptions {
                    passive: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(TransportError::Amqp)?;
        Ok(QueueMetrics {
            ready: declared.message_count() as u64,
            inflight: Some(declared.consumer_count() as u64),
        })
    }

    async fn ack(&self, token: AmqpAckToken) -> TransportResult<()> {
        token
            .0
            .ack(BasicAckOptions::default())
            .await
            .map_err(TransportError::Amqp)
    }

    async fn nack(&self, token: AmqpAckToken) -> TransportResult<()> {
        token
            .0
            .nack(BasicNackOptions {
                requeue: true,
                ..Default::default()
            })
            .await
            .map_err(TransportError::Amqp)
    }

    async fn close(&self) -> TransportResult<()> {
        self.connection
            .close(0, "shutting down")
            .await
            .map_err(TransportError::Amqp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dlq_name_is_derived_from_the_primary_queue_name() {
        let queue_name = "summarize";
        assert_eq!(format!("{queue_name}.dlq"), "summarize.dlq");
    }

    #[test]
    fn routing_key_matches_the_bare_actor_name() {
        assert_eq!(asya_core::amqp_routing_key("summarize"), "summarize");
    }
}
