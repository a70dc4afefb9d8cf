//! `aws-sdk-sqs`-backed [`TransportAdapter`] implementation.
//!
//! Cloud queues are a flat global namespace (no broker-side vhost), so
//! `asya_core::derive_queue_name` folds the namespace into the name.
//! Queue URLs are resolved once per name and cached; a URL whose host does
//! not match the configured endpoint is rewritten to it, which is what
//! lets this adapter talk to a local SQS emulator that advertises its
//! container-internal hostname in `GetQueueUrl` responses.

use std::sync::Arc;

use async_trait::async_trait;
use aws_sdk_sqs::Client;
use dashmap::DashMap;
use futures::stream::BoxStream;
use tracing::{debug, warn};
use url::Url;

use asya_core::{AckToken, Delivery, Envelope, QueueDeclareOptions, QueueMetrics, TransportAdapter};

use crate::backoff::{retry, BackoffPolicy};
use crate::error::{TransportError, TransportResult};

/// An ack/nack handle for a message received over SQS: the receipt handle
/// issued by the most recent `ReceiveMessage` call.
#[derive(Debug)]
pub struct CloudQueueAckToken {
    queue_url: String,
    receipt_handle: String,
}

impl AckToken for CloudQueueAckToken {}

/// A [`TransportAdapter`] backed by Amazon SQS (or an emulator exposing
/// the same API, e.g. LocalStack or ElasticMQ).
pub struct CloudQueueTransport {
    client: Client,
    queue_urls: DashMap<String, String>,
    base_endpoint: Option<Url>,
    backoff: BackoffPolicy,
}

impl CloudQueueTransport {
    /// Builds an adapter from an already-configured SQS client.
    ///
    /// `base_endpoint`, when set, overrides the host/port of any queue URL
    /// the provider returns, so a client configured against a Docker-network
    /// hostname still produces URLs the caller can actually reach.
    pub fn new(client: Client, base_endpoint: Option<Url>) -> Self {
        Self {
            client,
            queue_urls: DashMap::new(),
            base_endpoint,
            backoff: BackoffPolicy::default().with_jitter(0.2),
        }
    }

    fn rewrite_endpoint(&self, queue_url: String) -> String {
        let Some(base) = &self.base_endpoint else {
            return queue_url;
        };
        let Ok(mut parsed) = Url::parse(&queue_url) else {
            return queue_url;
        };
        if parsed.host_str() == base.host_str() && parsed.port() == base.port() {
            return queue_url;
        }
        let _ = parsed.set_host(base.host_str());
        let _ = parsed.set_port(base.port());
        let _ = parsed.set_scheme(base.scheme());
        parsed.to_string()
    }

    async fn resolve_queue_url(&self, queue_name: &str) -> TransportResult<String> {
        if let Some(cached) = self.queue_urls.get(queue_name) {
            return Ok(cached.clone());
        }

        let response = self
            .client
            .get_queue_url()
            .queue_name(queue_name)
            .send()
            .await
            .map_err(|err| TransportError::CloudQueue(err.to_string()))?;
        let raw_url = response
            .queue_url()
            .ok_or_else(|| TransportError::queue_not_resolved(queue_name))?
            .to_string();

        let resolved = self.rewrite_endpoint(raw_url);
        self.queue_urls
            .insert(queue_name.to_string(), resolved.clone());
        Ok(resolved)
    }
}

#[async_trait]
impl TransportAdapter for CloudQueueTransport {
    type Error = TransportError;
    type AckToken = CloudQueueAckToken;

    async fn publish(&self, envelope: &Envelope, actor_name: &str) -> TransportResult<()> {
        let body = serde_json::to_string(envelope)
            .map_err(|err| TransportError::CloudQueue(format!("serialize envelope: {err}")))?;
        let queue_url = self.resolve_queue_url(actor_name).await?;

        retry(
            &self.backoff,
            TransportError::is_retryable,
            || {
                let body = body.clone();
                let queue_url = queue_url.clone();
                async move {
                    self.client
                        .send_message()
                        .queue_url(queue_url)
                        .message_body(body)
                        .send()
                        .await
                        .map_err(|err| TransportError::CloudQueue(err.to_string()))?;
                    Ok(())
                }
            },
        )
        .await
    }

    async fn consume(
        &self,
        queue_name: &str,
    ) -> TransportResult<BoxStream<'static, TransportResult<Delivery<CloudQueueAckToken>>>> {
        let queue_url = self.resolve_queue_url(queue_name).await?;
        let client = self.client.clone();

        let stream = futures::stream::unfold((client, queue_url), |(client, queue_url)| async move {
            loop {
                let response = client
                    .receive_message()
                    .queue_url(&queue_url)
                    .max_number_of_messages(1)
                    .wait_time_seconds(20)
                    .send()
                    .await;

                let messages = match response {
                    Ok(response) => response.messages.unwrap_or_default(),
                    Err(err) => {
                        return Some((
                            Err(TransportError::CloudQueue(err.to_string())),
                            (client, queue_url),
                        ))
                    }
                };

                let Some(message) = messages.into_iter().next() else {
                    continue;
                };

                let Some(body) = message.body() else {
                    warn!("SQS message had no body, skipping");
                    continue;
                };
                let envelope = match serde_json::from_str::<Envelope>(body) {
                    Ok(envelope) => envelope,
                    Err(err) => {
                        warn!(%err, "dropping malformed SQS message");
                        continue;
                    }
                };
                let Some(receipt_handle) = message.receipt_handle() else {
                    warn!("SQS message had no receipt handle, skipping");
                    continue;
                };

                let delivery = Delivery {
                    envelope,
                    ack_token: CloudQueueAckToken {
                        queue_url: queue_url.clone(),
                        receipt_handle: receipt_handle.to_string(),
                    },
                };
                return Some((Ok(delivery), (client, queue_url)));
            }
        });

        Ok(Box::pin(stream))
    }

    async fn declare_queue(
        &self,
        queue_name: &str,
        opts: &QueueDeclareOptions,
    ) -> TransportResult<()> {
        let mut request = self.client.create_queue().queue_name(queue_name);
        if opts.dlq_enabled {
            debug!(
                queue_name,
                "cloud-queue DLQ redrive policy is configured out-of-band by the operator"
            );
        }
        let response = request
            .send()
            .await
            .map_err(|err| TransportError::CloudQueue(err.to_string()))?;
        if let Some(url) = response.queue_url() {
            self.queue_urls
                .insert(queue_name.to_string(), self.rewrite_endpoint(url.to_string()));
        }
        Ok(())
    }

    async fn queue_exists(&self, queue_name: &str) -> TransportResult<bool> {
        Ok(self.resolve_queue_url(queue_name).await.is_ok())
    }

    async fn delete_queue(&self, queue_name: &str) -> TransportResult<()> {
        let queue_url = match self.resolve_queue_url(queue_name).await {
            Ok(url) => url,
            Err(TransportError::QueueNotResolved { .. }) => return Ok(()),
            Err(err) => return Err(err),
        };
        self.client
            .delete_queue()
            .queue_url(&queue_url)
            .send()
            .await
            .map_err(|err| TransportError::CloudQueue(err.to_string()))?;
        self.queue_urls.remove(queue_name);
        Ok(())
    }

    async fn queue_metrics(&self, queue_name: &str) -> TransportResult<QueueMetrics> {
        let queue_url = self.resolve_queue_url(queue_name).await?;
        let response = self
            .client
            .get_queue_attributes()
            .queue_url(queue_url)
            .attribute_names(aws_sdk_sqs::types::QueueAttributeName::ApproximateNumberOfMessages)
            .attribute_names(
                aws_sdk_sqs::types::QueueAttributeName::ApproximateNumberOfMessagesNotVisible,
            )
            .send()
            .await
            .map_err(|err| TransportError::CloudQueue(err.to_string()))?;

        let attributes = response.attributes.unwrap_or_default();
        let ready = attributes
            .get(&aws_sdk_sqs::types::QueueAttributeName::ApproximateNumberOfMessages)
            .and_then(|value| value.parse::<u64>().ok())
            .unwrap_or(0);
        let inflight = attributes
            .get(&aws_sdk_sqs::types::QueueAttributeName::ApproximateNumberOfMessagesNotVisible)
            .and_then(|value| value.parse::<u64>().ok());

        Ok(QueueMetrics { ready, inflight })
    }

    async fn ack(&self, token: CloudQueueAckToken) -> TransportResult<()> {
        self.client
            .delete_message()
            .queue_url(token.queue_url)
            .receipt_handle(token.receipt_handle)
            .send()
            .await
            .map_err(|err| TransportError::CloudQueue(err.to_string()))?;
        Ok(())
    }

    async fn nack(&self, token: CloudQueueAckToken) -> TransportResult<()> {
        // Visibility timeout 0 makes the message immediately eligible for
        // redelivery instead of waiting out its normal timeout.
        self.client
            .change_message_visibility()
            .queue_url(token.queue_url)
            .receipt_handle(token.receipt_handle)
            .visibility_timeout(0)
            .send()
            .await
            .map_err(|err| TransportError::CloudQueue(err.to_string()))?;
        Ok(())
    }

    async fn close(&self) -> TransportResult<()> {
        Ok(())
    }
}
