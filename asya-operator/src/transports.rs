//! Builds one long-lived [`QueueManager`] per configured, enabled
//! transport at startup. Built once in `main`, not per-reconcile — a fresh
//! AMQP connection or SQS client per reconcile would be wasteful and, for
//! AMQP, slow enough to blow the controller's requeue interval.

use std::sync::Arc;

use serde::Deserialize;
use url::Url;

use asya_transport::amqp::AmqpTransport;
use asya_transport::cloud_queue::CloudQueueTransport;

use crate::config::{TransportConfig, TransportKindTag};
use crate::error::{OperatorError, OperatorResult};
use crate::reconcile::queue::QueueManager;

fn default_max_queues() -> usize {
    64
}

#[derive(Debug, Deserialize)]
struct AmqpConnectionConfig {
    uri: String,
    #[serde(default = "default_max_queues")]
    max_queues: usize,
}

#[derive(Debug, Deserialize, Default)]
struct CloudQueueConnectionConfig {
    endpoint: Option<String>,
}

/// Connects to the broker/provider described by `transport.config` and
/// returns it as an object-safe [`QueueManager`].
pub async fn build_manager(transport: &TransportConfig) -> OperatorResult<Arc<dyn QueueManager>> {
    match transport.kind {
        TransportKindTag::Amqp => {
            let settings: AmqpConnectionConfig = serde_json::from_value(transport.config.clone())
                .map_err(|err| OperatorError::config(format!("invalid amqp transport config: {err}")))?;
            let adapter = AmqpTransport::connect(&settings.uri, settings.max_queues)
                .await
                .map_err(|err| OperatorError::config(format!("failed to connect to amqp broker: {err}")))?;
            Ok(Arc::new(adapter))
        }
        TransportKindTag::CloudQueue => {
            let settings: CloudQueueConnectionConfig = serde_json::from_value(transport.config.clone())
                .unwrap_or_default();
            let shared_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
            let client = aws_sdk_sqs::Client::new(&shared_config);
            let base_endpoint = settings
                .endpoint
                .map(|endpoint| Url::parse(&endpoint))
                .transpose()
                .map_err(|err| OperatorError::config(format!("invalid cloud queue endpoint: {err}")))?;
            Ok(Arc::new(CloudQueueTransport::new(client, base_endpoint)))
        }
    }
}
