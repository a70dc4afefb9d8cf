//! The narrow, object-safe slice of [`asya_core::TransportAdapter`] the
//! gateway needs: publishing a freshly-minted envelope to its first actor's
//! queue. Mirrors `asya_sidecar::router::RouterTransport` — the same
//! object-safety conflict (associated types on `TransportAdapter`) applies
//! here, so the gateway gets its own blanket-impl'd trait rather than
//! depending on the sidecar crate for one method.

use async_trait::async_trait;

use asya_core::{Envelope, TransportAdapter};

use crate::error::GatewayError;

#[async_trait]
pub trait QueuePublisher: Send + Sync {
    async fn publish(&self, envelope: &Envelope, actor_name: &str) -> Result<(), GatewayError>;
}

#[async_trait]
impl<T> QueuePublisher for T
where
    T: TransportAdapter + Send + Sync,
{
    async fn publish(&self, envelope: &Envelope, actor_name: &str) -> Result<(), GatewayError> {
        TransportAdapter::publish(self, envelope, actor_name)
            .await
            .map_err(|err| GatewayError::Publish {
                id: envelope.id.clone(),
                actor_name: actor_name.to_string(),
                source: Box::new(err),
            })
    }
}
