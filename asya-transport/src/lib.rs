//! # asya-transport — AMQP and cloud-queue adapters
//!
//! Concrete [`asya_core::TransportAdapter`] implementations over AMQP
//! ([`amqp::AmqpTransport`]) and a cloud queue ([`cloud_queue::CloudQueueTransport`]),
//! plus the shared [`backoff`] retry policy and [`pool`] publisher-channel
//! cache both adapters build on.

pub mod amqp;
pub mod backoff;
pub mod cloud_queue;
pub mod error;
pub mod pool;

pub use amqp::{AmqpAckToken, AmqpTransport};
pub use backoff::{retry, BackoffPolicy};
pub use cloud_queue::{CloudQueueAckToken, CloudQueueTransport};
pub use error::{TransportError, TransportResult};
pub use pool::{PooledResource, ResourcePool};
