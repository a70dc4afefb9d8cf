//! # asya-core — envelope and route data model
//!
//! Shared data model for the Asya envelope-routing mesh: the [`Envelope`]
//! and [`Route`] types, queue-name derivation, reserved identifiers, and
//! the [`TransportAdapter`] capability boundary that concrete transports
//! (in `asya-transport`) implement.
//!
//! Nothing in this crate performs I/O; it is pure data and pure functions,
//! so the sidecar, gateway, and operator can each depend on it without
//! pulling in the others' concerns.
//!
//! # Quick start
//!
//! ```rust
//! use asya_core::{Envelope, Route};
//!
//! let route = Route::new(vec!["parse".into(), "summarize".into()]).unwrap();
//! let envelope = Envelope::new("env-1", route, serde_json::json!({"text": "hello"}));
//! assert!(envelope.is_active());
//! ```

pub mod envelope;
pub mod error;
pub mod queue;
pub mod reserved;
pub mod route;
pub mod transport;

pub use envelope::{Envelope, EnvelopeStatus};
pub use error::{CoreError, CoreResult};
pub use queue::{amqp_routing_key, derive_queue_name, TransportKind};
pub use route::Route;
pub use transport::{AckToken, Delivery, QueueDeclareOptions, QueueMetrics, TransportAdapter};

/// Convenience re-exports for the most commonly used types.
pub mod prelude {
    pub use crate::envelope::{Envelope, EnvelopeStatus};
    pub use crate::error::{CoreError, CoreResult};
    pub use crate::queue::{derive_queue_name, TransportKind};
    pub use crate::route::Route;
    pub use crate::transport::{QueueDeclareOptions, QueueMetrics, TransportAdapter};
}
