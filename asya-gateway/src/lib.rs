//! # asya-gateway — HTTP mediator for the envelope mesh
//!
//! Accepts tool calls from clients, mints envelopes, publishes them to the
//! first actor's queue, and tracks their progress to a terminal state via
//! the [`store::EnvelopeStore`] — fed by sidecar progress/final POSTs and
//! exposed back to clients via snapshot, liveness, and SSE endpoints.

pub mod api;
pub mod app;
pub mod config;
pub mod error;
pub mod progress;
pub mod publisher;
pub mod store;
pub mod tools;

pub use app::{build_router, AppState};
pub use config::{GatewayConfig, GatewayConfigBuilder};
pub use error::{GatewayError, GatewayResult};
pub use store::EnvelopeStore;
pub use tools::ToolRegistry;
