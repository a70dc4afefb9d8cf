//! Shared application state and router assembly.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use tower_http::trace::TraceLayer;

use crate::publisher::QueuePublisher;
use crate::store::EnvelopeStore;
use crate::tools::ToolRegistry;

/// Passed as `Arc<AppState>` to every handler (teacher precedent: the
/// skynet-gateway `AppState` shape, narrowed to what this gateway needs).
pub struct AppState {
    pub store: Arc<EnvelopeStore>,
    pub tools: Arc<ToolRegistry>,
    pub publisher: Arc<dyn QueuePublisher>,
    pub sse_keepalive: Duration,
}

/// Assembles the full Axum router: one builder per resource, composed
/// with a tracing layer.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(crate::api::health::router())
        .merge(crate::api::tools::router())
        .merge(crate::api::envelopes::router())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
