//! `POST /tools/call`: the entry point clients use to kick off a route
//! through the actor mesh.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use asya_core::reserved::HAPPY_END;
use asya_core::{Envelope, Route};

use crate::app::AppState;
use crate::error::{GatewayError, GatewayResult};

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/tools/call", post(call_tool))
}

#[derive(Debug, Deserialize)]
struct ToolCallRequest {
    tool_name: String,
    #[serde(default)]
    arguments: Value,
    /// When true, the caller waits (up to the tool's timeout) for the
    /// terminal result instead of getting the envelope id back immediately.
    #[serde(default)]
    blocking: bool,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum ToolCallResponse {
    Result { id: String, result: Value },
    Accepted { id: String },
}

impl IntoResponse for ToolCallResponse {
    fn into_response(self) -> Response {
        match &self {
            ToolCallResponse::Result { .. } => (StatusCode::OK, Json(self)).into_response(),
            ToolCallResponse::Accepted { .. } => (StatusCode::ACCEPTED, Json(self)).into_response(),
        }
    }
}

/// The actor name the route currently points at: a terminal actor once the
/// route is empty or already exhausted. Mirrors the sidecar's `next_hop`,
/// duplicated here since the gateway does not depend on `asya-sidecar`.
fn first_hop(route: &Route) -> String {
    route
        .current_actor_name()
        .map(str::to_string)
        .unwrap_or_else(|| HAPPY_END.to_string())
}

async fn call_tool(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ToolCallRequest>,
) -> GatewayResult<ToolCallResponse> {
    let tool = state
        .tools
        .get(&request.tool_name)
        .ok_or_else(|| GatewayError::UnknownTool {
            name: request.tool_name.clone(),
        })?;

    if let Some(missing) = tool.missing_argument(&request.arguments) {
        return Err(GatewayError::missing_argument(&request.tool_name, missing));
    }

    let id = uuid::Uuid::new_v4().to_string();
    let route = Route::new(tool.actors.clone())?;
    let deadline = chrono::Utc::now()
        + chrono::Duration::from_std(tool.default_timeout()).unwrap_or_else(|_| chrono::Duration::zero());
    let envelope = Envelope::new(id.clone(), route, request.arguments).with_deadline(deadline);

    state.store.create(envelope.clone())?;

    if !request.blocking {
        publish_first_hop(&state, &envelope).await?;
        return Ok(ToolCallResponse::Accepted { id });
    }

    let mut updates = state.store.subscribe(&id)?;
    publish_first_hop(&state, &envelope).await?;

    let timeout = tool.default_timeout();
    let terminal = tokio::time::timeout(timeout, async {
        while let Some(update) = updates.recv().await {
            if update.envelope.status.is_terminal() {
                return Some(update.envelope);
            }
        }
        None
    })
    .await
    .ok()
    .flatten();

    match terminal {
        Some(envelope) if envelope.error.is_none() => Ok(ToolCallResponse::Result {
            id,
            result: envelope.result.unwrap_or(Value::Null),
        }),
        Some(envelope) => Ok(ToolCallResponse::Result {
            id,
            result: Value::String(envelope.error.unwrap_or_default()),
        }),
        None => Ok(ToolCallResponse::Accepted { id }),
    }
}

async fn publish_first_hop(state: &AppState, envelope: &Envelope) -> GatewayResult<()> {
    let actor_name = first_hop(&envelope.route);
    state.publisher.publish(envelope, &actor_name).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_hop_uses_stored_route_head() {
        let route = Route::new(vec!["parse".into()]).unwrap();
        assert_eq!(first_hop(&route), "parse");
    }

    #[test]
    fn first_hop_falls_back_to_happy_end_for_empty_route() {
        let route = Route::new(vec![]).unwrap();
        assert_eq!(first_hop(&route), HAPPY_END);
    }
}
