//! Envelope lifecycle endpoints: fan-out create, snapshot, liveness,
//! progress ingest, and final ingest.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use asya_core::{Envelope, EnvelopeStatus, Route};

use crate::app::AppState;
use crate::error::{GatewayError, GatewayResult};
use crate::progress::ProgressStatus;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/envelopes", post(create_child))
        .route("/envelopes/{id}", get(snapshot))
        .route("/envelopes/{id}/active", get(active))
        .route("/envelopes/{id}/progress", post(progress))
        .route("/envelopes/{id}/final", post(final_report))
        .route("/envelopes/{id}/stream", get(crate::api::stream::stream))
}

#[derive(Debug, Deserialize)]
pub struct CreateChildRequest {
    pub id: String,
    pub parent_id: String,
    pub actors: Vec<String>,
    pub current: usize,
}

async fn create_child(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateChildRequest>,
) -> GatewayResult<StatusCode> {
    let mut route = Route::new(request.actors)?;
    route.current = request.current;
    let envelope = Envelope::new(request.id, route, Value::Null).with_parent_id(request.parent_id);
    state.store.create(envelope)?;
    Ok(StatusCode::CREATED)
}

async fn snapshot(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> GatewayResult<Json<Envelope>> {
    Ok(Json(state.store.get(&id)?))
}

struct ActiveResponse(bool);

impl IntoResponse for ActiveResponse {
    fn into_response(self) -> Response {
        if self.0 {
            StatusCode::OK.into_response()
        } else {
            StatusCode::GONE.into_response()
        }
    }
}

async fn active(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Response {
    match state.store.is_active(&id) {
        Ok(is_active) => ActiveResponse(is_active).into_response(),
        Err(GatewayError::NotFound { .. }) => StatusCode::GONE.into_response(),
        Err(err) => err.into_response(),
    }
}

#[derive(Debug, Deserialize)]
struct ProgressRequest {
    #[serde(default)]
    actors: Vec<String>,
    current_actor_idx: usize,
    status: ProgressStatus,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    #[allow(dead_code)]
    duration_ms: Option<u64>,
    #[serde(default)]
    #[allow(dead_code)]
    size_kb: Option<f64>,
}

#[derive(Debug, Serialize)]
struct ProgressResponse {
    status: EnvelopeStatus,
    progress_percent: f64,
}

async fn progress(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(request): Json<ProgressRequest>,
) -> GatewayResult<Json<ProgressResponse>> {
    let envelope = state.store.apply_progress(
        &id,
        &request.actors,
        request.current_actor_idx,
        request.status.step(),
        request.message,
    )?;

    Ok(Json(ProgressResponse {
        status: envelope.status,
        progress_percent: envelope.progress_percent,
    }))
}

#[derive(Debug, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
enum FinalRequest {
    Succeeded { result: Value },
    Failed { error: String },
}

async fn final_report(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(request): Json<FinalRequest>,
) -> GatewayResult<StatusCode> {
    match request {
        FinalRequest::Succeeded { result } => {
            state.store.apply_final(&id, Some(result), None)?;
        }
        FinalRequest::Failed { error } => {
            state.store.apply_final(&id, None, Some(error))?;
        }
    }
    Ok(StatusCode::OK)
}
