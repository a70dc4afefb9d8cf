//! `GatewayError`: the HTTP-facing error type, following the same
//! struct-variant `thiserror` shape used across the workspace.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

/// Result type alias for gateway operations.
pub type GatewayResult<T> = Result<T, GatewayError>;

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("envelope '{id}' was not found")]
    NotFound { id: String },

    #[error("envelope '{id}' already exists")]
    AlreadyExists { id: String },

    #[error("envelope id must be non-empty and must not contain '/'")]
    InvalidEnvelopeId,

    #[error("unknown tool '{name}'")]
    UnknownTool { name: String },

    #[error("tool '{tool_name}' requires argument '{name}'")]
    MissingArgument { tool_name: String, name: String },

    #[error(
        "progress update actors list (len {reported_len}) cannot cover the reported position {current_actor_idx}"
    )]
    InvalidProgressActors {
        reported_len: usize,
        current_actor_idx: usize,
    },

    #[error("extra path segments are not permitted")]
    TooManyPathSegments,

    #[error(transparent)]
    Core(#[from] asya_core::CoreError),

    #[error("failed to publish envelope '{id}' to '{actor_name}'")]
    Publish {
        id: String,
        actor_name: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("gateway configuration error: {0}")]
    Config(String),

    #[error("internal store error: {0}")]
    Internal(String),
}

impl GatewayError {
    pub fn missing_argument(tool_name: impl Into<String>, name: impl Into<String>) -> Self {
        Self::MissingArgument {
            tool_name: tool_name.into(),
            name: name.into(),
        }
    }

    pub fn invalid_progress_actors(reported_len: usize, current_actor_idx: usize) -> Self {
        Self::InvalidProgressActors {
            reported_len,
            current_actor_idx,
        }
    }

    /// True for errors that are the caller's fault, not the gateway's.
    pub fn is_validation_error(&self) -> bool {
        matches!(
            self,
            GatewayError::InvalidEnvelopeId
                | GatewayError::UnknownTool { .. }
                | GatewayError::MissingArgument { .. }
                | GatewayError::InvalidProgressActors { .. }
                | GatewayError::TooManyPathSegments
                | GatewayError::AlreadyExists { .. }
        )
    }

    /// A short category tag, useful as a structured log field.
    pub fn category(&self) -> &'static str {
        match self {
            GatewayError::NotFound { .. } => "not_found",
            GatewayError::AlreadyExists { .. } => "already_exists",
            GatewayError::InvalidEnvelopeId => "invalid_id",
            GatewayError::UnknownTool { .. } => "unknown_tool",
            GatewayError::MissingArgument { .. } => "missing_argument",
            GatewayError::InvalidProgressActors { .. } => "invalid_progress_actors",
            GatewayError::TooManyPathSegments => "too_many_path_segments",
            GatewayError::Core(err) => err.category(),
            GatewayError::Publish { .. } => "publish_failed",
            GatewayError::Config(_) => "config",
            GatewayError::Internal(_) => "internal",
        }
    }

    fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::NotFound { .. } => StatusCode::NOT_FOUND,
            GatewayError::AlreadyExists { .. } => StatusCode::CONFLICT,
            GatewayError::InvalidEnvelopeId
            | GatewayError::UnknownTool { .. }
            | GatewayError::MissingArgument { .. }
            | GatewayError::InvalidProgressActors { .. }
            | GatewayError::TooManyPathSegments => StatusCode::BAD_REQUEST,
            GatewayError::Core(err) if err.is_validation_error() => StatusCode::BAD_REQUEST,
            GatewayError::Core(_) | GatewayError::Publish { .. } | GatewayError::Config(_) | GatewayError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    category: &'static str,
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorBody {
            error: self.to_string(),
            category: self.category(),
        };
        (status, axum::Json(body)).into_response()
    }
}
