//! The envelope: the unit of work traversing the Asya mesh.
//!
//! # Example
//!
//! ```rust
//! use asya_core::{Envelope, Route};
//!
//! let route = Route::new(vec!["parse".into(), "enrich".into()]).unwrap();
//! let envelope = Envelope::new("env-1", route, serde_json::json!({"text": "hi"}));
//!
//! assert_eq!(envelope.status, asya_core::EnvelopeStatus::Pending);
//! assert!(envelope.is_active());
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{CoreError, CoreResult};
use crate::route::Route;

/// The lifecycle status of an envelope. Terminal variants are sticky: once
/// reached, no further transition is permitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EnvelopeStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
}

impl EnvelopeStatus {
    /// Returns true for the two non-terminal statuses.
    pub fn is_active(self) -> bool {
        matches!(self, EnvelopeStatus::Pending | EnvelopeStatus::Running)
    }

    /// Returns true for the two terminal statuses.
    pub fn is_terminal(self) -> bool {
        !self.is_active()
    }
}

impl std::fmt::Display for EnvelopeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            EnvelopeStatus::Pending => "Pending",
            EnvelopeStatus::Running => "Running",
            EnvelopeStatus::Succeeded => "Succeeded",
            EnvelopeStatus::Failed => "Failed",
        };
        f.write_str(s)
    }
}

/// The unit of work traversing the Asya mesh: a route, an opaque payload,
/// an optional deadline, and lifecycle/timing bookkeeping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    pub route: Route,
    pub payload: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deadline: Option<DateTime<Utc>>,
    pub status: EnvelopeStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub progress_percent: f64,
    /// The most recent progress `message`, distinct from the terminal
    /// `result`: set any number of times while Pending/Running, never
    /// consulted once the envelope reaches a terminal status.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_actor_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Envelope {
    /// Creates a new, Pending envelope with no parent, deadline, result, or
    /// error.
    pub fn new(id: impl Into<String>, route: Route, payload: Value) -> Self {
        let now = Utc::now();
        let current_actor_name = route.current_actor_name().map(str::to_string);
        Self {
            id: id.into(),
            parent_id: None,
            route,
            payload,
            deadline: None,
            status: EnvelopeStatus::Pending,
            result: None,
            error: None,
            progress_percent: 0.0,
            progress_message: None,
            current_actor_name,
            created_at: now,
            updated_at: now,
        }
    }

    /// Builder method: attach a parent id, marking this envelope as a
    /// fan-out child.
    pub fn with_parent_id(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    /// Builder method: attach an absolute deadline.
    pub fn with_deadline(mut self, deadline: DateTime<Utc>) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Returns true iff status is Pending or Running.
    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }

    /// Returns true if `deadline` is set and `now` is past it.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.deadline.map(|d| now > d).unwrap_or(false)
    }

    /// Transitions to Running, refreshing `updated_at`. A no-op (but not an
    /// error) if already Running; rejected if already terminal.
    pub fn mark_running(&mut self) -> CoreResult<()> {
        if self.status.is_terminal() {
            return Err(CoreError::already_terminal(&self.id, self.status.to_string()));
        }
        self.status = EnvelopeStatus::Running;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Transitions to Succeeded with `result`. Terminal transitions are
    /// sticky: calling this on an already-terminal envelope is rejected.
    pub fn mark_succeeded(&mut self, result: Value) -> CoreResult<()> {
        if self.status.is_terminal() {
            return Err(CoreError::already_terminal(&self.id, self.status.to_string()));
        }
        self.status = EnvelopeStatus::Succeeded;
        self.result = Some(result);
        self.progress_percent = 100.0;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Transitions to Failed with `error`. Terminal transitions are sticky.
    pub fn mark_failed(&mut self, error: impl Into<String>) -> CoreResult<()> {
        if self.status.is_terminal() {
            return Err(CoreError::already_terminal(&self.id, self.status.to_string()));
        }
        self.status = EnvelopeStatus::Failed;
        self.error = Some(error.into());
        self.updated_at = Utc::now();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_route() -> Route {
        Route::new(vec!["parse".into(), "enrich".into()]).unwrap()
    }

    #[test]
    fn new_envelope_is_pending_and_active() {
        let env = Envelope::new("e1", sample_route(), serde_json::json!({}));
        assert_eq!(env.status, EnvelopeStatus::Pending);
        assert!(env.is_active());
        assert_eq!(env.progress_percent, 0.0);
        assert_eq!(env.current_actor_name.as_deref(), Some("parse"));
    }

    #[test]
    fn mark_succeeded_sets_result_and_terminal_status() {
        let mut env = Envelope::new("e1", sample_route(), serde_json::json!({}));
        env.mark_succeeded(serde_json::json!({"ok": true})).unwrap();
        assert_eq!(env.status, EnvelopeStatus::Succeeded);
        assert!(env.result.is_some());
        assert!(env.error.is_none());
        assert_eq!(env.progress_percent, 100.0);
    }

    #[test]
    fn mark_failed_sets_error_and_terminal_status() {
        let mut env = Envelope::new("e1", sample_route(), serde_json::json!({}));
        env.mark_failed("boom").unwrap();
        assert_eq!(env.status, EnvelopeStatus::Failed);
        assert_eq!(env.error.as_deref(), Some("boom"));
        assert!(env.result.is_none());
    }

    #[test]
    fn terminal_status_is_sticky() {
        let mut env = Envelope::new("e1", sample_route(), serde_json::json!({}));
        env.mark_succeeded(serde_json::json!(1)).unwrap();
        let err = env.mark_failed("too late").unwrap_err();
        assert_eq!(env.status, EnvelopeStatus::Succeeded);
        assert_eq!(err.category(), "already_terminal");
    }

    #[test]
    fn deadline_expiry_is_relative_to_supplied_now() {
        let mut env = Envelope::new("e1", sample_route(), serde_json::json!({}));
        env.deadline = Some(Utc::now() - chrono::Duration::seconds(1));
        assert!(env.is_expired(Utc::now()));

        let mut env2 = Envelope::new("e2", sample_route(), serde_json::json!({}));
        env2.deadline = Some(Utc::now() + chrono::Duration::seconds(60));
        assert!(!env2.is_expired(Utc::now()));
    }

    #[test]
    fn no_deadline_never_expires() {
        let env = Envelope::new("e1", sample_route(), serde_json::json!({}));
        assert!(!env.is_expired(Utc::now() + chrono::Duration::days(365)));
    }

    #[test]
    fn with_parent_id_marks_fanout_child() {
        let env = Envelope::new("p-1", sample_route(), serde_json::json!({})).with_parent_id("p");
        assert_eq!(env.parent_id.as_deref(), Some("p"));
    }
}
