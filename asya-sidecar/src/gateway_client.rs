//! Thin `reqwest` wrapper around the gateway's envelope-lifecycle API.
//!
//! Every call runs the shared [`asya_transport::backoff`] retry policy,
//! bounded to the sidecar's configured attempt count — progress and final
//! reports are best-effort, so a caller spawns them with `tokio::spawn`
//! rather than awaiting them inline on the consume loop.

use std::time::Duration;

use asya_transport::{retry, BackoffPolicy};
use serde::Serialize;
use serde_json::Value;
use tracing::warn;

/// One step of a progress report, mirroring the gateway's ingest schema.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ProgressStatus {
    Received,
    Processing,
    Completed,
}

/// Body of `POST /envelopes/{id}/progress`.
#[derive(Debug, Clone, Serialize)]
pub struct ProgressUpdate {
    pub actors: Vec<String>,
    pub current_actor_idx: usize,
    pub status: ProgressStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_kb: Option<u64>,
}

/// Body of `POST /envelopes/{id}/final`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum FinalReport {
    Succeeded { result: Value },
    Failed { error: String },
}

/// Body of `POST /envelopes` (fan-out child creation).
#[derive(Debug, Clone, Serialize)]
pub struct CreateChildRequest {
    pub id: String,
    pub parent_id: String,
    pub actors: Vec<String>,
    pub current: usize,
}

/// A gateway API client, retrying transient HTTP failures with backoff.
#[derive(Clone)]
pub struct GatewayClient {
    http: reqwest::Client,
    base_url: String,
    backoff: BackoffPolicy,
}

impl GatewayClient {
    /// Builds a client bounded to `max_attempts` retries per call and a
    /// per-attempt timeout of 5 seconds, per the concurrency model's
    /// "sidecar progress posts use a 5s per-attempt timeout" rule.
    pub fn new(base_url: impl Into<String>, max_attempts: u32) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap_or_default();
        Self {
            http,
            base_url: base_url.into(),
            backoff: BackoffPolicy::new(Duration::from_millis(200), max_attempts, Duration::from_secs(2))
                .with_jitter(0.1),
        }
    }

    /// Reports a progress update for `envelope_id`. If `envelope_id` is
    /// empty, the report is skipped entirely (nothing to attach it to).
    pub async fn report_progress(&self, envelope_id: &str, update: &ProgressUpdate) {
        if envelope_id.is_empty() {
            return;
        }
        let url = format!("{}/envelopes/{}/progress", self.base_url, envelope_id);
        self.post_best_effort(&url, update).await;
    }

    /// Reports the terminal outcome for `envelope_id`.
    pub async fn report_final(&self, envelope_id: &str, report: &FinalReport) {
        if envelope_id.is_empty() {
            return;
        }
        let url = format!("{}/envelopes/{}/final", self.base_url, envelope_id);
        self.post_best_effort(&url, report).await;
    }

    /// Registers a fan-out child envelope with the gateway before
    /// publishing it downstream.
    pub async fn create_child_envelope(&self, request: &CreateChildRequest) -> bool {
        let url = format!("{}/envelopes", self.base_url);
        self.post_best_effort(&url, request).await
    }

    /// Pings the gateway's health endpoint, used during the sidecar's
    /// bounded startup probe window. Never retried: a single failed probe
    /// just means "not ready yet".
    pub async fn health_check(&self) -> bool {
        let url = format!("{}/health", self.base_url);
        self.http
            .get(url)
            .send()
            .await
            .map(|resp| resp.status().is_success())
            .unwrap_or(false)
    }

    async fn post_best_effort<T: Serialize>(&self, url: &str, body: &T) -> bool {
        let result = retry(
            &self.backoff,
            |_err: &reqwest::Error| true,
            || async {
                self.http
                    .post(url)
                    .json(body)
                    .send()
                    .await
                    .and_then(|resp| resp.error_for_status())
            },
        )
        .await;

        match result {
            Ok(_) => true,
            Err(err) => {
                warn!(%url, %err, "gateway report did not succeed within retry budget");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn report_progress_is_skipped_for_an_empty_envelope_id() {
        let server = MockServer::start().await;
        let client = GatewayClient::new(server.uri(), 3);
        client
            .report_progress(
                "",
                &ProgressUpdate {
                    actors: vec![],
                    current_actor_idx: 0,
                    status: ProgressStatus::Received,
                    message: None,
                    duration_ms: None,
                    size_kb: None,
                },
            )
            .await;
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn report_final_posts_to_the_final_endpoint() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/envelopes/env-1/final"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let client = GatewayClient::new(server.uri(), 3);
        client
            .report_final(
                "env-1",
                &FinalReport::Succeeded {
                    result: serde_json::json!({"ok": true}),
                },
            )
            .await;
    }

    #[tokio::test]
    async fn post_best_effort_retries_until_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/envelopes/env-1/progress"))
            .respond_with(ResponseTemplate::new(500))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/envelopes/env-1/progress"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let client = GatewayClient::new(server.uri(), 3);
        client
            .report_progress(
                "env-1",
                &ProgressUpdate {
                    actors: vec!["parse".into()],
                    current_actor_idx: 0,
                    status: ProgressStatus::Received,
                    message: None,
                    duration_ms: None,
                    size_kb: None,
                },
            )
            .await;
    }

    #[tokio::test]
    async fn health_check_reports_false_when_unreachable() {
        let client = GatewayClient::new("http://127.0.0.1:0", 1);
        assert!(!client.health_check().await);
    }
}
