//! End-to-end HTTP tests against a real bound server, using an in-memory
//! fake publisher instead of a real broker.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use asya_core::Envelope;
use asya_gateway::publisher::QueuePublisher;
use asya_gateway::{build_router, AppState, EnvelopeStore, GatewayError, ToolRegistry};

struct FakePublisher {
    published: Mutex<Vec<(String, String)>>,
}

#[async_trait]
impl QueuePublisher for FakePublisher {
    async fn publish(&self, envelope: &Envelope, actor_name: &str) -> Result<(), GatewayError> {
        self.published
            .lock()
            .unwrap()
            .push((actor_name.to_string(), envelope.id.clone()));
        Ok(())
    }
}

const TOOLS_TOML: &str = r#"
    [tools.summarize]
    actors = ["parse", "enrich", "summarize"]
    required_args = ["text"]
    default_timeout_secs = 5
"#;

async fn spawn_server() -> (String, Arc<FakePublisher>) {
    let tools = Arc::new(ToolRegistry::from_toml_str(TOOLS_TOML).unwrap());
    let store = Arc::new(EnvelopeStore::new(64));
    let publisher = Arc::new(FakePublisher {
        published: Mutex::new(vec![]),
    });
    let state = Arc::new(AppState {
        store,
        tools,
        publisher: publisher.clone(),
        sse_keepalive: std::time::Duration::from_secs(15),
    });

    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}"), publisher)
}

#[tokio::test]
async fn health_check_returns_ok() {
    let (base, _publisher) = spawn_server().await;
    let resp = reqwest::get(format!("{base}/health")).await.unwrap();
    assert_eq!(resp.status(), 200);
}

#[tokio::test]
async fn tool_call_mints_and_publishes_to_first_actor() {
    let (base, publisher) = spawn_server().await;
    let client = reqwest::Client::new();
    let resp = client
        .post(format!("{base}/tools/call"))
        .json(&serde_json::json!({"tool_name": "summarize", "arguments": {"text": "hi"}}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 202);
    let body: serde_json::Value = resp.json().await.unwrap();
    let id = body["id"].as_str().unwrap().to_string();
    assert!(!id.is_empty());

    let published = publisher.published.lock().unwrap();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].0, "parse");
    assert_eq!(published[0].1, id);
}

#[tokio::test]
async fn tool_call_rejects_missing_required_argument() {
    let (base, _publisher) = spawn_server().await;
    let client = reqwest::Client::new();
    let resp = client
        .post(format!("{base}/tools/call"))
        .json(&serde_json::json!({"tool_name": "summarize", "arguments": {}}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
}

#[tokio::test]
async fn tool_call_rejects_unknown_tool() {
    let (base, _publisher) = spawn_server().await;
    let client = reqwest::Client::new();
    let resp = client
        .post(format!("{base}/tools/call"))
        .json(&serde_json::json!({"tool_name": "nope", "arguments": {}}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn progress_ingest_computes_percent_and_snapshot_reflects_it() {
    let (base, _publisher) = spawn_server().await;
    let client = reqwest::Client::new();
    let call = client
        .post(format!("{base}/tools/call"))
        .json(&serde_json::json!({"tool_name": "summarize", "arguments": {"text": "hi"}}))
        .send()
        .await
        .unwrap();
    let body: serde_json::Value = call.json().await.unwrap();
    let id = body["id"].as_str().unwrap().to_string();

    let resp = client
        .post(format!("{base}/envelopes/{id}/progress"))
        .json(&serde_json::json!({
            "actors": ["parse", "enrich", "summarize"],
            "current_actor_idx": 0,
            "status": "completed"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let progress: serde_json::Value = resp.json().await.unwrap();
    let percent = progress["progress_percent"].as_f64().unwrap();
    assert!((percent - 33.33).abs() < 0.5);

    let snapshot: serde_json::Value = client
        .get(format!("{base}/envelopes/{id}"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!((snapshot["progress_percent"].as_f64().unwrap() - 33.33).abs() < 0.5);
}

#[tokio::test]
async fn fanout_child_create_rejects_duplicate_id() {
    let (base, _publisher) = spawn_server().await;
    let client = reqwest::Client::new();
    let body = serde_json::json!({
        "id": "p-1",
        "parent_id": "p",
        "actors": ["enrich", "summarize"],
        "current": 0
    });
    let first = client
        .post(format!("{base}/envelopes"))
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(first.status(), 201);

    let second = client
        .post(format!("{base}/envelopes"))
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(second.status(), 409);
}

#[tokio::test]
async fn active_endpoint_reports_gone_after_final() {
    let (base, _publisher) = spawn_server().await;
    let client = reqwest::Client::new();
    let call = client
        .post(format!("{base}/tools/call"))
        .json(&serde_json::json!({"tool_name": "summarize", "arguments": {"text": "hi"}}))
        .send()
        .await
        .unwrap();
    let body: serde_json::Value = call.json().await.unwrap();
    let id = body["id"].as_str().unwrap().to_string();

    let active = client.get(format!("{base}/envelopes/{id}/active")).send().await.unwrap();
    assert_eq!(active.status(), 200);

    let final_resp = client
        .post(format!("{base}/envelopes/{id}/final"))
        .json(&serde_json::json!({"outcome": "succeeded", "result": {"ok": true}}))
        .send()
        .await
        .unwrap();
    assert_eq!(final_resp.status(), 200);

    let gone = client.get(format!("{base}/envelopes/{id}/active")).send().await.unwrap();
    assert_eq!(gone.status(), 410);
}
