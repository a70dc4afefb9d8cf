//! End-to-end router behavior exercised against a mocked gateway, without
//! any real transport or runtime-bridge socket.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use asya_core::{Envelope, Route};
use asya_runtime_bridge::{BridgeError, RuntimeBridgeClient, RuntimeResponse};
use asya_sidecar::router::RouterTransport;
use asya_sidecar::{GatewayClient, Router, SidecarResult};
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

struct RecordingTransport {
    published: Mutex<Vec<(String, Envelope)>>,
}

impl RecordingTransport {
    fn new() -> Self {
        Self {
            published: Mutex::new(vec![]),
        }
    }
}

#[async_trait]
impl RouterTransport for RecordingTransport {
    async fn publish(&self, envelope: &Envelope, actor_name: &str) -> SidecarResult<()> {
        self.published
            .lock()
            .unwrap()
            .push((actor_name.to_string(), envelope.clone()));
        Ok(())
    }
}

struct ScriptedBridge {
    response: RuntimeResponse,
}

#[async_trait]
impl RuntimeBridgeClient for ScriptedBridge {
    async fn dispatch(
        &mut self,
        _envelope: Envelope,
        _deadline: Option<chrono::DateTime<chrono::Utc>>,
    ) -> Result<RuntimeResponse, BridgeError> {
        Ok(self.response.clone())
    }
}

async fn gateway_with_mock() -> (MockServer, Arc<GatewayClient>) {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    let client = Arc::new(GatewayClient::new(server.uri(), 3));
    (server, client)
}

#[tokio::test]
async fn happy_path_advances_through_two_actors_to_happy_end() {
    let (server, gateway) = gateway_with_mock().await;

    let route = Route::new(vec!["parse".into(), "summarize".into()]).unwrap();
    let envelope = Envelope::new("env-1", route.clone(), serde_json::json!({"text": "hi"}));

    // First hop: parse -> summarize.
    let next = Envelope::new("env-1", route.clone(), serde_json::json!({"parsed": true}));
    let bridge = ScriptedBridge {
        response: RuntimeResponse::Single(Box::new(next)),
    };
    let transport = RecordingTransport::new();
    let mut router = Router::new("parse", bridge, gateway.clone());

    let outcome = router.handle_envelope(envelope, &transport).await.unwrap();
    assert_eq!(outcome.published[0].0, "summarize");

    // Second hop: summarize -> happy-end.
    let summarize_route = outcome.published[0].1.route.clone();
    let final_response = Envelope::new(
        "env-1",
        summarize_route.clone(),
        serde_json::json!({"summary": "ok"}),
    );
    let bridge2 = ScriptedBridge {
        response: RuntimeResponse::Single(Box::new(final_response)),
    };
    let mut router2 = Router::new("summarize", bridge2, gateway);
    let outcome2 = router2
        .handle_envelope(outcome.published[0].1.clone(), &transport)
        .await
        .unwrap();

    assert_eq!(outcome2.published[0].0, asya_core::reserved::HAPPY_END);
    drop(server);
}

#[tokio::test]
async fn expired_deadline_never_reaches_the_runtime_bridge() {
    let (server, gateway) = gateway_with_mock().await;
    let route = Route::new(vec!["parse".into()]).unwrap();
    let mut envelope = Envelope::new("env-1", route, serde_json::json!({}));
    envelope.deadline = Some(chrono::Utc::now() - chrono::Duration::seconds(30));

    let bridge = ScriptedBridge {
        response: RuntimeResponse::Error("dispatch should never happen".into()),
    };
    let transport = RecordingTransport::new();
    let mut router = Router::new("parse", bridge, gateway);

    let outcome = router.handle_envelope(envelope, &transport).await.unwrap();
    assert_eq!(outcome.published.len(), 1);
    assert_eq!(outcome.published[0].0, asya_core::reserved::ERROR_END);
    drop(server);
}

#[tokio::test]
async fn fanout_registers_each_child_with_the_gateway() {
    let (server, gateway) = gateway_with_mock().await;
    let route = Route::new(vec!["parse".into(), "summarize".into()]).unwrap();
    let envelope = Envelope::new("env-1", route.clone(), serde_json::json!({}));

    let responses = vec![
        Envelope::new("env-1", route.clone(), serde_json::json!({"branch": "a"})),
        Envelope::new("env-1", route.clone(), serde_json::json!({"branch": "b"})),
        Envelope::new("env-1", route, serde_json::json!({"branch": "c"})),
    ];
    let bridge = ScriptedBridge {
        response: RuntimeResponse::Multi(responses),
    };
    let transport = RecordingTransport::new();
    let mut router = Router::new("parse", bridge, gateway);

    let outcome = router.handle_envelope(envelope, &transport).await.unwrap();
    assert_eq!(outcome.published.len(), 3);
    assert_eq!(outcome.published[0].1.id, "env-1");
    assert_eq!(outcome.published[1].1.id, "env-1-1");
    assert_eq!(outcome.published[2].1.id, "env-1-2");
    drop(server);
}
