//! The consume→dispatch→route loop: one [`Router`] per actor pod.
//!
//! `handle_envelope` is the unit-testable core: it takes a
//! [`RouterTransport`] + [`RuntimeBridgeClient`] trait object pair instead
//! of a concrete transport, so routing/fan-out/deadline logic can be
//! exercised without a real broker (teacher precedent: the broker module's
//! `MessageBroker<M>` trait boundary, narrowed here to `dyn` since the
//! sidecar is not on the in-process mailbox's hot path).

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use futures::StreamExt;
use tracing::{error, info, warn};

use asya_core::reserved::{ERROR_END, HAPPY_END};
use asya_core::{Envelope, Route, TransportAdapter};
use asya_runtime_bridge::{RuntimeBridgeClient, RuntimeResponse};

use crate::error::{SidecarError, SidecarResult};
use crate::fanout::build_fanout_envelopes;
use crate::gateway_client::{
    CreateChildRequest, FinalReport, GatewayClient, ProgressStatus, ProgressUpdate,
};

/// The narrow, object-safe slice of [`TransportAdapter`] the router needs:
/// just enough to publish a downstream envelope. `TransportAdapter` itself
/// is not object-safe (it carries associated types), so every concrete
/// adapter gets this blanket impl instead.
#[async_trait]
pub trait RouterTransport: Send + Sync {
    async fn publish(&self, envelope: &Envelope, actor_name: &str) -> SidecarResult<()>;
}

#[async_trait]
impl<T> RouterTransport for T
where
    T: TransportAdapter + Send + Sync,
{
    async fn publish(&self, envelope: &Envelope, actor_name: &str) -> SidecarResult<()> {
        TransportAdapter::publish(self, envelope, actor_name)
            .await
            .map_err(|err| SidecarError::Publish {
                id: envelope.id.clone(),
                actor_name: actor_name.to_string(),
                source: Box::new(err),
            })
    }
}

/// What `handle_envelope` decided to do with one envelope: the list of
/// downstream envelopes it published (own id unchanged, or parent plus
/// minted fan-out children).
#[derive(Debug)]
pub struct RouteOutcome {
    pub published: Vec<(String, Envelope)>,
}

/// Owns the runtime-bridge client and gateway reporter for one actor pod.
pub struct Router<B: RuntimeBridgeClient> {
    pub actor_name: String,
    pub bridge: B,
    pub gateway: Arc<GatewayClient>,
}

impl<B: RuntimeBridgeClient> Router<B> {
    pub fn new(actor_name: impl Into<String>, bridge: B, gateway: Arc<GatewayClient>) -> Self {
        Self {
            actor_name: actor_name.into(),
            bridge,
            gateway,
        }
    }

    /// Runs the full consume→dispatch→route loop against a concrete
    /// transport adapter until `shutdown` fires or the consume stream ends.
    pub async fn run<T>(&mut self, transport: &T, queue_name: &str, mut shutdown: tokio::sync::watch::Receiver<bool>)
    where
        T: TransportAdapter + RouterTransport,
    {
        let mut stream = match transport.consume(queue_name).await {
            Ok(stream) => stream,
            Err(err) => {
                error!(%queue_name, %err, "failed to open consumer, router exiting");
                return;
            }
        };

        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("shutdown requested, stopping consume loop");
                        break;
                    }
                }
                delivery = stream.next() => {
                    let Some(delivery) = delivery else { break };
                    let delivery = match delivery {
                        Ok(delivery) => delivery,
                        Err(err) => {
                            warn!(%err, "transient consume error, will reconnect");
                            continue;
                        }
                    };

                    match self.handle_envelope(delivery.envelope, transport).await {
                        Ok(_) => {
                            if let Err(err) = transport.ack(delivery.ack_token).await {
                                error!(%err, "failed to ack a successfully routed envelope");
                            }
                        }
                        Err(err) if err.routes_to_error_end() => {
                            // Already reported to error-end by handle_envelope; ack.
                            if let Err(err) = transport.ack(delivery.ack_token).await {
                                error!(%err, "failed to ack an error-routed envelope");
                            }
                        }
                        Err(err) => {
                            warn!(%err, "publish failed, nacking for redelivery");
                            if let Err(err) = transport.nack(delivery.ack_token).await {
                                error!(%err, "failed to nack a failed envelope");
                            }
                        }
                    }
                }
            }
        }
    }

    /// The pure-ish routing core: dispatch to the runtime bridge, apply the
    /// response, and publish whatever comes next. Independent of any real
    /// transport or socket via its trait-object parameters.
    pub async fn handle_envelope(
        &mut self,
        envelope: Envelope,
        transport: &dyn RouterTransport,
    ) -> SidecarResult<RouteOutcome> {
        if self.actor_name == HAPPY_END || self.actor_name == ERROR_END {
            return self.handle_terminal(envelope).await;
        }

        let now = Utc::now();
        self.report_progress(&envelope, ProgressStatus::Received).await;

        if envelope.is_expired(now) {
            let published = self
                .route_to_error_end(envelope, "deadline exceeded before dispatch", transport)
                .await?;
            return Ok(RouteOutcome { published });
        }

        self.report_progress(&envelope, ProgressStatus::Processing).await;

        let response = match self.bridge.dispatch(envelope.clone(), envelope.deadline).await {
            Ok(response) => response,
            Err(err) => {
                warn!(id = %envelope.id, %err, "dispatch failed, routing to error-end");
                let published = self
                    .route_to_error_end(envelope, &err.to_string(), transport)
                    .await?;
                return Ok(RouteOutcome { published });
            }
        };

        if response.is_error() {
            let message = match response {
                RuntimeResponse::Error(message) => message,
                _ => unreachable!("is_error implies Error variant"),
            };
            let published = self
                .route_to_error_end(envelope.clone(), &message, transport)
                .await?;
            return Ok(RouteOutcome { published });
        }

        let published = match response {
            RuntimeResponse::Single(child) => {
                let routed = self.advance_and_route(*child, transport).await?;
                vec![routed]
            }
            RuntimeResponse::Multi(responses) => {
                self.fanout_and_route(&envelope.id, responses, transport)
                    .await?
            }
            RuntimeResponse::Error(_) => unreachable!("handled above"),
        };

        Ok(RouteOutcome { published })
    }

    /// `happy-end`/`error-end` pods don't advance or publish further: the
    /// user code behind them persists the outcome, and the sidecar's only
    /// job is to dispatch it and report the final disposition.
    async fn handle_terminal(&mut self, envelope: Envelope) -> SidecarResult<RouteOutcome> {
        self.report_progress(&envelope, ProgressStatus::Received).await;
        self.report_progress(&envelope, ProgressStatus::Processing).await;

        match self.bridge.dispatch(envelope.clone(), envelope.deadline).await {
            Ok(_) => {
                if self.actor_name == HAPPY_END {
                    self.gateway
                        .report_final(
                            &envelope.id,
                            &FinalReport::Succeeded {
                                result: envelope.payload.clone(),
                            },
                        )
                        .await;
                } else {
                    self.gateway
                        .report_final(
                            &envelope.id,
                            &FinalReport::Failed {
                                error: envelope.error.clone().unwrap_or_default(),
                            },
                        )
                        .await;
                }
            }
            Err(err) => {
                warn!(id = %envelope.id, actor = %self.actor_name, %err, "terminal actor dispatch failed");
                self.gateway
                    .report_final(&envelope.id, &FinalReport::Failed { error: err.to_string() })
                    .await;
            }
        }

        Ok(RouteOutcome { published: vec![] })
    }

    async fn advance_and_route(
        &self,
        mut envelope: Envelope,
        transport: &dyn RouterTransport,
    ) -> SidecarResult<(String, Envelope)> {
        envelope.route.advance()?;
        let actor_name = next_hop(&envelope.route);
        transport.publish(&envelope, &actor_name).await?;
        self.report_progress_for(&envelope, ProgressStatus::Completed)
            .await;
        Ok((actor_name, envelope))
    }

    async fn fanout_and_route(
        &self,
        parent_id: &str,
        responses: Vec<Envelope>,
        transport: &dyn RouterTransport,
    ) -> SidecarResult<Vec<(String, Envelope)>> {
        let pairs: Vec<(Route, serde_json::Value)> = responses
            .into_iter()
            .map(|mut env| {
                let _ = env.route.advance();
                (env.route, env.payload)
            })
            .collect();
        let children = build_fanout_envelopes(parent_id, pairs);

        let mut published = Vec::with_capacity(children.len());
        for child in children {
            if child.parent_id.is_some() {
                let request = CreateChildRequest {
                    id: child.id.clone(),
                    parent_id: parent_id.to_string(),
                    actors: child.route.actors.clone(),
                    current: child.route.current,
                };
                self.gateway.create_child_envelope(&request).await;
            }
            let actor_name = next_hop(&child.route);
            transport.publish(&child, &actor_name).await?;
            self.report_progress_for(&child, ProgressStatus::Completed)
                .await;
            published.push((actor_name, child));
        }
        Ok(published)
    }

    async fn route_to_error_end(
        &self,
        mut envelope: Envelope,
        message: &str,
        transport: &dyn RouterTransport,
    ) -> SidecarResult<Vec<(String, Envelope)>> {
        force_route_to(&mut envelope.route, ERROR_END);
        envelope.error = Some(message.to_string());
        transport.publish(&envelope, ERROR_END).await?;
        Ok(vec![(ERROR_END.to_string(), envelope)])
    }

    async fn report_progress(&self, envelope: &Envelope, status: ProgressStatus) {
        self.report_progress_for(envelope, status).await;
    }

    async fn report_progress_for(&self, envelope: &Envelope, status: ProgressStatus) {
        let gateway = self.gateway.clone();
        let update = ProgressUpdate {
            actors: envelope.route.actors.clone(),
            current_actor_idx: envelope.route.current,
            status,
            message: None,
            duration_ms: None,
            size_kb: None,
        };
        let envelope_id = envelope.id.clone();
        tokio::spawn(async move {
            gateway.report_progress(&envelope_id, &update).await;
        });
    }

}

/// The actor name the envelope's route currently points at: a terminal
/// actor once the user-defined route is exhausted.
fn next_hop(route: &Route) -> String {
    if route.is_exhausted() {
        HAPPY_END.to_string()
    } else {
        route
            .current_actor_name()
            .map(str::to_string)
            .unwrap_or_else(|| HAPPY_END.to_string())
    }
}

fn force_route_to(route: &mut Route, terminal: &str) {
    let prefix_len = route.current.min(route.actors.len());
    let mut actors = route.actors[..prefix_len].to_vec();
    actors.push(terminal.to_string());
    route.actors = actors;
    route.current = prefix_len;
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct RecordingTransport {
        published: Mutex<Vec<(String, Envelope)>>,
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

    struct FakeBridge {
        response: RuntimeResponse,
    }

    #[async_trait]
    impl RuntimeBridgeClient for FakeBridge {
        async fn dispatch(
            &mut self,
            _envelope: Envelope,
            _deadline: Option<chrono::DateTime<Utc>>,
        ) -> Result<RuntimeResponse, asya_runtime_bridge::BridgeError> {
            Ok(self.response.clone())
        }
    }

    fn test_envelope(id: &str, actors: &[&str]) -> Envelope {
        let route = Route::new(actors.iter().map(|s| s.to_string()).collect()).unwrap();
        Envelope::new(id, route, serde_json::json!({}))
    }

    fn gateway() -> Arc<GatewayClient> {
        Arc::new(GatewayClient::new("http://127.0.0.1:0", 1))
    }

    #[tokio::test]
    async fn single_response_advances_and_publishes_to_the_next_actor() {
        let envelope = test_envelope("env-1", &["parse", "summarize"]);
        let next = Envelope::new("env-1", envelope.route.clone(), serde_json::json!({"ok": true}));
        let bridge = FakeBridge {
            response: RuntimeResponse::Single(Box::new(next)),
        };
        let transport = RecordingTransport {
            published: Mutex::new(vec![]),
        };
        let mut router = Router::new("parse", bridge, gateway());

        let outcome = router.handle_envelope(envelope, &transport).await.unwrap();
        assert_eq!(outcome.published.len(), 1);
        assert_eq!(outcome.published[0].0, "summarize");
    }

    #[tokio::test]
    async fn exhausted_route_publishes_to_happy_end() {
        let envelope = test_envelope("env-1", &["parse"]);
        let next = Envelope::new("env-1", envelope.route.clone(), serde_json::json!({"ok": true}));
        let bridge = FakeBridge {
            response: RuntimeResponse::Single(Box::new(next)),
        };
        let transport = RecordingTransport {
            published: Mutex::new(vec![]),
        };
        let mut router = Router::new("parse", bridge, gateway());

        let outcome = router.handle_envelope(envelope, &transport).await.unwrap();
        assert_eq!(outcome.published[0].0, HAPPY_END);
    }

    #[tokio::test]
    async fn runtime_error_routes_to_error_end() {
        let envelope = test_envelope("env-1", &["parse"]);
        let bridge = FakeBridge {
            response: RuntimeResponse::Error("boom".into()),
        };
        let transport = RecordingTransport {
            published: Mutex::new(vec![]),
        };
        let mut router = Router::new("parse", bridge, gateway());

        let outcome = router.handle_envelope(envelope, &transport).await.unwrap();
        assert_eq!(outcome.published[0].0, ERROR_END);
        assert_eq!(outcome.published[0].1.error.as_deref(), Some("boom"));
    }

    #[tokio::test]
    async fn expired_deadline_short_circuits_to_error_end_without_dispatch() {
        let mut envelope = test_envelope("env-1", &["parse"]);
        envelope.deadline = Some(Utc::now() - chrono::Duration::seconds(5));
        let bridge = FakeBridge {
            response: RuntimeResponse::Error("should not be reached".into()),
        };
        let transport = RecordingTransport {
            published: Mutex::new(vec![]),
        };
        let mut router = Router::new("parse", bridge, gateway());

        let outcome = router.handle_envelope(envelope, &transport).await.unwrap();
        assert_eq!(outcome.published.len(), 1);
        assert_eq!(outcome.published[0].0, ERROR_END);
    }

    #[tokio::test]
    async fn happy_end_dispatches_and_reports_final_without_publishing() {
        let envelope = test_envelope("env-1", &[]);
        let bridge = FakeBridge {
            response: RuntimeResponse::Single(Box::new(envelope.clone())),
        };
        let transport = RecordingTransport {
            published: Mutex::new(vec![]),
        };
        let mut router = Router::new(HAPPY_END, bridge, gateway());

        let outcome = router.handle_envelope(envelope, &transport).await.unwrap();
        assert!(outcome.published.is_empty());
        assert!(transport.published.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn error_end_dispatches_and_reports_final_without_publishing() {
        let mut envelope = test_envelope("env-1", &[]);
        envelope.error = Some("boom".to_string());
        let bridge = FakeBridge {
            response: RuntimeResponse::Single(Box::new(envelope.clone())),
        };
        let transport = RecordingTransport {
            published: Mutex::new(vec![]),
        };
        let mut router = Router::new(ERROR_END, bridge, gateway());

        let outcome = router.handle_envelope(envelope, &transport).await.unwrap();
        assert!(outcome.published.is_empty());
        assert!(transport.published.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn multi_response_mints_children_and_publishes_each() {
        let envelope = test_envelope("env-1", &["parse", "summarize"]);
        let responses = vec![
            Envelope::new("env-1", envelope.route.clone(), serde_json::json!({"branch": 0})),
            Envelope::new("env-1", envelope.route.clone(), serde_json::json!({"branch": 1})),
        ];
        let bridge = FakeBridge {
            response: RuntimeResponse::Multi(responses),
        };
        let transport = RecordingTransport {
            published: Mutex::new(vec![]),
        };
        let mut router = Router::new("parse", bridge, gateway());

        let outcome = router.handle_envelope(envelope, &transport).await.unwrap();
        assert_eq!(outcome.published.len(), 2);
        assert_eq!(outcome.published[0].1.id, "env-1");
        assert_eq!(outcome.published[1].1.id, "env-1-1");
        assert_eq!(outcome.published[1].1.parent_id.as_deref(), Some("env-1"));
    }
}
