//! The sidecar's side of the runtime bridge: send one request frame, read
//! the response frame sequence, and assemble it into a [`RuntimeResponse`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::{SinkExt, StreamExt};
use tokio::net::UnixStream;
use tokio_util::codec::Framed;
use tracing::{debug, warn};

use asya_core::Envelope;

use crate::codec::RuntimeFrameCodec;
use crate::error::{BridgeError, BridgeResult};
use crate::protocol::{RuntimeFrame, RuntimeRequest, RuntimeResponse};

/// Abstraction over "send an envelope to user code, get a response back",
/// so the sidecar router can be tested against a fake bridge without a
/// real socket.
#[async_trait]
pub trait RuntimeBridgeClient: Send + Sync {
    /// Dispatches `envelope` and waits for the full response sequence,
    /// bounded by `deadline` (the envelope's own deadline dominates any
    /// internal timeout, per the design notes).
    async fn dispatch(
        &mut self,
        envelope: Envelope,
        deadline: Option<DateTime<Utc>>,
    ) -> BridgeResult<RuntimeResponse>;
}

/// A [`RuntimeBridgeClient`] backed by a Unix domain socket, framed with
/// [`RuntimeFrameCodec`].
pub struct UnixSocketBridgeClient {
    framed: Framed<UnixStream, RuntimeFrameCodec>,
}

impl UnixSocketBridgeClient {
    /// Connects to the runtime's listening socket at `path`.
    pub async fn connect(path: &std::path::Path) -> BridgeResult<Self> {
        let stream = UnixStream::connect(path).await?;
        Ok(Self {
            framed: Framed::new(stream, RuntimeFrameCodec::default()),
        })
    }

    async fn read_response_sequence(&mut self) -> BridgeResult<RuntimeResponse> {
        let first = self
            .framed
            .next()
            .await
            .ok_or(BridgeError::ConnectionClosed)??;

        match first {
            RuntimeFrame::Error { message } => Ok(RuntimeResponse::Error(message)),
            RuntimeFrame::Header { count } if count == 0 => {
                Err(BridgeError::EmptyResponse { declared: 0 })
            }
            RuntimeFrame::Header { count } => {
                let mut envelopes = Vec::with_capacity(count);
                for _ in 0..count {
                    let frame = self
                        .framed
                        .next()
                        .await
                        .ok_or(BridgeError::ConnectionClosed)??;
                    match frame {
                        RuntimeFrame::Payload { envelope } => envelopes.push(envelope),
                        other => {
                            return Err(BridgeError::UnexpectedFrame {
                                detail: format!("expected Payload, got {other:?}"),
                            })
                        }
                    }
                }
                if envelopes.len() == 1 {
                    Ok(RuntimeResponse::Single(Box::new(
                        envelopes.into_iter().next().expect("len checked above"),
                    )))
                } else {
                    Ok(RuntimeResponse::Multi(envelopes))
                }
            }
            RuntimeFrame::Payload { .. } => Err(BridgeError::UnexpectedFrame {
                detail: "expected Header or Error as first frame, got Payload".into(),
            }),
        }
    }
}

#[async_trait]
impl RuntimeBridgeClient for UnixSocketBridgeClient {
    async fn dispatch(
        &mut self,
        envelope: Envelope,
        deadline: Option<DateTime<Utc>>,
    ) -> BridgeResult<RuntimeResponse> {
        let envelope_id = envelope.id.clone();
        self.framed
            .send(RuntimeFrame::Payload {
                envelope: RuntimeRequest::new(envelope).envelope,
            })
            .await?;
        debug!(envelope_id = %envelope_id, "dispatched envelope to runtime");

        let work = self.read_response_sequence();
        let response = match deadline {
            Some(deadline) => {
                let remaining = (deadline - Utc::now())
                    .to_std()
                    .unwrap_or(std::time::Duration::ZERO);
                match tokio::time::timeout(remaining, work).await {
                    Ok(result) => result?,
                    Err(_) => {
                        warn!(envelope_id = %envelope_id, "runtime bridge dispatch timed out");
                        return Err(BridgeError::Timeout);
                    }
                }
            }
            None => work.await?,
        };

        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::UnixListener;

    fn test_envelope(id: &str) -> Envelope {
        Envelope::new(
            id,
            asya_core::Route::new(vec!["parse".into()]).unwrap(),
            serde_json::json!({}),
        )
    }

    #[tokio::test]
    async fn dispatch_assembles_single_response() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bridge.sock");
        let listener = UnixListener::bind(&path).unwrap();

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut framed = Framed::new(stream, RuntimeFrameCodec::default());
            let _request = framed.next().await.unwrap().unwrap();
            framed
                .send(RuntimeFrame::Header { count: 1 })
                .await
                .unwrap();
            framed
                .send(RuntimeFrame::Payload {
                    envelope: test_envelope("e1"),
                })
                .await
                .unwrap();
        });

        let mut client = UnixSocketBridgeClient::connect(&path).await.unwrap();
        let response = client.dispatch(test_envelope("e1"), None).await.unwrap();
        assert!(matches!(response, RuntimeResponse::Single(_)));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn dispatch_assembles_multi_response_for_fanout() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bridge.sock");
        let listener = UnixListener::bind(&path).unwrap();

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut framed = Framed::new(stream, RuntimeFrameCodec::default());
            let _request = framed.next().await.unwrap().unwrap();
            framed
                .send(RuntimeFrame::Header { count: 3 })
                .await
                .unwrap();
            for i in 0..3 {
                framed
                    .send(RuntimeFrame::Payload {
                        envelope: test_envelope(&format!("e1-{i}")),
                    })
                    .await
                    .unwrap();
            }
        });

        let mut client = UnixSocketBridgeClient::connect(&path).await.unwrap();
        let response = client.dispatch(test_envelope("e1"), None).await.unwrap();
        match response {
            RuntimeResponse::Multi(envelopes) => assert_eq!(envelopes.len(), 3),
            other => panic!("expected Multi, got {other:?}"),
        }
        server.await.unwrap();
    }

    #[tokio::test]
    async fn dispatch_surfaces_runtime_error_frame() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bridge.sock");
        let listener = UnixListener::bind(&path).unwrap();

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut framed = Framed::new(stream, RuntimeFrameCodec::default());
            let _request = framed.next().await.unwrap().unwrap();
            framed
                .send(RuntimeFrame::Error {
                    message: "handler raised ValueError".into(),
                })
                .await
                .unwrap();
        });

        let mut client = UnixSocketBridgeClient::connect(&path).await.unwrap();
        let response = client.dispatch(test_envelope("e1"), None).await.unwrap();
        match response {
            RuntimeResponse::Error(message) => assert!(message.contains("ValueError")),
            other => panic!("expected Error, got {other:?}"),
        }
        server.await.unwrap();
    }

    #[tokio::test]
    async fn dispatch_times_out_when_deadline_passed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bridge.sock");
        let listener = UnixListener::bind(&path).unwrap();

        let server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 4];
            let _ = stream.read(&mut buf).await;
            // Never respond; hold the connection open past the deadline.
            tokio::time::sleep(std::time::Duration::from_millis(200)).await;
            let _ = stream.write_all(b"\0\0\0\0").await;
        });

        let mut client = UnixSocketBridgeClient::connect(&path).await.unwrap();
        let deadline = Utc::now() + chrono::Duration::milliseconds(20);
        let result = client.dispatch(test_envelope("e1"), Some(deadline)).await;
        assert!(matches!(result, Err(BridgeError::Timeout)));
        server.abort();
    }
}
