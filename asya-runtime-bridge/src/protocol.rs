//! Wire protocol for the runtime bridge.
//!
//! The open question in the design notes — how the runtime signals
//! "end of responses" — is resolved here: the runtime's first frame is
//! always a [`RuntimeFrame::Header`] declaring how many payload frames
//! follow, or a lone [`RuntimeFrame::Error`] frame for a runtime-side
//! failure. The sidecar never has to watch for a sentinel mid-stream.

use asya_core::Envelope;
use serde::{Deserialize, Serialize};

/// One frame of the runtime-bridge wire protocol.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RuntimeFrame {
    /// Always the first frame of a successful exchange: declares how many
    /// `Payload` frames will follow. `count` is always `>= 1`.
    Header { count: usize },
    /// Carries one envelope. Used both for the sidecar's single request
    /// frame and for each of the `count` response frames that follow a
    /// `Header`.
    Payload { envelope: Envelope },
    /// A runtime-side failure. Either the only frame sent, or (never
    /// alongside a `Header`) reported in isolation.
    Error { message: String },
}

/// The single request frame sent to the runtime: the whole envelope,
/// unmodified by the sidecar.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeRequest {
    pub envelope: Envelope,
}

impl RuntimeRequest {
    pub fn new(envelope: Envelope) -> Self {
        Self { envelope }
    }
}

/// The in-memory shape the sidecar router actually branches on, assembled
/// from the frame sequence by [`crate::client::RuntimeBridgeClient`].
#[derive(Debug, Clone)]
pub enum RuntimeResponse {
    /// Exactly one response envelope: advance the route by one hop.
    Single(Box<Envelope>),
    /// More than one response envelope: fan out into `n` children.
    Multi(Vec<Envelope>),
    /// The runtime reported a failure; route to `error-end`.
    Error(String),
}

impl RuntimeResponse {
    /// Number of response envelopes carried, 0 for `Error`.
    pub fn len(&self) -> usize {
        match self {
            RuntimeResponse::Single(_) => 1,
            RuntimeResponse::Multi(envelopes) => envelopes.len(),
            RuntimeResponse::Error(_) => 0,
        }
    }

    /// True iff this is an `Error` response.
    pub fn is_error(&self) -> bool {
        matches!(self, RuntimeResponse::Error(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_len_matches_variant() {
        let env = Envelope::new(
            "e1",
            asya_core::Route::new(vec!["a".into()]).unwrap(),
            serde_json::json!({}),
        );
        assert_eq!(RuntimeResponse::Single(Box::new(env.clone())).len(), 1);
        assert_eq!(
            RuntimeResponse::Multi(vec![env.clone(), env]).len(),
            2
        );
        assert_eq!(RuntimeResponse::Error("boom".into()).len(), 0);
        assert!(RuntimeResponse::Error("boom".into()).is_error());
    }
}
