//! # asya-runtime-bridge — framed socket protocol to user code
//!
//! A length-delimited JSON framing between the sidecar and the in-container
//! user runtime, carried over a Unix domain socket. See [`protocol`] for the
//! wire format and [`client`] for the sidecar-side implementation.

pub mod client;
pub mod codec;
pub mod error;
pub mod protocol;

pub use client::{RuntimeBridgeClient, UnixSocketBridgeClient};
pub use error::{BridgeError, BridgeResult};
pub use protocol::{RuntimeFrame, RuntimeRequest, RuntimeResponse};
