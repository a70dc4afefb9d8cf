//! # asya-sidecar — per-pod consume, dispatch, and route loop
//!
//! One [`router::Router`] per actor pod: consumes envelopes from its input
//! queue, forwards them to user code over [`asya_runtime_bridge`], and
//! routes the result to the next actor's queue (or a reserved terminal
//! actor), enforcing deadlines, fan-out, and terminal disposition.

pub mod config;
pub mod error;
pub mod fanout;
pub mod gateway_client;
pub mod router;
pub mod shutdown;

pub use config::{SidecarConfig, SidecarConfigBuilder};
pub use error::{SidecarError, SidecarResult};
pub use gateway_client::GatewayClient;
pub use router::Router;
pub use shutdown::ShutdownCoordinator;
