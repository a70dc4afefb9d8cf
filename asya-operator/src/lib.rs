//! # asya-operator — Kubernetes controller for `AsyncActor`
//!
//! Watches `AsyncActor` custom resources and reconciles each into a
//! queue, a shared runtime-script `ConfigMap`, a sidecar-injected
//! `Deployment`, and (when scaling is enabled) a KEDA `ScaledObject`,
//! folding observed cluster state back into a single status tag via
//! [`status::classify`].

pub mod config;
pub mod controller;
pub mod crd;
pub mod error;
pub mod labels;
pub mod reconcile;
pub mod status;
pub mod transports;

pub use config::{OperatorConfig, OperatorConfigBuilder};
pub use crd::AsyncActor;
pub use error::{OperatorError, OperatorResult};
