//! Sidecar configuration, loaded from environment variables with an
//! optional file layer underneath, following the teacher's builder +
//! `build() -> Result` pattern.

use std::time::Duration;

use serde::Deserialize;

use crate::error::{SidecarError, SidecarResult};

/// Which transport backend this sidecar's actor queue lives on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TransportKind {
    Amqp,
    CloudQueue,
}

/// Sidecar runtime configuration.
#[derive(Debug, Clone)]
pub struct SidecarConfig {
    pub actor_name: String,
    pub namespace: String,
    pub socket_path: std::path::PathBuf,
    pub gateway_base_url: String,
    pub transport: TransportKind,
    pub graceful_shutdown_timeout: Duration,
    pub progress_retry_attempts: u32,
    pub progress_retry_delay: Duration,
    pub startup_health_probe_window: Duration,
}

/// Deserialization target for the `config` crate layer; every field is
/// optional so environment variables can supply what a config file omits.
#[derive(Debug, Deserialize, Default)]
struct RawSidecarConfig {
    actor_name: Option<String>,
    namespace: Option<String>,
    socket_path: Option<String>,
    gateway_base_url: Option<String>,
    transport: Option<TransportKind>,
    graceful_shutdown_timeout_secs: Option<u64>,
    progress_retry_attempts: Option<u32>,
    progress_retry_delay_millis: Option<u64>,
    startup_health_probe_window_secs: Option<u64>,
}

/// Builder for [`SidecarConfig`], mirroring the teacher's
/// `OSLConfigBuilder::build() -> Result` shape.
#[derive(Debug, Default)]
pub struct SidecarConfigBuilder {
    raw: RawSidecarConfig,
}

impl SidecarConfigBuilder {
    /// Starts from environment variables (`ASYA_*`) and an optional config
    /// file at `ASYA_CONFIG_FILE`, if set.
    pub fn from_env() -> SidecarResult<Self> {
        let mut builder = config::Config::builder();
        if let Ok(path) = std::env::var("ASYA_CONFIG_FILE") {
            builder = builder.add_source(config::File::with_name(&path).required(false));
        }
        builder = builder.add_source(
            config::Environment::with_prefix("ASYA")
                .try_parsing(true)
                .separator("__"),
        );
        let raw: RawSidecarConfig = builder
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|err| SidecarError::Config(err.to_string()))?;
        Ok(Self { raw })
    }

    pub fn build(self) -> SidecarResult<SidecarConfig> {
        let raw = self.raw;
        Ok(SidecarConfig {
            actor_name: raw
                .actor_name
                .ok_or_else(|| SidecarError::Config("actor_name is required".into()))?,
            namespace: raw
                .namespace
                .ok_or_else(|| SidecarError::Config("namespace is required".into()))?,
            socket_path: raw
                .socket_path
                .map(std::path::PathBuf::from)
                .unwrap_or_else(|| std::path::PathBuf::from("/var/run/asya/runtime.sock")),
            gateway_base_url: raw
                .gateway_base_url
                .ok_or_else(|| SidecarError::Config("gateway_base_url is required".into()))?,
            transport: raw
                .transport
                .ok_or_else(|| SidecarError::Config("transport is required".into()))?,
            graceful_shutdown_timeout: Duration::from_secs(
                raw.graceful_shutdown_timeout_secs.unwrap_or(30),
            ),
            progress_retry_attempts: raw.progress_retry_attempts.unwrap_or(5),
            progress_retry_delay: Duration::from_millis(
                raw.progress_retry_delay_millis.unwrap_or(200),
            ),
            startup_health_probe_window: Duration::from_secs(
                raw.startup_health_probe_window_secs.unwrap_or(10),
            ),
        })
    }
}
