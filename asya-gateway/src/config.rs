//! Gateway configuration, loaded from env (+ optional file), following the
//! same builder shape as `asya_sidecar::config::SidecarConfigBuilder`
//! (itself grounded on the teacher's `OSLConfigBuilder::build() -> Result`
//! pattern).

use std::net::SocketAddr;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{GatewayError, GatewayResult};

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub bind_addr: SocketAddr,
    pub tool_registry_path: String,
    pub sse_keepalive_interval: Duration,
    pub subscriber_channel_capacity: usize,
    pub transport: TransportSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", tag = "kind")]
pub enum TransportSettings {
    Amqp { uri: String },
    CloudQueue { endpoint: Option<String> },
}

#[derive(Debug, Default, Deserialize)]
struct RawGatewayConfig {
    bind_addr: Option<String>,
    tool_registry_path: Option<String>,
    sse_keepalive_interval_secs: Option<u64>,
    subscriber_channel_capacity: Option<usize>,
    transport_kind: Option<String>,
    amqp_uri: Option<String>,
    sqs_endpoint: Option<String>,
}

pub struct GatewayConfigBuilder {
    raw: RawGatewayConfig,
}

impl GatewayConfigBuilder {
    pub fn from_env() -> GatewayResult<Self> {
        let mut builder = config::Config::builder();
        if let Ok(path) = std::env::var("ASYA_GATEWAY_CONFIG_FILE") {
            builder = builder.add_source(config::File::with_name(&path));
        }
        let settings = builder
            .add_source(
                config::Environment::with_prefix("ASYA_GATEWAY")
                    .try_parsing(true)
                    .separator("__"),
            )
            .build()
            .map_err(|err| GatewayError::Config(err.to_string()))?;
        let raw: RawGatewayConfig = settings
            .try_deserialize()
            .map_err(|err| GatewayError::Config(err.to_string()))?;
        Ok(Self { raw })
    }

    pub fn build(self) -> GatewayResult<GatewayConfig> {
        let bind_addr = self
            .raw
            .bind_addr
            .unwrap_or_else(|| "0.0.0.0:8080".to_string())
            .parse()
            .map_err(|_| GatewayError::Config("invalid bind_addr".to_string()))?;

        let tool_registry_path = self
            .raw
            .tool_registry_path
            .ok_or_else(|| GatewayError::Config("tool_registry_path is required".to_string()))?;

        let transport = match self.raw.transport_kind.as_deref() {
            Some("cloud-queue") => TransportSettings::CloudQueue {
                endpoint: self.raw.sqs_endpoint,
            },
            _ => TransportSettings::Amqp {
                uri: self
                    .raw
                    .amqp_uri
                    .unwrap_or_else(|| "amqp://127.0.0.1:5672/%2f".to_string()),
            },
        };

        Ok(GatewayConfig {
            bind_addr,
            tool_registry_path,
            sse_keepalive_interval: Duration::from_secs(self.raw.sse_keepalive_interval_secs.unwrap_or(15)),
            subscriber_channel_capacity: self.raw.subscriber_channel_capacity.unwrap_or(64),
            transport,
        })
    }
}
