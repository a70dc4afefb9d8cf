//! Operator configuration: the transport registry and sidecar injection
//! defaults, provided once at install time and loaded via the `config`
//! crate from a mounted ConfigMap-style file, following the same
//! builder + `build() -> Result` shape as the sidecar's and gateway's
//! configuration modules.

use std::collections::HashMap;

use serde::Deserialize;

use crate::error::{OperatorError, OperatorResult};

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum TransportKindTag {
    Amqp,
    CloudQueue,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DlqSettings {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub max_retry_count: Option<u32>,
    #[serde(default)]
    pub retention_days: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct QueueSettings {
    #[serde(default)]
    pub auto_create: bool,
    #[serde(default)]
    pub force_recreate: bool,
    #[serde(default)]
    pub dlq: DlqSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TransportConfig {
    #[serde(rename = "type")]
    pub kind: TransportKindTag,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub config: serde_json::Value,
    #[serde(default)]
    pub queues: QueueSettings,
    #[serde(default)]
    pub tags: HashMap<String, String>,
}

fn default_enabled() -> bool {
    true
}

/// Sidecar image and runtime-command defaults the operator injects into
/// every owned workload.
#[derive(Debug, Clone)]
pub struct SidecarDefaults {
    pub image: String,
    pub runtime_python_path: String,
}

#[derive(Debug, Clone)]
pub struct OperatorConfig {
    pub transports: HashMap<String, TransportConfig>,
    /// `ASYA_DISABLE_QUEUE_MANAGEMENT`: suppresses queue deletion on actor
    /// deletion when set.
    pub disable_queue_management: bool,
    pub sidecar: SidecarDefaults,
}

impl OperatorConfig {
    /// Looks up a configured, enabled transport by name.
    pub fn resolve_transport(&self, name: &str) -> OperatorResult<&TransportConfig> {
        match self.transports.get(name) {
            Some(transport) if transport.enabled => Ok(transport),
            _ => Err(OperatorError::unknown_transport(name)),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct RawOperatorConfig {
    #[serde(default)]
    transports: HashMap<String, TransportConfig>,
    disable_queue_management: Option<bool>,
    sidecar_image: Option<String>,
    runtime_python_path: Option<String>,
}

pub struct OperatorConfigBuilder {
    raw: RawOperatorConfig,
}

impl OperatorConfigBuilder {
    /// Starts from an optional mounted config file (`ASYA_OPERATOR_CONFIG_FILE`)
    /// layered under environment variables (`ASYA_OPERATOR__*`).
    pub fn from_env() -> OperatorResult<Self> {
        let mut builder = config::Config::builder();
        if let Ok(path) = std::env::var("ASYA_OPERATOR_CONFIG_FILE") {
            builder = builder.add_source(config::File::with_name(&path));
        }
        let settings = builder
            .add_source(
                config::Environment::with_prefix("ASYA_OPERATOR")
                    .try_parsing(true)
                    .separator("__"),
            )
            .build()
            .map_err(|err| OperatorError::config(err.to_string()))?;
        let raw: RawOperatorConfig = settings
            .try_deserialize()
            .map_err(|err| OperatorError::config(err.to_string()))?;
        Ok(Self { raw })
    }

    pub fn build(self) -> OperatorResult<OperatorConfig> {
        let sidecar_image = self
            .raw
            .sidecar_image
            .ok_or_else(|| OperatorError::config("sidecar_image is required"))?;

        Ok(OperatorConfig {
            transports: self.raw.transports,
            disable_queue_management: self.raw.disable_queue_management.unwrap_or(false),
            sidecar: SidecarDefaults {
                image: sidecar_image,
                runtime_python_path: self
                    .raw
                    .runtime_python_path
                    .unwrap_or_else(|| "python3".to_string()),
            },
        })
    }
}
