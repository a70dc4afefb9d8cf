//! Gateway binary entry point: one process mediating between clients and
//! the envelope mesh for a whole cluster (not per-pod, unlike the sidecar).

use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

use asya_gateway::config::{GatewayConfigBuilder, TransportSettings};
use asya_gateway::publisher::QueuePublisher;
use asya_gateway::{build_router, AppState, EnvelopeStore, ToolRegistry};
use asya_transport::{AmqpTransport, CloudQueueTransport};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = GatewayConfigBuilder::from_env()?.build()?;
    info!(bind_addr = %config.bind_addr, "starting gateway");

    let tools = Arc::new(ToolRegistry::from_file(&config.tool_registry_path)?);
    let store = Arc::new(EnvelopeStore::new(config.subscriber_channel_capacity));

    let publisher: Arc<dyn QueuePublisher> = match &config.transport {
        TransportSettings::Amqp { uri } => Arc::new(AmqpTransport::connect(uri, 64).await?),
        TransportSettings::CloudQueue { endpoint } => {
            let sdk_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
            let client = aws_sdk_sqs::Client::new(&sdk_config);
            let base_endpoint = endpoint.as_deref().and_then(|raw| url::Url::parse(raw).ok());
            Arc::new(CloudQueueTransport::new(client, base_endpoint))
        }
    };

    let state = Arc::new(AppState {
        store,
        tools,
        publisher,
        sse_keepalive: config.sse_keepalive_interval,
    });

    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    info!("gateway listening");
    axum::serve(listener, app).await?;
    Ok(())
}
