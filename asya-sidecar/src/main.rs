//! Sidecar binary entry point: one process per actor pod.

use std::sync::Arc;

use asya_core::{derive_queue_name, QueueDeclareOptions, TransportAdapter, TransportKind as CoreTransportKind};
use asya_sidecar::config::{SidecarConfigBuilder, TransportKind};
use asya_sidecar::{GatewayClient, Router, ShutdownCoordinator};
use asya_runtime_bridge::UnixSocketBridgeClient;
use asya_transport::{AmqpTransport, CloudQueueTransport};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = SidecarConfigBuilder::from_env()?.build()?;
    info!(actor_name = %config.actor_name, "starting sidecar");

    let gateway = Arc::new(GatewayClient::new(
        config.gateway_base_url.clone(),
        config.progress_retry_attempts,
    ));
    probe_gateway_until_ready(&gateway, config.startup_health_probe_window).await;

    let shutdown = ShutdownCoordinator::new(config.graceful_shutdown_timeout);
    let shutdown_rx = shutdown.subscribe();
    let shutdown_watcher = {
        let shutdown_uri = config.gateway_base_url.clone();
        tokio::spawn(async move {
            shutdown.wait_for_signal().await;
            info!(gateway_base_url = %shutdown_uri, "shutdown signal received");
        })
    };

    let bridge = UnixSocketBridgeClient::connect(&config.socket_path).await?;
    let mut router = Router::new(config.actor_name.clone(), bridge, gateway.clone());

    let core_kind = match config.transport {
        TransportKind::Amqp => CoreTransportKind::Amqp,
        TransportKind::CloudQueue => CoreTransportKind::CloudQueue,
    };
    let queue_name = derive_queue_name(core_kind, &config.namespace, &config.actor_name);

    match config.transport {
        TransportKind::Amqp => {
            let uri = std::env::var("ASYA_RABBITMQ_URI")
                .unwrap_or_else(|_| "amqp://127.0.0.1:5672/%2f".to_string());
            let transport = AmqpTransport::connect(&uri, 64).await?;
            transport
                .declare_queue(&queue_name, &QueueDeclareOptions::default())
                .await?;
            router.run(&transport, &queue_name, shutdown_rx).await;
        }
        TransportKind::CloudQueue => {
            let sdk_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
            let client = aws_sdk_sqs::Client::new(&sdk_config);
            let base_endpoint = std::env::var("ASYA_SQS_ENDPOINT")
                .ok()
                .and_then(|raw| url::Url::parse(&raw).ok());
            let transport = CloudQueueTransport::new(client, base_endpoint);
            transport
                .declare_queue(&queue_name, &QueueDeclareOptions::default())
                .await?;
            router.run(&transport, &queue_name, shutdown_rx).await;
        }
    }

    shutdown_watcher.abort();
    Ok(())
}

async fn probe_gateway_until_ready(gateway: &GatewayClient, window: std::time::Duration) {
    let deadline = tokio::time::Instant::now() + window;
    loop {
        if gateway.health_check().await {
            info!("gateway is reachable");
            return;
        }
        if tokio::time::Instant::now() >= deadline {
            warn!("gateway did not become reachable within the startup probe window, continuing anyway");
            return;
        }
        tokio::time::sleep(std::time::Duration::from_millis(500)).await;
    }
}
