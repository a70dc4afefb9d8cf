//! Operator binary entry point: one controller process per cluster,
//! reconciling every `AsyncActor` across every namespace it's granted
//! RBAC to watch.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use asya_operator::config::OperatorConfigBuilder;
use asya_operator::reconcile::queue::QueueManager;
use asya_operator::{controller, transports};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Arc::new(OperatorConfigBuilder::from_env()?.build()?);
    info!(transports = config.transports.len(), "starting asya-operator");

    let client = kube::Client::try_default().await?;

    let mut managers: HashMap<String, Arc<dyn QueueManager>> = HashMap::new();
    for (name, transport) in &config.transports {
        if !transport.enabled {
            continue;
        }
        match transports::build_manager(transport).await {
            Ok(manager) => {
                managers.insert(name.clone(), manager);
            }
            Err(err) => {
                warn!(transport = %name, %err, "failed to connect configured transport at startup");
            }
        }
    }

    controller::run(client, config, managers).await;
    Ok(())
}
