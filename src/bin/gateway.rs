use std::sync::Arc;

use gateway_rust::config::{self, GatewayConfig};
use gateway_rust::{gateway, logging, server, Gateway};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    config::load_dotenv();
    logging::init();

    let config = GatewayConfig::from_env()?;
    info!(
        calc_service_url = %config.calc_service_url,
        todo_service_url = %config.todo_service_url,
        "API Gateway starting"
    );

    let gateway = Arc::new(Gateway::new(&config)?);
    let listener = server::bind(config.port).await?;

    info!(port = config.port, "API Gateway running");
    server::serve(
        listener,
        server::layers(gateway::router(gateway)),
        server::shutdown_signal(),
    )
    .await?;

    info!("API Gateway stopped");
    Ok(())
}
