use std::sync::Arc;

use anyhow::Context;
use gateway_rust::config::{self, ServiceConfig, ServiceKind};
use gateway_rust::server::{self, ServiceInfo};
use gateway_rust::store::{self, Store};
use gateway_rust::{calc, logging, CalculationService};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    config::load_dotenv();
    logging::init();

    let config = ServiceConfig::from_env(ServiceKind::Calculation)?;
    let store = Arc::new(
        store::connect(&config.store, &config.connect_retry)
            .await
            .context("failed to connect to the store")?,
    );

    let listener = server::bind(config.port).await?;
    let info = ServiceInfo::new(config.kind.name(), config.hostname.as_str())
        .bound_to(listener.local_addr()?);
    let service = Arc::new(CalculationService::new(
        store.clone(),
        config.store_retry,
        info,
    ));

    info!(port = config.port, "Calculation service running");
    server::serve(
        listener,
        server::layers(calc::router(service)),
        server::shutdown_signal(),
    )
    .await?;

    store.close().await;
    info!("Calculation service stopped");
    Ok(())
}
