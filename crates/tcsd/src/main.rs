use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

mod config;
mod dbus_interface;
mod engine;

use config::{BusKind, Config};
use dbus_interface::{SensorService, BUS_NAME, OBJECT_PATH};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    tracing::info!("tcsd starting");

    let config = Config::load()?;
    let engine = engine::spawn_engine(&config).context("failed to initialize sensor")?;

    let builder = match config.bus {
        BusKind::System => zbus::connection::Builder::system()?,
        BusKind::Session => zbus::connection::Builder::session()?,
    };
    let _connection = builder
        .name(BUS_NAME)?
        .serve_at(OBJECT_PATH, SensorService::new(engine.clone()))?
        .build()
        .await
        .context("failed to register on D-Bus")?;

    tracing::info!(bus = ?config.bus, name = BUS_NAME, "tcsd ready");

    // Keep running until signaled
    tokio::signal::ctrl_c().await?;
    tracing::info!("tcsd shutting down");
    engine.shutdown().await;

    Ok(())
}
