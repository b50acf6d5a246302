use anyhow::{Context, Result};
use msface_core::FaceClient;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

mod camera;
mod config;
mod dbus_interface;
mod device;
mod engine;
mod service;

use camera::SnapshotCamera;
use config::Config;
use device::{DeviceInfo, FaceDevice};
use engine::EngineHandle;
use service::{ApiGroupAdmin, DeviceRegistry, Dispatcher};

/// Build one device per configured source and start its engine thread.
///
/// Runs on a blocking worker: clients are created and identities are
/// listed with blocking HTTP.
fn start_devices(config: &Config) -> Result<Vec<EngineHandle>> {
    let mut handles = Vec::with_capacity(config.sources.len());
    for source in &config.sources {
        let client = FaceClient::new(config.client_config())
            .with_context(|| format!("creating Face API client for {}", source.entity_id))?;
        let camera = SnapshotCamera::new(source.camera()?, config.timeout())?;
        let info = DeviceInfo {
            name: source.device_name(),
            camera_entity: source.entity_id.clone(),
            group: config.group.clone(),
            confidence_pct: config.confidence,
        };
        tracing::info!(
            device = %info.name,
            camera = %info.camera_entity,
            source = %camera.source(),
            "starting device"
        );
        let device = FaceDevice::new(info, client, camera);
        handles.push(engine::spawn_engine(device)?);
    }
    Ok(handles)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    tracing::info!("msfaced starting");

    let config_path = Config::path_from_env();
    let config = Config::load(&config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;
    tracing::info!(
        path = %config_path.display(),
        group = %config.group,
        region = %config.region,
        sources = config.sources.len(),
        "configuration loaded"
    );

    let device_config = config.clone();
    let handles = tokio::task::spawn_blocking(move || start_devices(&device_config)).await??;

    let mut registry = DeviceRegistry::default();
    for handle in handles {
        registry.register(handle)?;
    }
    anyhow::ensure!(!registry.is_empty(), "no devices configured");

    let admin = Arc::new(ApiGroupAdmin::new(config.client_config()));
    let dispatcher = Arc::new(Dispatcher::new(
        registry,
        admin,
        config.group.clone(),
        config.region.clone(),
    ));
    let service = dbus_interface::IdentifyService::new(dispatcher);

    let bus = std::env::var("MSFACE_BUS").unwrap_or_else(|_| "session".to_string());
    let builder = if bus == "system" {
        zbus::connection::Builder::system()?
    } else {
        zbus::connection::Builder::session()?
    };
    let _conn = builder
        .name(dbus_interface::BUS_NAME)?
        .serve_at(dbus_interface::OBJECT_PATH, service)?
        .build()
        .await
        .context("registering D-Bus service")?;

    tracing::info!(
        bus = %bus,
        name = dbus_interface::BUS_NAME,
        "msfaced ready"
    );

    // Keep running until signaled
    tokio::signal::ctrl_c().await?;
    tracing::info!("msfaced shutting down");

    Ok(())
}
