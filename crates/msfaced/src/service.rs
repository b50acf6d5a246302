//! Routing of service calls to explicitly addressed devices.

use msface_core::{ClientConfig, FaceApi, FaceApiError, FaceClient, FaceList};
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

use crate::device::FaceState;
use crate::engine::{EngineError, EngineHandle};

#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("unknown device: {0}")]
    UnknownDevice(String),
    #[error("device address {0} is already taken")]
    AddressTaken(String),
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error("create group failed: {0}")]
    Group(#[from] FaceApiError),
    #[error("worker task failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
}

/// Person group administration; blocking.
pub trait GroupAdmin: Send + Sync {
    fn create_group(&self, name: &str) -> Result<(), FaceApiError>;
}

/// [`GroupAdmin`] backed by the Face API, using the configured recognition model.
pub struct ApiGroupAdmin {
    config: ClientConfig,
}

impl ApiGroupAdmin {
    pub fn new(config: ClientConfig) -> Self {
        Self { config }
    }
}

impl GroupAdmin for ApiGroupAdmin {
    fn create_group(&self, name: &str) -> Result<(), FaceApiError> {
        let client = FaceClient::new(self.config.clone())?;
        client.create_group(name, &self.config.recognition_model)
    }
}

/// Devices addressable by camera entity id or device name.
#[derive(Default)]
pub struct DeviceRegistry {
    devices: BTreeMap<String, EngineHandle>,
}

impl DeviceRegistry {
    /// Add a device. Its entity id and name must not address any registered device.
    pub fn register(&mut self, handle: EngineHandle) -> Result<(), DispatchError> {
        let entity = handle.info().camera_entity.clone();
        let name = handle.info().name.clone();
        for address in [&entity, &name] {
            let taken = self.devices.contains_key(address.as_str())
                || self.devices.values().any(|h| &h.info().name == address);
            if taken {
                return Err(DispatchError::AddressTaken(address.clone()));
            }
        }
        tracing::debug!(camera = %entity, device = %name, "device registered");
        self.devices.insert(entity, handle);
        Ok(())
    }

    /// Look up a device by camera entity id, falling back to its name.
    pub fn get(&self, target: &str) -> Result<&EngineHandle, DispatchError> {
        self.devices
            .get(target)
            .or_else(|| self.devices.values().find(|h| h.info().name == target))
            .ok_or_else(|| DispatchError::UnknownDevice(target.to_string()))
    }

    pub fn handles(&self) -> impl Iterator<Item = &EngineHandle> {
        self.devices.values()
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}

/// Service operations over all devices of the daemon.
pub struct Dispatcher {
    registry: DeviceRegistry,
    admin: Arc<dyn GroupAdmin>,
    group: String,
    region: String,
}

impl Dispatcher {
    pub fn new(
        registry: DeviceRegistry,
        admin: Arc<dyn GroupAdmin>,
        group: impl Into<String>,
        region: impl Into<String>,
    ) -> Self {
        Self {
            registry,
            admin,
            group: group.into(),
            region: region.into(),
        }
    }

    pub async fn detect(&self, target: &str) -> Result<FaceList, DispatchError> {
        tracing::info!(device = target, "detect requested");
        Ok(self.registry.get(target)?.detect().await?)
    }

    pub async fn identify(&self, target: &str) -> Result<FaceList, DispatchError> {
        tracing::info!(device = target, "identify requested");
        Ok(self.registry.get(target)?.identify().await?)
    }

    /// Capture a frame for the device bound to `camera_entity`. No Face API call is made.
    pub async fn snapshot(&self, camera_entity: &str) -> Result<usize, DispatchError> {
        tracing::info!(camera = camera_entity, "snapshot requested");
        Ok(self.registry.get(camera_entity)?.snapshot().await?)
    }

    pub async fn scan(&self, target: &str) -> Result<FaceList, DispatchError> {
        tracing::info!(device = target, "scan requested");
        Ok(self.registry.get(target)?.scan().await?)
    }

    pub async fn process_image(
        &self,
        target: &str,
        image: Vec<u8>,
    ) -> Result<FaceList, DispatchError> {
        tracing::info!(device = target, bytes = image.len(), "process_image requested");
        Ok(self.registry.get(target)?.process_image(image).await?)
    }

    pub async fn reload_identities(&self, target: &str) -> Result<usize, DispatchError> {
        tracing::info!(device = target, "reload_identities requested");
        Ok(self.registry.get(target)?.reload_identities().await?)
    }

    /// Create or replace a person group on a blocking worker.
    pub async fn create_group(&self, name: &str) -> Result<(), DispatchError> {
        tracing::info!(group = name, "create_group requested");
        let admin = Arc::clone(&self.admin);
        let name = name.to_string();
        tokio::task::spawn_blocking(move || admin.create_group(&name)).await??;
        Ok(())
    }

    pub fn faces(&self, target: &str) -> Result<FaceState, DispatchError> {
        Ok(self.registry.get(target)?.state())
    }

    pub fn status(&self) -> serde_json::Value {
        let devices: Vec<_> = self
            .registry
            .handles()
            .map(|h| {
                let state = h.state();
                serde_json::json!({
                    "name": state.name,
                    "camera_entity": state.camera_entity,
                    "total_faces": state.total_faces,
                    "identities": state.identities,
                    "persons": state.persons,
                    "updated_at": state.updated_at,
                })
            })
            .collect();
        serde_json::json!({
            "version": env!("CARGO_PKG_VERSION"),
            "group": self.group,
            "region": self.region,
            "device_count": self.registry.len(),
            "devices": devices,
        })
    }
}
