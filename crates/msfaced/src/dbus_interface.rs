use std::sync::Arc;
use zbus::interface;

use crate::service::{DispatchError, Dispatcher};

pub const BUS_NAME: &str = "org.msface.Identify1";
pub const OBJECT_PATH: &str = "/org/msface/Identify1";

/// D-Bus interface for the msface daemon.
///
/// Operations are fire-and-forget: failures are logged here and not
/// returned to the caller. Results surface through `Faces`.
/// Addressing an unknown device is reported as `InvalidArgs`.
pub struct IdentifyService {
    dispatcher: Arc<Dispatcher>,
}

impl IdentifyService {
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self { dispatcher }
    }
}

fn settle<T>(
    operation: &str,
    subject: &str,
    result: Result<T, DispatchError>,
) -> zbus::fdo::Result<()> {
    match result {
        Ok(_) => Ok(()),
        Err(DispatchError::UnknownDevice(device)) => Err(zbus::fdo::Error::InvalidArgs(format!(
            "unknown device: {device}"
        ))),
        Err(err) => {
            tracing::error!(operation, subject, error = %err, "service call failed");
            Ok(())
        }
    }
}

#[interface(name = "org.msface.Identify1")]
impl IdentifyService {
    /// Count faces in the device's current image.
    async fn detect(&self, device: &str) -> zbus::fdo::Result<()> {
        settle("detect", device, self.dispatcher.detect(device).await)
    }

    /// Identify faces in the device's current image.
    async fn identify(&self, device: &str) -> zbus::fdo::Result<()> {
        settle("identify", device, self.dispatcher.identify(device).await)
    }

    /// Capture and store a frame from the given camera entity.
    async fn snapshot(&self, camera_entity: &str) -> zbus::fdo::Result<()> {
        settle(
            "snapshot",
            camera_entity,
            self.dispatcher.snapshot(camera_entity).await,
        )
    }

    /// Snapshot followed by identify.
    async fn scan(&self, device: &str) -> zbus::fdo::Result<()> {
        settle("scan", device, self.dispatcher.scan(device).await)
    }

    /// Identify faces in an image supplied by the caller.
    async fn process_image(&self, device: &str, image: Vec<u8>) -> zbus::fdo::Result<()> {
        settle(
            "process_image",
            device,
            self.dispatcher.process_image(device, image).await,
        )
    }

    /// Create or replace a person group.
    async fn create_group(&self, name: &str) -> zbus::fdo::Result<()> {
        settle("create_group", name, self.dispatcher.create_group(name).await)
    }

    /// Re-list the person group for a device.
    async fn reload_identities(&self, device: &str) -> zbus::fdo::Result<()> {
        settle(
            "reload_identities",
            device,
            self.dispatcher.reload_identities(device).await,
        )
    }

    /// Current face state of a device, as JSON.
    async fn faces(&self, device: &str) -> zbus::fdo::Result<String> {
        let state = self.dispatcher.faces(device).map_err(|e| match e {
            DispatchError::UnknownDevice(d) => {
                zbus::fdo::Error::InvalidArgs(format!("unknown device: {d}"))
            }
            other => zbus::fdo::Error::Failed(other.to_string()),
        })?;
        serde_json::to_string(&state).map_err(|e| zbus::fdo::Error::Failed(e.to_string()))
    }

    /// Daemon status information, as JSON.
    async fn status(&self) -> zbus::fdo::Result<String> {
        Ok(self.dispatcher.status().to_string())
    }
}
