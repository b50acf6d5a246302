use msface_core::{FaceApi, FaceList};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot, watch};

use crate::camera::Camera;
use crate::device::{DeviceError, DeviceInfo, FaceDevice, FaceState};

/// Pending requests per device before senders wait.
const REQUEST_QUEUE_DEPTH: usize = 4;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Device(#[from] DeviceError),
    #[error("failed to spawn engine thread: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("engine thread exited")]
    ChannelClosed,
}

type Reply<T> = oneshot::Sender<Result<T, DeviceError>>;

/// Messages sent from the service layer to a device's engine thread.
enum EngineRequest {
    Snapshot { reply: Reply<usize> },
    Detect { reply: Reply<FaceList> },
    Identify { reply: Reply<FaceList> },
    Scan { reply: Reply<FaceList> },
    ProcessImage { image: Vec<u8>, reply: Reply<FaceList> },
    ReloadIdentities { reply: Reply<usize> },
}

/// Clone-safe handle to one device's engine thread.
#[derive(Clone)]
pub struct EngineHandle {
    info: DeviceInfo,
    tx: mpsc::Sender<EngineRequest>,
    state: watch::Receiver<FaceState>,
}

impl EngineHandle {
    pub fn info(&self) -> &DeviceInfo {
        &self.info
    }

    /// Latest published face state.
    pub fn state(&self) -> FaceState {
        self.state.borrow().clone()
    }

    async fn call<T>(
        &self,
        request: impl FnOnce(Reply<T>) -> EngineRequest,
    ) -> Result<T, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(request(reply_tx))
            .await
            .map_err(|_| EngineError::ChannelClosed)?;
        Ok(reply_rx.await.map_err(|_| EngineError::ChannelClosed)??)
    }

    /// Capture a frame from the bound camera; returns the image size in bytes.
    pub async fn snapshot(&self) -> Result<usize, EngineError> {
        self.call(|reply| EngineRequest::Snapshot { reply }).await
    }

    /// Count faces in the current image.
    pub async fn detect(&self) -> Result<FaceList, EngineError> {
        self.call(|reply| EngineRequest::Detect { reply }).await
    }

    /// Identify faces in the current image.
    pub async fn identify(&self) -> Result<FaceList, EngineError> {
        self.call(|reply| EngineRequest::Identify { reply }).await
    }

    /// Snapshot, then identify.
    pub async fn scan(&self) -> Result<FaceList, EngineError> {
        self.call(|reply| EngineRequest::Scan { reply }).await
    }

    /// Store `image` as the current image and identify its faces.
    pub async fn process_image(&self, image: Vec<u8>) -> Result<FaceList, EngineError> {
        self.call(|reply| EngineRequest::ProcessImage { image, reply })
            .await
    }

    /// Re-list the person group; returns the number of persons.
    pub async fn reload_identities(&self) -> Result<usize, EngineError> {
        self.call(|reply| EngineRequest::ReloadIdentities { reply })
            .await
    }
}

/// Run `device` on a dedicated OS thread and return a handle to it.
///
/// All blocking work (camera capture, Face API calls) happens on that
/// thread; requests are served one at a time in arrival order.
pub fn spawn_engine<A, C>(mut device: FaceDevice<A, C>) -> Result<EngineHandle, EngineError>
where
    A: FaceApi + Send + 'static,
    C: Camera + Send + 'static,
{
    let info = device.info().clone();
    let state = device.subscribe();
    let (tx, mut rx) = mpsc::channel::<EngineRequest>(REQUEST_QUEUE_DEPTH);

    let thread_name = format!("msface-{}", info.camera_entity);
    std::thread::Builder::new()
        .name(thread_name)
        .spawn(move || {
            let device_name = device.info().name.clone();
            tracing::info!(device = %device_name, "engine thread started");
            while let Some(req) = rx.blocking_recv() {
                match req {
                    EngineRequest::Snapshot { reply } => {
                        let _ = reply.send(device.snapshot());
                    }
                    EngineRequest::Detect { reply } => {
                        let _ = reply.send(device.detect());
                    }
                    EngineRequest::Identify { reply } => {
                        let _ = reply.send(device.identify());
                    }
                    EngineRequest::Scan { reply } => {
                        let _ = reply.send(device.scan());
                    }
                    EngineRequest::ProcessImage { image, reply } => {
                        device.set_image(image);
                        let _ = reply.send(device.identify());
                    }
                    EngineRequest::ReloadIdentities { reply } => {
                        let _ = reply.send(device.reload_identities());
                    }
                }
            }
            tracing::info!(device = %device_name, "engine thread exiting");
        })
        .map_err(EngineError::Spawn)?;

    Ok(EngineHandle { info, tx, state })
}
