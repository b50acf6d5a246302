//! Face identify device: one camera, its last image, and the face state derived from it.

use chrono::{DateTime, Utc};
use msface_core::{FaceApi, FaceApiError, FaceList, FaceProcessor, IdentityStore, ResolvedFace};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::watch;

use crate::camera::{Camera, CameraError};

#[derive(Error, Debug)]
pub enum DeviceError {
    #[error("no image captured yet")]
    NoImage,
    #[error("camera error: {0}")]
    Camera(#[from] CameraError),
    #[error("face api error: {0}")]
    Api(#[from] FaceApiError),
}

/// Static settings of a device.
#[derive(Debug, Clone)]
pub struct DeviceInfo {
    pub name: String,
    pub camera_entity: String,
    pub group: String,
    /// Minimum identify confidence in percent.
    pub confidence_pct: f64,
}

/// Published device state. `total_faces` is the device's state value.
#[derive(Debug, Clone, Serialize)]
pub struct FaceState {
    pub name: String,
    pub camera_entity: String,
    pub confidence_threshold: f64,
    pub total_faces: usize,
    pub faces: Vec<ResolvedFace>,
    pub identities: usize,
    /// Names of the persons in the loaded identity store.
    pub persons: Vec<String>,
    pub snapshot_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

pub struct FaceDevice<A, C> {
    info: DeviceInfo,
    api: A,
    camera: C,
    processor: FaceProcessor,
    image: Option<Vec<u8>>,
    state: watch::Sender<FaceState>,
}

impl<A: FaceApi, C: Camera> FaceDevice<A, C> {
    /// Build the device and load its identity store.
    ///
    /// A failed identity load is not fatal: the device starts with an
    /// empty store and reports unresolved faces with empty names.
    pub fn new(info: DeviceInfo, api: A, camera: C) -> Self {
        let store = match IdentityStore::load(&api, &info.group) {
            Ok(store) => store,
            Err(err) => {
                tracing::warn!(
                    device = %info.name,
                    group = %info.group,
                    error = %err,
                    "failed to load identities; names will not be resolved"
                );
                IdentityStore::default()
            }
        };
        let processor = FaceProcessor::new(info.group.clone(), info.confidence_pct, store);

        let (state, _) = watch::channel(FaceState {
            name: info.name.clone(),
            camera_entity: info.camera_entity.clone(),
            confidence_threshold: info.confidence_pct,
            total_faces: 0,
            faces: Vec::new(),
            identities: processor.store().len(),
            persons: processor.store().names(),
            snapshot_at: None,
            updated_at: None,
        });

        Self {
            info,
            api,
            camera,
            processor,
            image: None,
            state,
        }
    }

    pub fn info(&self) -> &DeviceInfo {
        &self.info
    }

    pub fn subscribe(&self) -> watch::Receiver<FaceState> {
        self.state.subscribe()
    }

    /// Replace the image subsequent detect/identify runs operate on.
    pub fn set_image(&mut self, image: Vec<u8>) {
        self.image = Some(image);
        self.state.send_modify(|s| s.snapshot_at = Some(Utc::now()));
    }

    /// Capture a frame from the bound camera and keep it as the current image.
    pub fn snapshot(&mut self) -> Result<usize, DeviceError> {
        let image = self.camera.capture()?;
        let len = image.len();
        tracing::info!(device = %self.info.name, bytes = len, "snapshot stored");
        self.set_image(image);
        Ok(len)
    }

    /// Count faces in the current image without identifying them.
    pub fn detect(&mut self) -> Result<FaceList, DeviceError> {
        let image = self.image.as_deref().ok_or(DeviceError::NoImage)?;
        let list = self.processor.detect_only(&self.api, image)?;
        self.process_faces(&list);
        Ok(list)
    }

    /// Detect, identify and resolve the faces in the current image.
    pub fn identify(&mut self) -> Result<FaceList, DeviceError> {
        let image = self.image.as_deref().ok_or(DeviceError::NoImage)?;
        let list = self.processor.process_image(&self.api, image)?;
        self.process_faces(&list);
        Ok(list)
    }

    /// Snapshot followed by identify.
    pub fn scan(&mut self) -> Result<FaceList, DeviceError> {
        self.snapshot()?;
        self.identify()
    }

    /// Re-list the person group. On failure the previous store is kept.
    pub fn reload_identities(&mut self) -> Result<usize, DeviceError> {
        let store = IdentityStore::load(&self.api, &self.info.group)?;
        let count = store.len();
        let persons = store.names();
        tracing::info!(device = %self.info.name, group = store.group(), count, "identities reloaded");
        self.processor.replace_store(store);
        self.state.send_modify(|s| {
            s.identities = count;
            s.persons = persons;
        });
        Ok(count)
    }

    fn process_faces(&self, list: &FaceList) {
        for face in &list.faces {
            tracing::info!(
                device = %self.info.name,
                name = %face.name,
                confidence = face.confidence,
                "face identified"
            );
        }
        tracing::info!(
            device = %self.info.name,
            total = list.total_faces,
            identified = list.faces.len(),
            "faces processed"
        );
        self.state.send_modify(|s| {
            s.total_faces = list.total_faces;
            s.faces = list.faces.clone();
            s.updated_at = Some(Utc::now());
        });
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use msface_core::{Candidate, DetectedFace, IdentifyResult, Person};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    /// In-memory Face API: fixed detections, identify candidates per face id, persons.
    #[derive(Clone, Default)]
    pub(crate) struct FakeApi {
        pub faces: Vec<String>,
        pub candidates: Vec<(String, Vec<Candidate>)>,
        pub persons: Vec<Person>,
        pub fail_detect: bool,
        pub fail_persons: bool,
        pub identify_calls: Arc<AtomicUsize>,
        pub images: Arc<Mutex<Vec<Vec<u8>>>>,
    }

    impl FakeApi {
        pub(crate) fn alice() -> Self {
            Self {
                faces: vec!["f1".into()],
                candidates: vec![(
                    "f1".into(),
                    vec![Candidate {
                        person_id: "p1".into(),
                        confidence: 0.92,
                    }],
                )],
                persons: vec![Person {
                    person_id: "p1".into(),
                    name: "Alice".into(),
                    user_data: None,
                }],
                ..Self::default()
            }
        }
    }

    fn unavailable() -> FaceApiError {
        FaceApiError::Status {
            status: reqwest::StatusCode::SERVICE_UNAVAILABLE,
            body: String::new(),
        }
    }

    impl FaceApi for FakeApi {
        fn detect(&self, image: &[u8]) -> Result<Vec<DetectedFace>, FaceApiError> {
            self.images.lock().unwrap().push(image.to_vec());
            if self.fail_detect {
                return Err(unavailable());
            }
            Ok(self
                .faces
                .iter()
                .map(|id| DetectedFace {
                    face_id: id.clone(),
                    face_rectangle: None,
                })
                .collect())
        }

        fn identify(
            &self,
            face_ids: &[String],
            _group: &str,
            _confidence_pct: f64,
        ) -> Result<Vec<IdentifyResult>, FaceApiError> {
            self.identify_calls.fetch_add(1, Ordering::SeqCst);
            Ok(face_ids
                .iter()
                .map(|id| IdentifyResult {
                    face_id: id.clone(),
                    candidates: self
                        .candidates
                        .iter()
                        .find(|(face, _)| face == id)
                        .map(|(_, c)| c.clone())
                        .unwrap_or_default(),
                })
                .collect())
        }

        fn list_persons(&self, _group: &str) -> Result<Vec<Person>, FaceApiError> {
            if self.fail_persons {
                return Err(unavailable());
            }
            Ok(self.persons.clone())
        }

        fn create_group(&self, _name: &str, _model: &str) -> Result<(), FaceApiError> {
            Ok(())
        }
    }

    /// Camera returning a fixed payload, or failing when `None`.
    pub(crate) struct FakeCamera(pub Option<Vec<u8>>);

    impl Camera for FakeCamera {
        fn capture(&self) -> Result<Vec<u8>, CameraError> {
            self.0.clone().ok_or(CameraError::Empty)
        }
    }

    pub(crate) fn info(entity: &str) -> DeviceInfo {
        DeviceInfo {
            name: format!("face_identity_{entity}"),
            camera_entity: entity.into(),
            group: "family".into(),
            confidence_pct: 80.0,
        }
    }

    fn device(api: FakeApi) -> FaceDevice<FakeApi, FakeCamera> {
        FaceDevice::new(info("camera.door"), api, FakeCamera(Some(b"jpeg".to_vec())))
    }

    #[test]
    fn test_identify_requires_image() {
        let mut dev = device(FakeApi::alice());
        assert!(matches!(dev.identify(), Err(DeviceError::NoImage)));
        assert!(matches!(dev.detect(), Err(DeviceError::NoImage)));
    }

    #[test]
    fn test_identify_publishes_state() {
        let mut dev = device(FakeApi::alice());
        let rx = dev.subscribe();
        dev.set_image(b"img".to_vec());
        let list = dev.identify().unwrap();
        assert_eq!(list.total_faces, 1);

        let state = rx.borrow();
        assert_eq!(state.total_faces, 1);
        assert_eq!(state.faces[0].name, "Alice");
        assert!((state.faces[0].confidence - 92.0).abs() < 1e-9);
        assert!(state.updated_at.is_some());
        assert_eq!(state.identities, 1);
    }

    #[test]
    fn test_failed_identify_leaves_state_untouched() {
        let api = FakeApi {
            fail_detect: true,
            ..FakeApi::alice()
        };
        let calls = api.identify_calls.clone();
        let mut dev = device(api);
        let rx = dev.subscribe();
        dev.set_image(b"img".to_vec());

        assert!(matches!(dev.identify(), Err(DeviceError::Api(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        let state = rx.borrow();
        assert_eq!(state.total_faces, 0);
        assert!(state.faces.is_empty());
        assert!(state.updated_at.is_none());
    }

    #[test]
    fn test_snapshot_feeds_next_identify() {
        let api = FakeApi::alice();
        let images = api.images.clone();
        let mut dev = device(api);
        assert_eq!(dev.snapshot().unwrap(), 4);
        assert!(dev.subscribe().borrow().snapshot_at.is_some());
        dev.identify().unwrap();
        assert_eq!(images.lock().unwrap().as_slice(), &[b"jpeg".to_vec()]);
    }

    #[test]
    fn test_snapshot_does_not_call_face_api() {
        let api = FakeApi::alice();
        let images = api.images.clone();
        let calls = api.identify_calls.clone();
        let mut dev = device(api);
        dev.snapshot().unwrap();
        assert!(images.lock().unwrap().is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_scan_fails_when_camera_fails() {
        let mut dev = FaceDevice::new(info("camera.door"), FakeApi::alice(), FakeCamera(None));
        assert!(matches!(dev.scan(), Err(DeviceError::Camera(_))));
    }

    #[test]
    fn test_detect_counts_without_identify() {
        let api = FakeApi {
            faces: vec!["f1".into(), "f2".into()],
            ..FakeApi::default()
        };
        let calls = api.identify_calls.clone();
        let mut dev = device(api);
        dev.set_image(b"img".to_vec());
        let list = dev.detect().unwrap();
        assert_eq!(list.total_faces, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(dev.subscribe().borrow().total_faces, 2);
    }

    #[test]
    fn test_identity_load_failure_starts_with_empty_store() {
        let api = FakeApi {
            fail_persons: true,
            ..FakeApi::alice()
        };
        let mut dev = device(api);
        dev.set_image(b"img".to_vec());
        let list = dev.identify().unwrap();
        assert_eq!(list.faces[0].name, "");
    }

    #[test]
    fn test_reload_identities_updates_count() {
        let mut dev = device(FakeApi::default());
        assert_eq!(dev.subscribe().borrow().identities, 0);
        dev.api.persons = FakeApi::alice().persons;
        assert_eq!(dev.reload_identities().unwrap(), 1);
        let state = dev.subscribe().borrow().clone();
        assert_eq!(state.identities, 1);
        assert_eq!(state.persons, vec!["Alice".to_string()]);
    }
}
