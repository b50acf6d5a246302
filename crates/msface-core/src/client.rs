//! Blocking client for the Face API v1.0 REST endpoints.
//!
//! Calls are synchronous network I/O and must run off the async runtime
//! (the daemon drives them from per-device engine threads).

use crate::types::{DetectedFace, IdentifyResult, Person};
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::CONTENT_TYPE;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use std::time::Duration;
use thiserror::Error;

const SUBSCRIPTION_KEY_HEADER: &str = "Ocp-Apim-Subscription-Key";
const OCTET_STREAM: &str = "application/octet-stream";
const MAX_CANDIDATES: u32 = 10;
/// Seconds the service keeps detected face ids (service minimum is 60).
const FACE_ID_TTL_SECS: u32 = 60;
const MAX_PERSONS: u32 = 1000;

pub const DEFAULT_REGION: &str = "useast2";
pub const DEFAULT_RECOGNITION_MODEL: &str = "recognition_01";
pub const DEFAULT_DETECTION_MODEL: &str = "detection_01";

#[derive(Error, Debug)]
pub enum FaceApiError {
    #[error("http: {0}")]
    Http(#[from] reqwest::Error),
    #[error("face api returned {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error("unexpected response from {operation}: {source}")]
    Decode {
        operation: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

/// The Face API operations the rest of the system depends on.
pub trait FaceApi {
    /// Submit an encoded image and return the faces found in it.
    fn detect(&self, image: &[u8]) -> Result<Vec<DetectedFace>, FaceApiError>;

    /// Match detected face ids against a person group.
    ///
    /// `confidence_pct` is a percentage in [0, 100].
    fn identify(
        &self,
        face_ids: &[String],
        group: &str,
        confidence_pct: f64,
    ) -> Result<Vec<IdentifyResult>, FaceApiError>;

    /// List the persons enrolled in a group.
    fn list_persons(&self, group: &str) -> Result<Vec<Person>, FaceApiError>;

    /// Create (or replace) a person group.
    fn create_group(&self, name: &str, recognition_model: &str) -> Result<(), FaceApiError>;
}

/// Connection settings for [`FaceClient`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_key: String,
    pub region: String,
    /// Full base URL override (e.g. `https://my-resource.cognitiveservices.azure.com/face/v1.0`).
    pub endpoint: Option<String>,
    pub recognition_model: String,
    pub detection_model: String,
    /// Request timeout; `None` keeps the HTTP client default.
    pub timeout: Option<Duration>,
}

impl ClientConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            region: DEFAULT_REGION.to_string(),
            endpoint: None,
            recognition_model: DEFAULT_RECOGNITION_MODEL.to_string(),
            detection_model: DEFAULT_DETECTION_MODEL.to_string(),
            timeout: None,
        }
    }

    /// Base URL all operations are appended to, without a trailing slash.
    pub fn base_url(&self) -> String {
        match &self.endpoint {
            Some(endpoint) => endpoint.trim_end_matches('/').to_string(),
            None => format!("https://{}.api.cognitive.microsoft.com/face/v1.0", self.region),
        }
    }
}

/// Face API client over `reqwest::blocking`.
pub struct FaceClient {
    http: Client,
    config: ClientConfig,
    base_url: String,
}

impl FaceClient {
    pub fn new(config: ClientConfig) -> Result<Self, FaceApiError> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build()?;
        let base_url = config.base_url();
        Ok(Self {
            http,
            config,
            base_url,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request.header(SUBSCRIPTION_KEY_HEADER, &self.config.api_key)
    }

    /// Send a request and fail on any non-2xx status.
    fn send(&self, request: RequestBuilder) -> Result<Response, FaceApiError> {
        let response = self.authorized(request).send()?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(FaceApiError::Status { status, body });
        }
        Ok(response)
    }

    fn decode<T: DeserializeOwned>(
        operation: &'static str,
        response: Response,
    ) -> Result<T, FaceApiError> {
        let bytes = response.bytes()?;
        serde_json::from_slice(&bytes).map_err(|source| FaceApiError::Decode { operation, source })
    }
}

impl FaceApi for FaceClient {
    fn detect(&self, image: &[u8]) -> Result<Vec<DetectedFace>, FaceApiError> {
        tracing::debug!(bytes = image.len(), "detect request");
        let ttl = FACE_ID_TTL_SECS.to_string();
        let request = self
            .http
            .post(self.url("detect"))
            .query(&[
                ("returnFaceId", "true"),
                ("returnFaceLandmarks", "false"),
                ("recognitionModel", self.config.recognition_model.as_str()),
                ("detectionModel", self.config.detection_model.as_str()),
                ("returnRecognitionModel", "false"),
                ("faceIdTimeToLive", ttl.as_str()),
            ])
            .header(CONTENT_TYPE, OCTET_STREAM)
            .body(image.to_vec());

        let faces: Vec<DetectedFace> = Self::decode("detect", self.send(request)?)?;
        tracing::debug!(count = faces.len(), "detect response");
        Ok(faces)
    }

    fn identify(
        &self,
        face_ids: &[String],
        group: &str,
        confidence_pct: f64,
    ) -> Result<Vec<IdentifyResult>, FaceApiError> {
        tracing::debug!(faces = face_ids.len(), group, "identify request");
        let body = serde_json::json!({
            "faceIds": face_ids,
            "personGroupId": group,
            "maxNumOfCandidatesReturned": MAX_CANDIDATES,
            "confidenceThreshold": confidence_pct / 100.0,
        });
        let request = self.http.post(self.url("identify")).json(&body);
        Self::decode("identify", self.send(request)?)
    }

    fn list_persons(&self, group: &str) -> Result<Vec<Person>, FaceApiError> {
        let top = MAX_PERSONS.to_string();
        let request = self
            .http
            .get(self.url(&format!("persongroups/{group}/persons")))
            .query(&[("top", top.as_str())]);
        Self::decode("list persons", self.send(request)?)
    }

    fn create_group(&self, name: &str, recognition_model: &str) -> Result<(), FaceApiError> {
        let body = serde_json::json!({
            "name": name,
            "recognitionModel": recognition_model,
        });
        let request = self
            .http
            .put(self.url(&format!("persongroups/{name}")))
            .json(&body);
        let response = self.send(request)?;
        tracing::info!(group = name, status = %response.status(), "person group created");
        Ok(())
    }
}
