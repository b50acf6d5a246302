//! Still-image capture for camera bindings.

use reqwest::blocking::Client;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CameraError {
    #[error("snapshot request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("snapshot url returned {0}")]
    Status(reqwest::StatusCode),
    #[error("failed to read snapshot file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("snapshot is empty")]
    Empty,
    #[error("snapshot is not a recognized image format")]
    NotAnImage,
}

/// Where a camera's still images come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CameraSource {
    /// HTTP(S) URL answering GET with an encoded image.
    Url(String),
    /// Image file written by some other process.
    File(PathBuf),
}

impl std::fmt::Display for CameraSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CameraSource::Url(url) => write!(f, "{url}"),
            CameraSource::File(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Something that can produce an encoded still image on demand.
pub trait Camera {
    fn capture(&self) -> Result<Vec<u8>, CameraError>;
}

/// Camera backed by a snapshot URL or file. Captures are blocking.
pub struct SnapshotCamera {
    source: CameraSource,
    http: Client,
}

impl SnapshotCamera {
    /// `timeout` bounds snapshot URL requests; `None` keeps the client default.
    pub fn new(source: CameraSource, timeout: Option<Duration>) -> Result<Self, CameraError> {
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            source,
            http: builder.build()?,
        })
    }

    pub fn source(&self) -> &CameraSource {
        &self.source
    }

    fn fetch(&self) -> Result<Vec<u8>, CameraError> {
        match &self.source {
            CameraSource::Url(url) => {
                let response = self.http.get(url).send()?;
                let status = response.status();
                if !status.is_success() {
                    return Err(CameraError::Status(status));
                }
                Ok(response.bytes()?.to_vec())
            }
            CameraSource::File(path) => std::fs::read(path).map_err(|source| CameraError::Read {
                path: path.clone(),
                source,
            }),
        }
    }
}

impl Camera for SnapshotCamera {
    fn capture(&self) -> Result<Vec<u8>, CameraError> {
        let bytes = self.fetch()?;
        let format = check_image(&bytes)?;
        tracing::debug!(source = %self.source, bytes = bytes.len(), ?format, "snapshot captured");
        Ok(bytes)
    }
}

/// Reject payloads that are obviously not an encoded image before they reach the Face API.
pub fn check_image(bytes: &[u8]) -> Result<image::ImageFormat, CameraError> {
    if bytes.is_empty() {
        return Err(CameraError::Empty);
    }
    image::guess_format(bytes).map_err(|_| CameraError::NotAnImage)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const PNG_MAGIC: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";
    const JPEG_MAGIC: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F'];

    #[test]
    fn test_check_image_accepts_png_and_jpeg() {
        assert_eq!(check_image(PNG_MAGIC).unwrap(), image::ImageFormat::Png);
        assert_eq!(check_image(JPEG_MAGIC).unwrap(), image::ImageFormat::Jpeg);
    }

    #[test]
    fn test_check_image_rejects_text() {
        assert!(matches!(
            check_image(b"<html>login required</html>"),
            Err(CameraError::NotAnImage)
        ));
    }

    #[test]
    fn test_check_image_rejects_empty() {
        assert!(matches!(check_image(&[]), Err(CameraError::Empty)));
    }

    #[test]
    fn test_file_camera_reads_image() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snap.png");
        std::fs::write(&path, PNG_MAGIC).unwrap();

        let camera = SnapshotCamera::new(CameraSource::File(path), None).unwrap();
        assert_eq!(camera.capture().unwrap(), PNG_MAGIC);
    }

    #[test]
    fn test_file_camera_missing_file() {
        let camera =
            SnapshotCamera::new(CameraSource::File("/nonexistent/snap.jpg".into()), None).unwrap();
        assert!(matches!(camera.capture(), Err(CameraError::Read { .. })));
    }

    #[test]
    fn test_source_display() {
        assert_eq!(
            CameraSource::Url("http://cam/snap.jpg".into()).to_string(),
            "http://cam/snap.jpg"
        );
        assert_eq!(CameraSource::File("/tmp/a.jpg".into()).to_string(), "/tmp/a.jpg");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_url_camera_fetches_image() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/snapshot.jpg"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(JPEG_MAGIC))
            .mount(&server)
            .await;

        let url = format!("{}/snapshot.jpg", server.uri());
        let bytes = tokio::task::spawn_blocking(move || {
            SnapshotCamera::new(CameraSource::Url(url), None)?.capture()
        })
        .await
        .unwrap()
        .unwrap();
        assert_eq!(bytes, JPEG_MAGIC);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_url_camera_honors_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_bytes(JPEG_MAGIC)
                    .set_delay(Duration::from_secs(5)),
            )
            .mount(&server)
            .await;

        let url = format!("{}/snapshot.jpg", server.uri());
        let result = tokio::task::spawn_blocking(move || {
            SnapshotCamera::new(CameraSource::Url(url), Some(Duration::from_millis(200)))?
                .capture()
        })
        .await
        .unwrap();
        match result {
            Err(CameraError::Http(err)) => assert!(err.is_timeout()),
            other => panic!("expected timeout, got {other:?}"),
        }
    }
}
