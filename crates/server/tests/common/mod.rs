//! Common test utilities for API testing with mocks.
//!
//! This module provides a test fixture that creates an in-process router
//! with mock encoder collaborators injected, so uploads run through the real
//! coordinator without ffmpeg.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::http::{HeaderMap, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use dashpack_core::{
    testing::{MockInspector, MockLauncher},
    ArtifactNamespace, Config, EncodeLauncher, JobId, ServerConfig, StorageConfig,
    StreamInspector, TranscodeCoordinator, UploadConfig,
};
use dashpack_server::{api::create_router, state::AppState};

/// Multipart boundary used by [`TestFixture::upload`].
const BOUNDARY: &str = "dashpack-test-boundary";

/// Test fixture with mock encoder collaborators.
///
/// # Example
///
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_upload() {
///     let fixture = TestFixture::new().await;
///
///     let response = fixture.upload("clip.mp4", "video/mp4", b"data").await;
///     assert_eq!(response.status, StatusCode::ACCEPTED);
/// }
/// ```
pub struct TestFixture {
    /// The Axum router for testing
    pub router: Router,
    /// Shared state behind the router
    pub state: Arc<AppState>,
    /// Mock inspector - configure audio detection
    pub inspector: Arc<MockInspector>,
    /// Mock launcher - control encoder outcomes
    pub launcher: Arc<MockLauncher>,
    /// Where uploads are stored
    pub upload_dir: PathBuf,
    /// Namespace root for job outputs
    pub output_dir: PathBuf,
    /// Temporary directory holding both
    pub temp_dir: TempDir,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

/// Response with the raw body and headers, for file downloads
#[derive(Debug)]
pub struct RawResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl TestFixture {
    /// Create a new test fixture with default mocks.
    pub async fn new() -> Self {
        Self::with_config(TestConfig::default()).await
    }

    /// Create a test fixture with custom configuration.
    pub async fn with_config(test_config: TestConfig) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let upload_dir = temp_dir.path().join("uploads");
        let output_dir = temp_dir.path().join("video");
        std::fs::create_dir_all(&upload_dir).expect("Failed to create upload dir");

        let config = Config {
            server: ServerConfig {
                host: std::net::IpAddr::V4(std::net::Ipv4Addr::LOCALHOST),
                port: 0, // Not used for in-process testing
            },
            storage: StorageConfig {
                upload_dir: upload_dir.clone(),
                output_dir: output_dir.clone(),
            },
            upload: UploadConfig {
                max_bytes: test_config.max_bytes,
                ..Default::default()
            },
            encoder: Default::default(),
        };

        let inspector = Arc::new(MockInspector::new());
        let launcher = Arc::new(MockLauncher::new());

        let coordinator = Arc::new(TranscodeCoordinator::new(
            ArtifactNamespace::new(output_dir.clone()),
            Arc::clone(&inspector) as Arc<dyn StreamInspector>,
            Arc::clone(&launcher) as Arc<dyn EncodeLauncher>,
        ));

        let state = Arc::new(AppState::new(config, coordinator));
        let router = create_router(Arc::clone(&state));

        Self {
            router,
            state,
            inspector,
            launcher,
            upload_dir,
            output_dir,
            temp_dir,
        }
    }

    /// Send a GET request and parse the body as JSON.
    pub async fn get(&self, path: &str) -> TestResponse {
        let request = Request::builder()
            .method("GET")
            .uri(path)
            .body(Body::empty())
            .unwrap();
        into_test_response(self.send(request).await)
    }

    /// Send a GET request and keep the raw body.
    pub async fn get_raw(&self, path: &str) -> RawResponse {
        let request = Request::builder()
            .method("GET")
            .uri(path)
            .body(Body::empty())
            .unwrap();
        self.send(request).await
    }

    /// Send a GET request with one extra header and keep the raw body.
    pub async fn get_raw_with_header(&self, path: &str, name: &str, value: &str) -> RawResponse {
        let request = Request::builder()
            .method("GET")
            .uri(path)
            .header(name, value)
            .body(Body::empty())
            .unwrap();
        self.send(request).await
    }

    /// Upload a file in the default `video` field.
    pub async fn upload(&self, file_name: &str, content_type: &str, data: &[u8]) -> TestResponse {
        self.upload_field("video", file_name, content_type, data).await
    }

    /// Upload a file in an arbitrary multipart field.
    pub async fn upload_field(
        &self,
        field: &str,
        file_name: &str,
        content_type: &str,
        data: &[u8],
    ) -> TestResponse {
        let mut body = Vec::new();
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
                field, file_name
            )
            .as_bytes(),
        );
        body.extend_from_slice(format!("Content-Type: {}\r\n\r\n", content_type).as_bytes());
        body.extend_from_slice(data);
        body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());

        let request = Request::builder()
            .method("POST")
            .uri("/api/v1/upload")
            .header(
                "Content-Type",
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(body))
            .unwrap();

        into_test_response(self.send(request).await)
    }

    /// Wait for a job's encoder to finish.
    pub async fn wait_for_job(&self, job_id: &str) {
        let job_id = JobId::parse(job_id).expect("Invalid job id");
        self.state
            .coordinator()
            .wait_for(&job_id)
            .await
            .expect("Job should exist");
    }

    /// Number of files currently in the upload directory.
    pub fn upload_count(&self) -> usize {
        std::fs::read_dir(&self.upload_dir)
            .expect("Failed to read upload dir")
            .count()
    }

    async fn send(&self, request: Request<Body>) -> RawResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        RawResponse {
            status,
            headers,
            body,
        }
    }
}

fn into_test_response(raw: RawResponse) -> TestResponse {
    let body: Value = if raw.body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&raw.body).unwrap_or(Value::Null)
    };

    TestResponse {
        status: raw.status,
        body,
    }
}

/// Configuration for test fixture.
#[derive(Debug, Clone)]
pub struct TestConfig {
    /// Upload size limit in bytes
    pub max_bytes: u64,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            max_bytes: UploadConfig::default().max_bytes,
        }
    }
}

impl TestConfig {
    /// Create config with a custom upload size limit.
    pub fn with_max_bytes(max_bytes: u64) -> Self {
        Self { max_bytes }
    }
}

/// Helper to assert a response has expected status.
#[macro_export]
macro_rules! assert_status {
    ($response:expr, $status:expr) => {
        assert_eq!(
            $response.status, $status,
            "Expected status {:?}, got {:?}. Body: {}",
            $status,
            $response.status,
            serde_json::to_string_pretty(&$response.body).unwrap_or_default()
        );
    };
}

/// Helper to assert a JSON path equals expected value.
#[macro_export]
macro_rules! assert_json_path {
    ($json:expr, $path:expr, $expected:expr) => {
        let actual = &$json[$path];
        assert_eq!(
            actual, &$expected,
            "Path '{}' expected {:?}, got {:?}",
            $path, $expected, actual
        );
    };
}
