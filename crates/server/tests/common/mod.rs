//! Common test utilities for in-process API testing with mocks.
//!
//! This module provides a test fixture that builds the router around a real
//! orchestrator whose collaborators are mocks, so the whole request path can
//! be tested without Spotify or a download tool.

use std::path::PathBuf;
use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::http::{HeaderMap, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use tunefetch_core::{
    testing::{MockDownloader, MockSearcher},
    Config, DownloadOrchestrator, Settings, SettingsRegistry, SongSearcher,
};
use tunefetch_server::{api::create_router, state::AppState};

/// Re-export fixtures for test convenience
pub use tunefetch_core::testing::fixtures;

/// Test fixture wiring the router to mock collaborators.
///
/// # Example
///
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_search() {
///     let fixture = TestFixture::new().await;
///     fixture.searcher.add_result(fixtures::song("Boards of Canada", "Roygbiv")).await;
///
///     let response = fixture.get("/api/v1/songs/search?query=roygbiv").await;
///     assert_eq!(response.status, 200);
/// }
/// ```
pub struct TestFixture {
    /// The Axum router for testing
    pub router: Router,
    /// Mock searcher - configure search results
    pub searcher: Arc<MockSearcher>,
    /// Mock downloader - inspect and fail downloads
    pub downloader: Arc<MockDownloader>,
    pub orchestrator: Arc<DownloadOrchestrator>,
    /// Temporary directory holding the download output
    pub temp_dir: TempDir,
    /// Output directory of the initial settings
    pub output_dir: PathBuf,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    /// Parsed JSON body, `Null` when the body is empty or not JSON.
    pub body: Value,
    pub bytes: Bytes,
}

impl TestFixture {
    /// Create a new test fixture with default mocks.
    pub async fn new() -> Self {
        Self::with_config(TestConfig::default()).await
    }

    /// Create a test fixture with custom configuration.
    pub async fn with_config(test_config: TestConfig) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let output_dir = temp_dir.path().join("music");

        let settings = Settings::default()
            .with_threads(test_config.threads)
            .with_output(output_dir.clone());
        let config = Config {
            downloader: settings.clone(),
            ..Default::default()
        };
        let registry =
            Arc::new(SettingsRegistry::new(settings).expect("Failed to create registry"));

        let searcher = Arc::new(MockSearcher::new());
        let downloader = Arc::new(test_config.downloader);

        let orchestrator = Arc::new(
            DownloadOrchestrator::new(
                registry,
                Arc::clone(&downloader) as Arc<dyn tunefetch_core::Downloader>,
                test_config
                    .with_searcher
                    .then(|| Arc::clone(&searcher) as Arc<dyn SongSearcher>),
            )
            .await
            .expect("Failed to create orchestrator"),
        );

        let state = Arc::new(AppState::new(config, Arc::clone(&orchestrator)));
        let router = create_router(state);

        Self {
            router,
            searcher,
            downloader,
            orchestrator,
            temp_dir,
            output_dir,
        }
    }

    /// Send a GET request to the test server.
    pub async fn get(&self, path: &str) -> TestResponse {
        self.request("GET", path, None).await
    }

    /// Send a POST request with JSON body.
    pub async fn post(&self, path: &str, body: Value) -> TestResponse {
        self.request("POST", path, Some(body)).await
    }

    /// Send a POST request without a body.
    pub async fn post_empty(&self, path: &str) -> TestResponse {
        self.request("POST", path, None).await
    }

    /// Send a POST request with raw string body (for testing malformed JSON).
    pub async fn post_raw(&self, path: &str, body: &str) -> TestResponse {
        let request = Request::builder()
            .method("POST")
            .uri(path)
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();

        self.send(request).await
    }

    /// Send a request to the test server.
    async fn request(&self, method: &str, path: &str, body: Option<Value>) -> TestResponse {
        let mut request_builder = Request::builder().method(method).uri(path);

        let body = if let Some(json_body) = body {
            request_builder = request_builder.header("Content-Type", "application/json");
            Body::from(serde_json::to_vec(&json_body).unwrap())
        } else {
            Body::empty()
        };

        let request = request_builder.body(body).unwrap();
        self.send(request).await
    }

    async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        let body: Value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };

        TestResponse {
            status,
            headers,
            body,
            bytes,
        }
    }
}

/// Configuration for test fixture.
#[derive(Debug)]
pub struct TestConfig {
    /// Wire the mock searcher into the orchestrator
    pub with_searcher: bool,
    pub threads: usize,
    pub downloader: MockDownloader,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            with_searcher: true,
            threads: 2,
            downloader: MockDownloader::new().writing_files(),
        }
    }
}

impl TestConfig {
    /// Create config without a search provider.
    pub fn without_searcher() -> Self {
        Self {
            with_searcher: false,
            ..Default::default()
        }
    }

    /// Create config with a custom downloader.
    pub fn with_downloader(downloader: MockDownloader) -> Self {
        Self {
            downloader,
            ..Default::default()
        }
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
            String::from_utf8_lossy(&$response.bytes)
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
