//! Common test utilities for server integration tests.
//!
//! Provides a test fixture that wires the router to a controller backed by
//! the mock engine, so tests never need a real ffmpeg binary.

#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, HeaderMap, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use opener_core::{
    testing::MockEngine, AppController, Config, ControllerConfig, LimitsConfig, SharedEngine,
};
use opener_server::{api::create_router, state::AppState};

const BOUNDARY: &str = "opener-test-boundary";

/// Response from a test request.
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

/// Response whose body is kept as raw bytes.
#[derive(Debug)]
pub struct RawResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

/// Configuration for test fixture.
#[derive(Debug, Clone)]
pub struct TestConfig {
    /// Largest accepted upload in bytes.
    pub max_file_size_bytes: u64,
    /// Error notice lifetime; 0 keeps errors until dismissed.
    pub error_notice_ms: u64,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            max_file_size_bytes: 1024 * 1024,
            error_notice_ms: 0,
        }
    }
}

/// Test fixture containing the router and the mock behind it.
pub struct TestFixture {
    pub router: Router,
    pub engine: MockEngine,
    pub controller: AppController,
}

impl TestFixture {
    /// Create a new test fixture with default configuration.
    pub fn new() -> Self {
        Self::with_config(TestConfig::default())
    }

    /// Create a test fixture with custom configuration.
    pub fn with_config(test_config: TestConfig) -> Self {
        let config = Config {
            limits: LimitsConfig {
                max_file_size_bytes: test_config.max_file_size_bytes,
            },
            controller: ControllerConfig {
                error_notice_ms: test_config.error_notice_ms,
                ..Default::default()
            },
            ..Default::default()
        };
        Self::from_config(config)
    }

    /// Create a test fixture from a full configuration, with the mock engine
    /// standing in for ffmpeg.
    pub fn from_config(config: Config) -> Self {
        let engine = MockEngine::new();
        let controller = AppController::with_size_limit(
            SharedEngine::new(Arc::new(engine.clone())),
            config.controller.clone(),
            config.limits.max_file_size_bytes,
        );

        let state = Arc::new(AppState::new(config, controller.clone()));
        let router = create_router(state);

        Self {
            router,
            engine,
            controller,
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

    /// Send a DELETE request.
    pub async fn delete(&self, path: &str) -> TestResponse {
        self.request("DELETE", path, None).await
    }

    /// Upload a file as the `file` part of a multipart form.
    pub async fn upload(&self, file_name: &str, content_type: &str, data: &[u8]) -> TestResponse {
        self.upload_with_mime(file_name, content_type, data, None)
            .await
    }

    /// Upload a file with an optional `mime` override part.
    pub async fn upload_with_mime(
        &self,
        file_name: &str,
        content_type: &str,
        data: &[u8],
        mime: Option<&str>,
    ) -> TestResponse {
        let mut body = Vec::new();
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\nContent-Type: {content_type}\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
        if let Some(mime) = mime {
            body.extend_from_slice(Self::multipart_part_header("mime").as_bytes());
            body.extend_from_slice(mime.as_bytes());
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

        self.post_multipart(body).await
    }

    /// Build the opening of a multipart part named `name`.
    pub fn multipart_part_header(name: &str) -> String {
        format!("--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n")
    }

    /// POST an already encoded multipart body to the upload endpoint.
    pub async fn post_multipart(&self, body: Vec<u8>) -> TestResponse {
        let request = Request::builder()
            .method("POST")
            .uri("/api/v1/file")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap();

        let raw = self.send(request).await;
        TestResponse {
            status: raw.status,
            body: parse_json(&raw.body),
        }
    }

    /// Send a GET request and keep the body as bytes.
    pub async fn get_raw(&self, path: &str) -> RawResponse {
        let request = Request::builder()
            .method("GET")
            .uri(path)
            .body(Body::empty())
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

        let raw = self.send(request_builder.body(body).unwrap()).await;
        TestResponse {
            status: raw.status,
            body: parse_json(&raw.body),
        }
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
            .to_bytes()
            .to_vec();

        RawResponse {
            status,
            headers,
            body,
        }
    }
}

fn parse_json(bytes: &[u8]) -> Value {
    if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(bytes).unwrap_or(Value::Null)
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
