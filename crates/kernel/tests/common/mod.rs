#![allow(clippy::unwrap_used, clippy::expect_used)]
//! Common test utilities for integration tests.
//!
//! This module provides test infrastructure that uses the REAL kernel code,
//! not mock implementations: the same router, state and plugin host the
//! `trellis` binary serves. Each test builds its own [`TestApp`], so plugin
//! lifecycle changes in one test never leak into another.

#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use axum::response::Response;
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use trellis_kernel::app::app;
use trellis_kernel::auth::{StaticIdentityProvider, TokenCodec};
use trellis_kernel::bundled::bundled_plugins;
use trellis_kernel::config::Config;
use trellis_kernel::state::AppState;
use trellis_sdk::{Grants, Plugin};
use trellis_test_utils::{EMPTY_KEY, FULL_KEY, TEST_JWT_SECRET, WRITER_KEY, grants};

/// Test application wrapper using the REAL kernel routes and state.
pub struct TestApp {
    router: Router,
    pub state: AppState,
}

impl TestApp {
    /// App with the bundled plugins and the standard test keys.
    pub fn new() -> Self {
        Self::with_plugins(bundled_plugins())
    }

    /// App with an explicit plugin set and the standard test keys.
    pub fn with_plugins(plugins: Vec<Arc<dyn Plugin>>) -> Self {
        Self::build(Config::default(), test_identity(), plugins)
    }

    pub fn build(
        config: Config,
        identity: StaticIdentityProvider,
        plugins: Vec<Arc<dyn Plugin>>,
    ) -> Self {
        let state = AppState::with_identity(config, Arc::new(identity));
        state.start_plugins(plugins).expect("Failed to start plugins");
        Self {
            router: app(state.clone()),
            state,
        }
    }

    /// Send a request to the test application.
    pub async fn request(&self, request: Request<Body>) -> Response {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request")
    }

    /// Send a request and decode the JSON response.
    pub async fn call(
        &self,
        method: Method,
        uri: &str,
        api_key: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(key) = api_key {
            builder = builder.header("x-api-key", key);
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let response = self.request(request).await;
        let status = response.status();
        (status, response_json(response).await)
    }

    pub async fn get(&self, uri: &str, api_key: Option<&str>) -> (StatusCode, Value) {
        self.call(Method::GET, uri, api_key, None).await
    }

    pub async fn post(&self, uri: &str, api_key: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.call(Method::POST, uri, api_key, Some(body)).await
    }

    /// Current dispatch table generation.
    pub fn generation(&self) -> u64 {
        self.state.registry().snapshot().generation()
    }
}

/// Identity provider holding the standard test keys.
pub fn test_identity() -> StaticIdentityProvider {
    StaticIdentityProvider::new(Some(test_codec()))
        .with_key("full", FULL_KEY, Grants::full())
        .with_key("writer", WRITER_KEY, grants::conversation_write())
        .with_key("empty", EMPTY_KEY, Grants::none())
}

pub fn test_codec() -> TokenCodec {
    TokenCodec::new(TEST_JWT_SECRET.as_bytes(), 60)
}

/// Decode a response body as JSON; an empty body becomes `Null`.
pub async fn response_json(response: Response) -> Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("Failed to read body")
        .to_bytes();
    if bytes.is_empty() {
        return Value::Null;
    }
    serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
}

/// Read a response body as text.
pub async fn response_text(response: Response) -> String {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("Failed to read body")
        .to_bytes();
    String::from_utf8_lossy(&bytes).into_owned()
}
