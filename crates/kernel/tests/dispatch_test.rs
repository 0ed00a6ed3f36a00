#![allow(clippy::unwrap_used, clippy::expect_used)]
//! Integration tests for request dispatch to plugin routes.
//!
//! Covers matching, credential resolution, payload validation and handler
//! failures through the real router.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use serde_json::{Value, json};
use trellis_kernel::config::Config;
use trellis_sdk::prelude::*;
use trellis_test_utils::{
    EMPTY_KEY, FULL_KEY, TestPlugin, WRITER_KEY, assert, echo, fixed, grants, tokens,
};

mod common;
use common::{TestApp, response_json, test_identity};

// =============================================================================
// Protected route (jokes plugin)
// =============================================================================

#[tokio::test]
async fn joke_with_granted_key_returns_200() {
    let app = TestApp::new();

    let (status, body) = app.get("/custom/joke", Some(WRITER_KEY)).await;

    assert_eq!(status, StatusCode::OK);
    assert::has_key(&body, "joke");
    assert_eq!(body["user_id"], "user");
}

#[tokio::test]
async fn joke_with_unknown_key_returns_401() {
    let app = TestApp::new();

    let response = app
        .request(
            Request::get("/custom/joke")
                .header("x-api-key", "not-a-key")
                .body(Body::empty())
                .unwrap(),
        )
        .await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        response.headers().get(header::WWW_AUTHENTICATE).unwrap(),
        "Bearer"
    );
}

#[tokio::test]
async fn joke_without_credentials_returns_401() {
    let app = TestApp::new();
    let (status, _) = app.get("/custom/joke", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn joke_with_key_lacking_grant_returns_403() {
    let app = TestApp::new();

    let (status, body) = app.get("/custom/joke", Some(EMPTY_KEY)).await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert::contains(body["detail"].as_str().unwrap(), "CONVERSATION:WRITE");
}

#[tokio::test]
async fn user_id_header_names_the_principal() {
    let app = TestApp::new();

    let response = app
        .request(
            Request::get("/custom/joke")
                .header("x-api-key", FULL_KEY)
                .header("user_id", "carla")
                .body(Body::empty())
                .unwrap(),
        )
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response_json(response).await["user_id"], "carla");
}

// =============================================================================
// Bearer tokens
// =============================================================================

async fn get_with_bearer(app: &TestApp, uri: &str, token: &str, key: Option<&str>) -> StatusCode {
    let mut builder = Request::get(uri).header(header::AUTHORIZATION, format!("Bearer {token}"));
    if let Some(key) = key {
        builder = builder.header("x-api-key", key);
    }
    app.request(builder.body(Body::empty()).unwrap())
        .await
        .status()
}

#[tokio::test]
async fn valid_token_is_accepted() {
    let app = TestApp::new();
    let token = tokens::mint("dana", &grants::conversation_write());

    let response = app
        .request(
            Request::get("/custom/joke")
                .header(header::AUTHORIZATION, format!("Bearer {token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response_json(response).await["user_id"], "dana");
}

#[tokio::test]
async fn token_without_grant_is_forbidden() {
    let app = TestApp::new();
    let token = tokens::mint("dana", &Grants::none());
    assert_eq!(
        get_with_bearer(&app, "/custom/joke", &token, None).await,
        StatusCode::FORBIDDEN
    );
}

#[tokio::test]
async fn expired_token_is_unauthenticated() {
    let app = TestApp::new();
    let token = tokens::expired("dana", &Grants::full());
    assert_eq!(
        get_with_bearer(&app, "/custom/joke", &token, None).await,
        StatusCode::UNAUTHORIZED
    );
}

#[tokio::test]
async fn token_signed_with_other_secret_is_unauthenticated() {
    let app = TestApp::new();
    let token = tokens::mint_with("some-other-secret", "dana", &Grants::full(), 3600);
    assert_eq!(
        get_with_bearer(&app, "/custom/joke", &token, None).await,
        StatusCode::UNAUTHORIZED
    );
}

#[tokio::test]
async fn bad_token_is_not_rescued_by_valid_key() {
    let app = TestApp::new();
    assert_eq!(
        get_with_bearer(&app, "/custom/joke", "garbage", Some(FULL_KEY)).await,
        StatusCode::UNAUTHORIZED
    );
}

// =============================================================================
// Payload validation (topic_jokes plugin)
// =============================================================================

#[tokio::test]
async fn topic_joke_matches_output_schema() {
    let app = TestApp::new();

    let (status, body) = app
        .post(
            "/custom/topic-joke",
            Some(WRITER_KEY),
            json!({"topic": "mozzarella", "language": "italian"}),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert!(body["joke"].as_str().unwrap().contains("mozzarella"));
    assert_eq!(body["user_id"], "user");
    assert_eq!(body.as_object().unwrap().len(), 2);
}

#[tokio::test]
async fn topic_joke_wrong_type_is_422() {
    let app = TestApp::new();

    let (status, body) = app
        .post("/custom/topic-joke", Some(WRITER_KEY), json!({"topic": 1}))
        .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert::validation_error_at(&body, &["body", "topic"]);
    assert::validation_error_at(&body, &["body", "language"]);
}

#[tokio::test]
async fn blank_topic_is_422() {
    let app = TestApp::new();

    let (status, body) = app
        .post(
            "/custom/topic-joke",
            Some(WRITER_KEY),
            json!({"topic": "   ", "language": "english"}),
        )
        .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert::validation_error_at(&body, &["body", "topic"]);
}

#[tokio::test]
async fn invalid_input_never_reaches_handler() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let plugin = TestPlugin::new("counted").endpoint(
        Endpoint::post("/count")
            .input(Schema::object().field("n", Schema::Integer).build())
            .handle(move |_req| {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Ok(json!({})) }
            }),
    );
    let app = TestApp::with_plugins(vec![plugin.into_arc()]);

    let (status, _) = app.post("/custom/count", None, json!({"n": "one"})).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    let (status, _) = app.post("/custom/count", None, json!({"n": 1, "extra": true})).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    let (status, _) = app.post("/custom/count", None, json!({"n": 1})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn auth_is_checked_before_validation() {
    let app = TestApp::new();
    let (status, _) = app
        .post("/custom/topic-joke", Some(EMPTY_KEY), json!({"topic": 1}))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn malformed_json_is_400() {
    let app = TestApp::new();

    let response = app
        .request(
            Request::post("/custom/topic-joke")
                .header("x-api-key", WRITER_KEY)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from("{\"topic\": "))
                .unwrap(),
        )
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn get_input_is_read_from_query() {
    let plugin = TestPlugin::new("search").endpoint(echo(
        Endpoint::get("/search").input(
            Schema::object()
                .field("q", Schema::String)
                .optional("limit", Schema::Integer)
                .build(),
        ),
    ));
    let app = TestApp::with_plugins(vec![plugin.into_arc()]);

    let (status, body) = app.get("/custom/search?q=cheese&limit=5", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["input"], json!({"q": "cheese", "limit": 5}));
    assert_eq!(body["query"]["q"], "cheese");

    let (status, body) = app.get("/custom/search?limit=five", None).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert::validation_error_at(&body, &["query", "q"]);
}

// =============================================================================
// Matching
// =============================================================================

#[tokio::test]
async fn unknown_route_is_404() {
    let app = TestApp::new();
    let (status, body) = app.get("/custom/nope", Some(FULL_KEY)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["detail"], "Not Found");
}

#[tokio::test]
async fn wrong_method_is_404() {
    let app = TestApp::new();
    let (status, _) = app.post("/custom/joke", Some(FULL_KEY), json!({})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn unsupported_method_is_405() {
    let app = TestApp::new();
    let (status, _) = app
        .call(Method::PATCH, "/custom/joke", Some(FULL_KEY), None)
        .await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn path_params_and_trailing_slash() {
    let plugin = TestPlugin::new("items")
        .endpoint(echo(Endpoint::get("/items/{id}").prefix("/api")))
        .endpoint(fixed(Endpoint::get("/items/latest").prefix("/api"), json!("latest")));
    let app = TestApp::with_plugins(vec![plugin.into_arc()]);

    let (status, body) = app.get("/api/items/42/", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["path_params"]["id"], "42");

    // Exact routes win over templates.
    let (_, body) = app.get("/api/items/latest", None).await;
    assert_eq!(body, json!("latest"));
}

#[tokio::test]
async fn path_segments_are_percent_decoded() {
    let plugin = TestPlugin::new("decoded")
        .endpoint(echo(Endpoint::get("/items/{id}")))
        .endpoint(fixed(Endpoint::get("/café"), json!("café")));
    let app = TestApp::with_plugins(vec![plugin.into_arc()]);

    let (status, body) = app.get("/custom/items/hello%20world", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["path_params"]["id"], "hello world");

    let (status, body) = app.get("/custom/caf%C3%A9", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!("café"));

    // Not UTF-8 once decoded.
    let (status, _) = app.get("/custom/items/%FF%FE", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn public_route_ignores_credentials() {
    let plugin = TestPlugin::new("open").endpoint(echo(Endpoint::get("/open")));
    let app = TestApp::with_plugins(vec![plugin.into_arc()]);

    let (status, body) = app.get("/custom/open", Some("garbage")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user_id"], Value::Null);
}

#[tokio::test]
async fn core_path_with_other_method_falls_through_to_plugins() {
    let plugin = TestPlugin::new("shadow").endpoint(fixed(
        Endpoint::delete("/health").prefix(""),
        json!({"deleted": true}),
    ));
    let app = TestApp::with_plugins(vec![plugin.into_arc()]);

    let (status, body) = app.call(Method::DELETE, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["deleted"], true);

    let (status, body) = app.get("/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

// =============================================================================
// Handler failures
// =============================================================================

#[tokio::test]
async fn handler_failure_is_500_without_detail() {
    let plugin = TestPlugin::new("broken")
        .endpoint(Endpoint::get("/fail").handle(|_req| async {
            Err(HandlerFailure::new("database password is hunter2"))
        }))
        .endpoint(
            Endpoint::get("/shape")
                .output(Schema::object().field("ok", Schema::Boolean).build())
                .handle(|_req| async { Ok(json!({"ok": "yes"})) }),
        );
    let app = TestApp::with_plugins(vec![plugin.into_arc()]);

    let (status, body) = app.get("/custom/fail", None).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["detail"], "Internal server error");

    let (status, _) = app.get("/custom/shape", None).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn handler_panic_is_contained() {
    let plugin = TestPlugin::new("panicky").endpoint(Endpoint::get("/panic").handle(|_req| async {
        if true {
            panic!("handler exploded");
        }
        Ok(json!(null))
    }));
    let app = TestApp::with_plugins(vec![plugin.into_arc()]);

    let (status, _) = app.get("/custom/panic", None).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

    // The server keeps serving.
    let (status, _) = app.get("/health", None).await;
    assert_eq!(status, StatusCode::OK);
}

/// Sets its flag when dropped, i.e. when the handler future is discarded.
struct DropFlag(Arc<AtomicBool>);

impl Drop for DropFlag {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

#[tokio::test]
async fn request_timeout_cancels_handler() {
    let dropped = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&dropped);
    let plugin = TestPlugin::new("sleepy").endpoint(Endpoint::get("/sleep").handle(move |_req| {
        let flag = Arc::clone(&flag);
        async move {
            let _guard = DropFlag(flag);
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(json!("woke up"))
        }
    }));
    let config = Config {
        request_timeout_secs: 1,
        ..Config::default()
    };
    let app = TestApp::build(config, test_identity(), vec![plugin.into_arc()]);

    let (status, _) = tokio::time::timeout(Duration::from_secs(10), app.get("/custom/sleep", None))
        .await
        .expect("timeout layer did not fire");

    assert_eq!(status, StatusCode::REQUEST_TIMEOUT);
    assert!(dropped.load(Ordering::SeqCst), "handler future still alive");
}
