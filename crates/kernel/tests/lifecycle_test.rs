#![allow(clippy::unwrap_used, clippy::expect_used)]
//! Integration tests for plugin lifecycle and registry consistency.
//!
//! A rejected enable must leave the live table exactly as it was; a reload
//! must swap routes without a window where neither version is served.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use axum::http::StatusCode;
use serde_json::json;
use tokio::sync::Notify;
use trellis_kernel::plugin::PluginError;
use trellis_kernel::registry::RegistryError;
use trellis_sdk::prelude::*;
use trellis_test_utils::{FULL_KEY, TestPlugin, echo, fixed};

mod common;
use common::TestApp;

/// Plugin whose declarations switch between two versions.
struct Versioned {
    v2: Arc<AtomicBool>,
}

impl Plugin for Versioned {
    fn id(&self) -> &str {
        "versioned"
    }

    fn endpoints(&self) -> Vec<Endpoint> {
        if self.v2.load(Ordering::SeqCst) {
            vec![fixed(Endpoint::get("/v2"), json!(2))]
        } else {
            vec![
                fixed(Endpoint::get("/v1"), json!(1)),
                fixed(Endpoint::get("/old"), json!("old")),
            ]
        }
    }
}

#[tokio::test]
async fn conflicting_plugin_is_rejected_without_side_effects() {
    let first = TestPlugin::new("first").endpoint(fixed(Endpoint::get("/joke"), json!("first")));
    let app = TestApp::with_plugins(vec![first.into_arc()]);
    let before = app.generation();

    let second = TestPlugin::new("second")
        .endpoint(echo(Endpoint::get("/fresh")))
        .endpoint(fixed(Endpoint::get("/joke"), json!("second")));
    app.state.plugins().install(second.into_arc()).unwrap();

    let err = app.state.enable_plugin("second").unwrap_err();
    match err {
        PluginError::Registry(RegistryError::Conflict {
            existing_owner, ..
        }) => assert_eq!(existing_owner, "first"),
        other => panic!("expected conflict, got {other:?}"),
    }

    assert_eq!(app.generation(), before);
    assert!(!app.state.plugins().is_enabled("second"));
    let (status, _) = app.get("/custom/fresh", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (_, body) = app.get("/custom/joke", None).await;
    assert_eq!(body, json!("first"));
}

#[tokio::test]
async fn core_routes_cannot_be_shadowed() {
    let greedy = TestPlugin::new("greedy")
        .endpoint(fixed(Endpoint::get("/health").prefix("/"), json!("mine")));
    let app = TestApp::with_plugins(vec![]);
    app.state.plugins().install(greedy.into_arc()).unwrap();

    let err = app.state.enable_plugin("greedy").unwrap_err();
    assert!(matches!(
        err,
        PluginError::Registry(RegistryError::Conflict { ref existing_owner, .. }) if existing_owner == "core"
    ));

    let (_, body) = app.get("/health", None).await;
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn invalid_declarations_abort_enable() {
    let bad_requirement = TestPlugin::new("typo")
        .endpoint(echo(Endpoint::get("/ok")))
        .endpoint(echo(Endpoint::get("/bad").requires_named("CONVERSATION", "SCRIBBLE")));
    let bad_path = TestPlugin::new("slashes").endpoint(echo(Endpoint::get("/a//b")));
    let no_handler = TestPlugin::new("bare").endpoint(Endpoint::get("/nothing"));
    let app = TestApp::with_plugins(vec![
        bad_requirement.into_arc(),
        bad_path.into_arc(),
        no_handler.into_arc(),
    ]);

    // Startup logs and skips failing plugins; nothing was registered.
    assert_eq!(app.state.plugins().enabled_count(), 0);
    assert!(app.state.registry().snapshot().is_empty());

    assert!(matches!(
        app.state.enable_plugin("typo"),
        Err(PluginError::Registry(RegistryError::InvalidRequirement { .. }))
    ));
    let (status, _) = app.get("/custom/ok", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn panicking_declaration_is_contained() {
    let plugin = TestPlugin::new("explodes")
        .endpoint(echo(Endpoint::get("/boom")))
        .panicking()
        .disabled_by_default();
    let app = TestApp::with_plugins(vec![plugin.clone().into_arc()]);

    let err = app.state.enable_plugin("explodes").unwrap_err();
    assert!(matches!(err, PluginError::DeclarationPanic { .. }));
    assert_eq!(plugin.declaration_count(), 1);
    assert!(!app.state.plugins().is_enabled("explodes"));
}

#[tokio::test]
async fn reload_swaps_routes_atomically() {
    let v2 = Arc::new(AtomicBool::new(false));
    let plugin: Arc<dyn Plugin> = Arc::new(Versioned { v2: Arc::clone(&v2) });
    let app = TestApp::with_plugins(vec![plugin]);

    let (_, body) = app.get("/custom/v1", None).await;
    assert_eq!(body, json!(1));

    v2.store(true, Ordering::SeqCst);
    let (status, body) = app
        .post("/plugins/versioned/reload", Some(FULL_KEY), json!({}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["routes"], 1);

    let (status, _) = app.get("/custom/v1", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = app.get("/custom/old", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (_, body) = app.get("/custom/v2", None).await;
    assert_eq!(body, json!(2));
}

#[tokio::test]
async fn in_flight_request_completes_after_disable() {
    let entered = Arc::new(Notify::new());
    let release = Arc::new(Notify::new());
    let (entered_h, release_h) = (Arc::clone(&entered), Arc::clone(&release));

    let plugin = TestPlugin::new("slow").endpoint(Endpoint::get("/slow").handle(move |_req| {
        let (entered, release) = (Arc::clone(&entered_h), Arc::clone(&release_h));
        async move {
            entered.notify_one();
            release.notified().await;
            Ok(json!("done"))
        }
    }));
    let app = Arc::new(TestApp::with_plugins(vec![plugin.into_arc()]));

    let pending = {
        let app = Arc::clone(&app);
        tokio::spawn(async move { app.get("/custom/slow", None).await })
    };

    entered.notified().await;
    app.state.disable_plugin("slow").unwrap();
    release.notify_one();

    let (status, body) = tokio::time::timeout(Duration::from_secs(5), pending)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!("done"));

    let (status, _) = app.get("/custom/slow", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn concurrent_requests_during_reload_see_a_complete_table() {
    let v2 = Arc::new(AtomicBool::new(false));
    let plugin: Arc<dyn Plugin> = Arc::new(Versioned { v2: Arc::clone(&v2) });
    let app = Arc::new(TestApp::with_plugins(vec![plugin]));

    let readers: Vec<_> = (0..8)
        .map(|_| {
            let app = Arc::clone(&app);
            tokio::spawn(async move {
                for _ in 0..50 {
                    let table = app.state.registry().snapshot();
                    let v1 = table.lookup(HttpMethod::Get, "/custom/v1").is_some();
                    let v2 = table.lookup(HttpMethod::Get, "/custom/v2").is_some();
                    // Exactly one version is ever visible.
                    assert!(v1 ^ v2, "torn table at generation {}", table.generation());
                    tokio::task::yield_now().await;
                }
            })
        })
        .collect();

    for i in 0..20 {
        v2.store(i % 2 == 0, Ordering::SeqCst);
        app.state.reload_plugin("versioned").unwrap();
        tokio::task::yield_now().await;
    }

    for reader in readers {
        reader.await.unwrap();
    }
}
