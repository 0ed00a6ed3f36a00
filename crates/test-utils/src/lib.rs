//! Trellis test utilities.
//!
//! Fixtures for exercising the kernel: ad-hoc plugins built from endpoint
//! declarations, grant builders, bearer token minting, and JSON assertions.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use trellis_sdk::prelude::*;

/// Shared HMAC secret for tokens minted in tests.
pub const TEST_JWT_SECRET: &str = "trellis-test-secret-trellis-test-secret";

/// Key holding every capability.
pub const FULL_KEY: &str = "test-key-full";

/// Key holding `CONVERSATION:WRITE` only.
pub const WRITER_KEY: &str = "test-key-writer";

/// Valid key holding nothing.
pub const EMPTY_KEY: &str = "test-key-empty";

/// A plugin assembled from explicit endpoint declarations.
///
/// Counts how often the host asked for declarations, so tests can observe
/// enable and reload.
#[derive(Clone)]
pub struct TestPlugin {
    id: String,
    endpoints: Vec<Endpoint>,
    default_enabled: bool,
    panic_on_declare: bool,
    declarations: Arc<AtomicUsize>,
}

impl TestPlugin {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            endpoints: Vec::new(),
            default_enabled: true,
            panic_on_declare: false,
            declarations: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn endpoint(mut self, endpoint: Endpoint) -> Self {
        self.endpoints.push(endpoint);
        self
    }

    /// Left disabled by the host at startup.
    pub fn disabled_by_default(mut self) -> Self {
        self.default_enabled = false;
        self
    }

    /// `endpoints()` panics instead of returning declarations.
    pub fn panicking(mut self) -> Self {
        self.panic_on_declare = true;
        self
    }

    pub fn declaration_count(&self) -> usize {
        self.declarations.load(Ordering::SeqCst)
    }

    pub fn into_arc(self) -> Arc<dyn Plugin> {
        Arc::new(self)
    }
}

impl Plugin for TestPlugin {
    fn id(&self) -> &str {
        &self.id
    }

    fn version(&self) -> &str {
        "0.0.1-test"
    }

    fn default_enabled(&self) -> bool {
        self.default_enabled
    }

    fn endpoints(&self) -> Vec<Endpoint> {
        self.declarations.fetch_add(1, Ordering::SeqCst);
        if self.panic_on_declare {
            panic!("test plugin '{}' refused to declare", self.id);
        }
        self.endpoints.clone()
    }
}

/// An endpoint whose handler echoes everything it was invoked with.
///
/// Response: `{"input", "user_id", "path_params", "query"}`.
pub fn echo(endpoint: Endpoint) -> Endpoint {
    endpoint.handle(|req| async move {
        let user_id = req.user_id().map(str::to_string);
        Ok(json!({
            "input": req.input,
            "user_id": user_id,
            "path_params": req.path_params,
            "query": req.query,
        }))
    })
}

/// An endpoint returning a fixed value.
pub fn fixed(endpoint: Endpoint, value: Value) -> Endpoint {
    endpoint.handle(move |_req| {
        let value = value.clone();
        async move { Ok(value) }
    })
}

/// Grant builders.
pub mod grants {
    use trellis_sdk::{AuthPermission, AuthResource, Grants};

    pub fn of(pairs: &[(AuthResource, AuthPermission)]) -> Grants {
        pairs
            .iter()
            .fold(Grants::none(), |g, (resource, permission)| {
                g.with(*resource, *permission)
            })
    }

    pub fn conversation_write() -> Grants {
        of(&[(AuthResource::Conversation, AuthPermission::Write)])
    }

    pub fn plugin_admin() -> Grants {
        of(&[
            (AuthResource::Plugins, AuthPermission::List),
            (AuthResource::Plugins, AuthPermission::Edit),
        ])
    }
}

/// Bearer tokens in the kernel's wire format: HS256, issuer `trellis`.
pub mod tokens {
    use chrono::Utc;
    use jsonwebtoken::{EncodingKey, Header};
    use serde_json::json;
    use trellis_sdk::Grants;
    use uuid::Uuid;

    use super::TEST_JWT_SECRET;

    /// Sign arbitrary claims with `secret`.
    pub fn sign(secret: &str, claims: &serde_json::Value) -> String {
        jsonwebtoken::encode(
            &Header::default(),
            claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap_or_default()
    }

    /// Token valid for `lifetime_secs` from now (negative for already expired).
    pub fn mint_with(secret: &str, subject: &str, grants: &Grants, lifetime_secs: i64) -> String {
        let now = Utc::now().timestamp();
        sign(
            secret,
            &json!({
                "iss": "trellis",
                "sub": subject,
                "iat": now,
                "exp": now + lifetime_secs,
                "jti": Uuid::now_v7().to_string(),
                "grants": grants,
            }),
        )
    }

    /// One-hour token signed with [`TEST_JWT_SECRET`].
    pub fn mint(subject: &str, grants: &Grants) -> String {
        mint_with(TEST_JWT_SECRET, subject, grants, 3600)
    }

    /// Token that expired a minute ago.
    pub fn expired(subject: &str, grants: &Grants) -> String {
        mint_with(TEST_JWT_SECRET, subject, grants, -60)
    }
}

/// Assertion helpers for JSON responses.
pub mod assert {
    use serde_json::Value;

    /// Assert that a JSON value has a specific key.
    pub fn has_key(value: &Value, key: &str) {
        assert!(
            value.get(key).is_some(),
            "Expected JSON to have key '{key}', got: {value}"
        );
    }

    /// Assert that a 422 body reports an error at `loc`.
    pub fn validation_error_at(body: &Value, loc: &[&str]) {
        let errors = body["detail"].as_array().cloned().unwrap_or_default();
        let found = errors.iter().any(|e| {
            e["loc"]
                .as_array()
                .is_some_and(|l| l.iter().map(|v| v.as_str().unwrap_or("")).eq(loc.iter().copied()))
        });
        assert!(found, "Expected validation error at {loc:?}, got: {body}");
    }

    /// Assert that a string contains a substring.
    pub fn contains(haystack: &str, needle: &str) {
        assert!(
            haystack.contains(needle),
            "Expected string to contain '{needle}'\nActual: {haystack}"
        );
    }
}
