//! Handler-side types: what an endpoint receives and how it reports failure.

use std::collections::HashMap;
use std::future::Future;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

use crate::capability::{AuthPermission, AuthResource, Capability, Grants};

/// Principal name used for sessions created without credentials.
pub const ANONYMOUS_USER: &str = "anonymous";

/// How a session was authenticated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CredentialSource {
    Anonymous,
    ApiKey { key_name: String },
    Token { token_id: String },
}

/// The authenticated identity and grants for a single request.
///
/// Built by the kernel after authorization succeeds and handed to the
/// handler as an ordinary argument. Never stored beyond the request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionContext {
    pub user_id: String,
    pub grants: Grants,
    pub source: CredentialSource,
}

impl SessionContext {
    pub fn anonymous() -> Self {
        Self {
            user_id: ANONYMOUS_USER.to_string(),
            grants: Grants::none(),
            source: CredentialSource::Anonymous,
        }
    }

    pub fn is_anonymous(&self) -> bool {
        self.source == CredentialSource::Anonymous
    }

    /// Check an additional capability from inside a handler.
    pub fn can(&self, resource: AuthResource, permission: AuthPermission) -> bool {
        self.grants
            .allows(&Capability::new(resource, permission))
    }
}

/// Everything a handler is invoked with.
#[derive(Debug, Clone, Default)]
pub struct EndpointRequest {
    /// Present only when the route declares a capability requirement.
    pub session: Option<SessionContext>,
    /// The request payload. Already validated when the route declares an
    /// input schema.
    pub input: Option<Value>,
    /// Values captured by `{name}` path segments.
    pub path_params: HashMap<String, String>,
    pub query: HashMap<String, String>,
}

impl EndpointRequest {
    /// Deserialize the input payload into a typed value.
    pub fn input_as<T: DeserializeOwned>(&self) -> Result<T, HandlerFailure> {
        let input = self.input.clone().unwrap_or(Value::Null);
        serde_json::from_value(input).map_err(HandlerFailure::from)
    }

    pub fn path_param(&self, name: &str) -> Option<&str> {
        self.path_params.get(name).map(String::as_str)
    }

    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query.get(name).map(String::as_str)
    }

    /// The session's principal, if a session was resolved.
    pub fn user_id(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.user_id.as_str())
    }
}

/// A failure raised by handler code.
///
/// The message is logged server-side; callers only ever see a generic
/// internal-error response.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct HandlerFailure {
    message: String,
}

impl HandlerFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<serde_json::Error> for HandlerFailure {
    fn from(e: serde_json::Error) -> Self {
        Self::new(format!("payload conversion failed: {e}"))
    }
}

/// An endpoint implementation.
#[async_trait]
pub trait EndpointHandler: Send + Sync {
    async fn handle(&self, request: EndpointRequest) -> Result<Value, HandlerFailure>;
}

/// Adapter turning an async closure into an [`EndpointHandler`].
pub struct FnHandler<F>(F);

/// Wrap an async function or closure as a handler.
pub fn handler_fn<F, Fut>(f: F) -> FnHandler<F>
where
    F: Fn(EndpointRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, HandlerFailure>> + Send + 'static,
{
    FnHandler(f)
}

#[async_trait]
impl<F, Fut> EndpointHandler for FnHandler<F>
where
    F: Fn(EndpointRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, HandlerFailure>> + Send + 'static,
{
    async fn handle(&self, request: EndpointRequest) -> Result<Value, HandlerFailure> {
        (self.0)(request).await
    }
}
