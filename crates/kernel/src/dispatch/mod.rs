//! The Dispatcher.
//!
//! Per request: `MATCH -> AUTH -> VALIDATE_INPUT -> INVOKE -> VALIDATE_OUTPUT
//! -> RESPOND`, exiting early with a [`DispatchError`] at any step. The
//! request runs to completion against the dispatch table snapshot taken at
//! `MATCH`, even if a plugin is disabled meanwhile.

mod error;
pub mod http;
mod input;

pub use error::DispatchError;
pub use input::extract_input;

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use axum::body::Bytes;
use futures::FutureExt;
use serde_json::Value;
use tracing::debug;
use trellis_sdk::{EndpointRequest, HttpMethod};

use crate::auth::{CapabilityResolver, Credential};
use crate::metrics::Metrics;
use crate::plugin::panic_message;
use crate::registry::{EndpointDescriptor, EndpointRegistry};
use crate::validation::validate;

/// An inbound request, reduced to what dispatch needs.
#[derive(Debug, Clone)]
pub struct DispatchRequest {
    pub method: HttpMethod,
    pub path: String,
    pub query: HashMap<String, String>,
    pub credential: Credential,
    pub body: Bytes,
}

impl DispatchRequest {
    pub fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: HashMap::new(),
            credential: Credential::default(),
            body: Bytes::new(),
        }
    }

    pub fn with_credential(mut self, credential: Credential) -> Self {
        self.credential = credential;
        self
    }

    pub fn with_json(mut self, body: &Value) -> Self {
        self.body = Bytes::from(body.to_string());
        self
    }
}

#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<EndpointRegistry>,
    resolver: CapabilityResolver,
    metrics: Arc<Metrics>,
}

impl Dispatcher {
    pub fn new(
        registry: Arc<EndpointRegistry>,
        resolver: CapabilityResolver,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            registry,
            resolver,
            metrics,
        }
    }

    /// Run one request through the state machine.
    pub async fn dispatch(&self, request: DispatchRequest) -> Result<Value, DispatchError> {
        let table = self.registry.snapshot();

        // MATCH
        let Some(matched) = table.lookup(request.method, &request.path) else {
            self.metrics.record_dispatch("", "not_found");
            return Err(DispatchError::NotFound {
                method: request.method,
                path: request.path,
            });
        };
        let descriptor = matched.descriptor;
        let owner = descriptor.owner.as_str();

        let result = self.run(&descriptor, matched.params, request).await;

        // RESPOND
        match &result {
            Ok(_) => self.metrics.record_dispatch(owner, "ok"),
            Err(e) => {
                debug!(plugin = %owner, route = %descriptor.full_path, outcome = e.outcome(), "dispatch failed");
                self.metrics.record_dispatch(owner, e.outcome());
            }
        }
        result
    }

    async fn run(
        &self,
        descriptor: &EndpointDescriptor,
        path_params: HashMap<String, String>,
        request: DispatchRequest,
    ) -> Result<Value, DispatchError> {
        let route = route_label(&descriptor.full_path, descriptor.method);

        // AUTH
        let session = match &descriptor.requirement {
            Some(requirement) => Some(
                self.resolver
                    .resolve(&request.credential, Some(requirement))
                    .await?,
            ),
            None => None,
        };

        // VALIDATE_INPUT
        let input = extract_input(
            request.method,
            descriptor.input_schema.as_deref(),
            &request.body,
            &request.query,
        )?;

        // INVOKE
        let call = EndpointRequest {
            session,
            input,
            path_params,
            query: request.query,
        };
        let started = Instant::now();
        let outcome = AssertUnwindSafe(descriptor.handler.handle(call))
            .catch_unwind()
            .await;
        self.metrics.record_handler(
            &descriptor.owner,
            descriptor.method.as_str(),
            &descriptor.full_path,
            started.elapsed().as_secs_f64(),
        );

        let value = match outcome {
            Ok(Ok(value)) => value,
            Ok(Err(failure)) => return Err(DispatchError::handler(route, failure.message())),
            Err(payload) => {
                return Err(DispatchError::handler(
                    route,
                    format!("handler panicked: {}", panic_message(payload.as_ref())),
                ));
            }
        };

        // VALIDATE_OUTPUT
        if let Some(schema) = &descriptor.output_schema {
            validate(schema, &value).map_err(|e| {
                DispatchError::handler(
                    route,
                    format!("response failed output schema: {}", e.summary()),
                )
            })?;
        }

        Ok(value)
    }
}

fn route_label(path: &str, method: HttpMethod) -> String {
    format!("{method} {path}")
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::auth::StaticIdentityProvider;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use trellis_sdk::{AuthPermission, AuthResource, Endpoint, Grants, HandlerFailure, Schema};

    fn dispatcher(endpoints: Vec<Endpoint>) -> Dispatcher {
        let registry = Arc::new(EndpointRegistry::new(Vec::new()));
        registry.register_plugin("test", endpoints).unwrap();
        let provider = StaticIdentityProvider::new(None)
            .with_key("full", "k-full", Grants::full())
            .with_key("none", "k-none", Grants::none());
        Dispatcher::new(
            registry,
            CapabilityResolver::new(Arc::new(provider)),
            Arc::new(Metrics::new()),
        )
    }

    #[tokio::test]
    async fn unknown_route_is_not_found() {
        let d = dispatcher(vec![]);
        let err = d
            .dispatch(DispatchRequest::new(HttpMethod::Get, "/custom/none"))
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::NotFound { .. }));
    }

    #[tokio::test]
    async fn denied_request_never_invokes_handler() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let d = dispatcher(vec![
            Endpoint::get("/joke")
                .requires(AuthResource::Conversation, AuthPermission::Write)
                .handle(move |_req| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    async { Ok(json!({"joke": "ha"})) }
                }),
        ]);

        let err = d
            .dispatch(DispatchRequest::new(HttpMethod::Get, "/custom/joke"))
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::Unauthenticated(_)));

        let err = d
            .dispatch(
                DispatchRequest::new(HttpMethod::Get, "/custom/joke")
                    .with_credential(Credential::api_key("k-none")),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::Forbidden(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        let ok = d
            .dispatch(
                DispatchRequest::new(HttpMethod::Get, "/custom/joke")
                    .with_credential(Credential::api_key("k-full")),
            )
            .await
            .unwrap();
        assert_eq!(ok, json!({"joke": "ha"}));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn public_route_gets_no_session() {
        let d = dispatcher(vec![Endpoint::get("/open").handle(|req| async move {
            Ok(json!({"has_session": req.session.is_some()}))
        })]);
        let value = d
            .dispatch(
                DispatchRequest::new(HttpMethod::Get, "/custom/open")
                    .with_credential(Credential::api_key("garbage")),
            )
            .await
            .unwrap();
        assert_eq!(value, json!({"has_session": false}));
    }

    #[tokio::test]
    async fn handler_failures_and_panics_become_handler_errors() {
        let d = dispatcher(vec![
            Endpoint::get("/fail").handle(|_req| async { Err(HandlerFailure::new("boom")) }),
            Endpoint::get("/panic").handle(|_req| async {
                if true {
                    panic!("kaboom");
                }
                Ok(json!(null))
            }),
        ]);

        let err = d
            .dispatch(DispatchRequest::new(HttpMethod::Get, "/custom/fail"))
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::Handler { ref detail, .. } if detail == "boom"));

        let err = d
            .dispatch(DispatchRequest::new(HttpMethod::Get, "/custom/panic"))
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::Handler { ref detail, .. } if detail.contains("kaboom")));
    }

    #[tokio::test]
    async fn bad_output_is_a_handler_error() {
        let d = dispatcher(vec![
            Endpoint::get("/shape")
                .output(Schema::object().field("joke", Schema::String).build())
                .handle(|_req| async { Ok(json!({"joke": 42})) }),
        ]);
        let err = d
            .dispatch(DispatchRequest::new(HttpMethod::Get, "/custom/shape"))
            .await
            .unwrap_err();
        assert_eq!(err.outcome(), "handler_error");
    }

    #[tokio::test]
    async fn path_params_reach_the_handler() {
        let d = dispatcher(vec![Endpoint::delete("/items/{id}").handle(|req| async move {
            Ok(json!({"deleted": req.path_param("id")}))
        })]);
        let value = d
            .dispatch(DispatchRequest::new(HttpMethod::Delete, "/custom/items/9"))
            .await
            .unwrap();
        assert_eq!(value, json!({"deleted": "9"}));
    }
}
