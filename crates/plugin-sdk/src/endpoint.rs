//! Endpoint declarations.
//!
//! A plugin describes each route it contributes with the [`Endpoint`]
//! builder and returns the list from [`crate::Plugin::endpoints`]. The kernel
//! validates and normalizes the declarations when the plugin is enabled.
//!
//! ```ignore
//! Endpoint::post("/topic-joke")
//!     .tag("Jokes")
//!     .requires(AuthResource::Conversation, AuthPermission::Write)
//!     .input(Schema::object().field("topic", Schema::String).build())
//!     .handle(|req| async move { Ok(json!({"joke": "..."})) })
//! ```

use std::fmt;
use std::future::Future;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::capability::{AuthPermission, AuthResource, Capability, InvalidRequirement};
use crate::handler::{EndpointHandler, EndpointRequest, HandlerFailure, handler_fn};
use crate::schema::Schema;

/// Mount point used when a declaration names no prefix.
pub const DEFAULT_PREFIX: &str = "/custom";

/// Documentation group used when a declaration names no tag.
pub const DEFAULT_TAG: &str = "Custom Endpoints";

/// HTTP verbs a plugin route may answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
        }
    }

    /// Whether the payload conventionally travels in the request body.
    pub fn has_body(&self) -> bool {
        matches!(self, HttpMethod::Post | HttpMethod::Put)
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HttpMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(HttpMethod::Get),
            "POST" => Ok(HttpMethod::Post),
            "PUT" => Ok(HttpMethod::Put),
            "DELETE" => Ok(HttpMethod::Delete),
            other => Err(format!("unsupported method '{other}'")),
        }
    }
}

/// A capability requirement as written by the plugin author.
///
/// Either already typed, or as raw strings that the kernel maps onto the
/// canonical enumerations when the plugin is enabled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequirementDecl {
    Typed(Capability),
    Named { resource: String, permission: String },
}

impl RequirementDecl {
    /// Normalize to the canonical pair.
    pub fn resolve(&self) -> Result<Capability, InvalidRequirement> {
        match self {
            RequirementDecl::Typed(capability) => Ok(*capability),
            RequirementDecl::Named {
                resource,
                permission,
            } => Capability::parse(resource, permission),
        }
    }
}

/// Declaration of one route.
#[derive(Clone)]
pub struct Endpoint {
    pub method: HttpMethod,
    /// Path relative to `prefix`, e.g. `/joke` or `/items/{id}`.
    pub path: String,
    pub prefix: String,
    pub tag: String,
    pub summary: Option<String>,
    pub requirement: Option<RequirementDecl>,
    pub input_schema: Option<Schema>,
    pub output_schema: Option<Schema>,
    pub handler: Option<Arc<dyn EndpointHandler>>,
}

impl Endpoint {
    pub fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            prefix: DEFAULT_PREFIX.to_string(),
            tag: DEFAULT_TAG.to_string(),
            summary: None,
            requirement: None,
            input_schema: None,
            output_schema: None,
            handler: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Post, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Put, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Delete, path)
    }

    /// Mount under a different prefix. `""` or `"/"` mounts at the root.
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = tag.into();
        self
    }

    pub fn summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }

    /// Gate the route behind a typed capability.
    pub fn requires(mut self, resource: AuthResource, permission: AuthPermission) -> Self {
        self.requirement = Some(RequirementDecl::Typed(Capability::new(
            resource, permission,
        )));
        self
    }

    /// Gate the route behind a capability given as strings.
    pub fn requires_named(
        mut self,
        resource: impl Into<String>,
        permission: impl Into<String>,
    ) -> Self {
        self.requirement = Some(RequirementDecl::Named {
            resource: resource.into(),
            permission: permission.into(),
        });
        self
    }

    pub fn input(mut self, schema: impl Into<Schema>) -> Self {
        self.input_schema = Some(schema.into());
        self
    }

    pub fn output(mut self, schema: impl Into<Schema>) -> Self {
        self.output_schema = Some(schema.into());
        self
    }

    pub fn handler(mut self, handler: impl EndpointHandler + 'static) -> Self {
        self.handler = Some(Arc::new(handler));
        self
    }

    /// Attach an async closure as the handler.
    pub fn handle<F, Fut>(self, f: F) -> Self
    where
        F: Fn(EndpointRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, HandlerFailure>> + Send + 'static,
    {
        self.handler(handler_fn(f))
    }
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Endpoint")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("prefix", &self.prefix)
            .field("tag", &self.tag)
            .field("requirement", &self.requirement)
            .field("has_handler", &self.handler.is_some())
            .finish_non_exhaustive()
    }
}
