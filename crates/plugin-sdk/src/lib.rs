//! Trellis Plugin SDK
//!
//! Types plugins compile against to contribute HTTP endpoints to a running
//! Trellis kernel: the [`Endpoint`] declaration builder, capability
//! requirements, payload schemas, and the handler trait.

pub mod capability;
pub mod endpoint;
pub mod handler;
pub mod plugin;
pub mod schema;

pub use capability::{AuthPermission, AuthResource, Capability, Grants, InvalidRequirement};
pub use endpoint::{DEFAULT_PREFIX, DEFAULT_TAG, Endpoint, HttpMethod, RequirementDecl};
pub use handler::{
    ANONYMOUS_USER, CredentialSource, EndpointHandler, EndpointRequest, FnHandler,
    HandlerFailure, SessionContext, handler_fn,
};
pub use plugin::Plugin;
pub use schema::{Field, ObjectSchema, Schema};

// Re-export serde_json so plugins build payloads against the same version.
#[doc(hidden)]
pub use serde_json;

pub mod prelude {
    pub use crate::capability::*;
    pub use crate::endpoint::*;
    pub use crate::handler::*;
    pub use crate::plugin::Plugin;
    pub use crate::schema::*;
    pub use serde_json::{Value, json};
}
