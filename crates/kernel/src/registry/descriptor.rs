//! Normalized endpoint descriptors.
//!
//! An [`EndpointDescriptor`] is what a plugin's [`Endpoint`] declaration
//! becomes once the kernel has accepted it: paths joined and normalized,
//! the capability requirement mapped to the canonical enum, the handler
//! present. Nothing stringly-typed survives past this point.

use std::fmt;
use std::sync::Arc;

use trellis_sdk::{Capability, Endpoint, EndpointHandler, HttpMethod, Schema};

use super::error::RegistryError;
use super::path::{self, PathTemplate};
use crate::auth::normalize_requirement;

/// Owner name used for routes the kernel itself serves.
pub const CORE_OWNER: &str = "core";

/// Uniqueness key: method plus the path shape (parameter names erased).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RouteKey {
    pub method: HttpMethod,
    pub shape: String,
}

impl fmt::Display for RouteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.shape)
    }
}

/// One accepted route.
#[derive(Clone)]
pub struct EndpointDescriptor {
    pub method: HttpMethod,
    /// Path relative to the prefix, normalized.
    pub raw_path: String,
    /// Mount point, normalized; `/` means the root.
    pub prefix: String,
    /// `prefix + raw_path`.
    pub full_path: String,
    pub tag: String,
    pub summary: Option<String>,
    /// Id of the plugin that contributed the route.
    pub owner: String,
    pub requirement: Option<Capability>,
    pub input_schema: Option<Arc<Schema>>,
    pub output_schema: Option<Arc<Schema>>,
    pub handler: Arc<dyn EndpointHandler>,
    template: PathTemplate,
}

impl EndpointDescriptor {
    /// Validate and normalize a plugin declaration.
    pub fn from_declaration(owner: &str, decl: Endpoint) -> Result<Self, RegistryError> {
        let invalid_path = |path: &str, reason: String| RegistryError::InvalidPath {
            owner: owner.to_string(),
            path: path.to_string(),
            reason,
        };

        let prefix = path::normalize(&decl.prefix).map_err(|r| invalid_path(&decl.prefix, r))?;
        let raw_path = path::normalize(&decl.path).map_err(|r| invalid_path(&decl.path, r))?;
        let full_path = path::join(&prefix, &raw_path)
            .map_err(|r| invalid_path(&format!("{}{}", decl.prefix, decl.path), r))?;
        let template = PathTemplate::parse(&full_path).map_err(|r| invalid_path(&full_path, r))?;

        let requirement = decl
            .requirement
            .as_ref()
            .map(normalize_requirement)
            .transpose()
            .map_err(|source| RegistryError::InvalidRequirement {
                owner: owner.to_string(),
                method: decl.method,
                path: full_path.clone(),
                source,
            })?;

        let Some(handler) = decl.handler else {
            return Err(RegistryError::MissingHandler {
                owner: owner.to_string(),
                method: decl.method,
                path: full_path,
            });
        };

        Ok(Self {
            method: decl.method,
            raw_path,
            prefix,
            full_path,
            tag: decl.tag,
            summary: decl.summary,
            owner: owner.to_string(),
            requirement,
            input_schema: decl.input_schema.map(Arc::new),
            output_schema: decl.output_schema.map(Arc::new),
            handler,
            template,
        })
    }

    pub fn key(&self) -> RouteKey {
        RouteKey {
            method: self.method,
            shape: self.template.shape(),
        }
    }

    pub fn template(&self) -> &PathTemplate {
        &self.template
    }

    pub fn is_public(&self) -> bool {
        self.requirement.is_none()
    }
}

impl fmt::Debug for EndpointDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EndpointDescriptor")
            .field("method", &self.method)
            .field("full_path", &self.full_path)
            .field("tag", &self.tag)
            .field("owner", &self.owner)
            .field("requirement", &self.requirement)
            .field("input_schema", &self.input_schema.is_some())
            .field("output_schema", &self.output_schema.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;
    use trellis_sdk::{AuthPermission, AuthResource, DEFAULT_PREFIX};

    fn ok_handler(ep: Endpoint) -> Endpoint {
        ep.handle(|_req| async { Ok(json!({})) })
    }

    #[test]
    fn defaults_produce_custom_mount() {
        let d = EndpointDescriptor::from_declaration("jokes", ok_handler(Endpoint::get("joke")))
            .unwrap();
        assert_eq!(d.prefix, DEFAULT_PREFIX);
        assert_eq!(d.raw_path, "/joke");
        assert_eq!(d.full_path, "/custom/joke");
        assert_eq!(d.owner, "jokes");
        assert!(d.is_public());
        assert_eq!(d.key().to_string(), "GET /custom/joke");
    }

    #[test]
    fn named_requirement_is_normalized() {
        let d = EndpointDescriptor::from_declaration(
            "jokes",
            ok_handler(Endpoint::get("/joke").requires_named("conversation", "write")),
        )
        .unwrap();
        assert_eq!(
            d.requirement,
            Some(Capability::new(
                AuthResource::Conversation,
                AuthPermission::Write
            ))
        );
    }

    #[test]
    fn unknown_requirement_fails_declaration() {
        let err = EndpointDescriptor::from_declaration(
            "jokes",
            ok_handler(Endpoint::get("/joke").requires_named("CHEESE", "WRITE")),
        )
        .unwrap_err();
        assert!(matches!(err, RegistryError::InvalidRequirement { .. }));
        assert!(err.to_string().contains("CHEESE"));
    }

    #[test]
    fn missing_handler_fails_declaration() {
        let err = EndpointDescriptor::from_declaration("jokes", Endpoint::get("/joke")).unwrap_err();
        assert!(matches!(err, RegistryError::MissingHandler { .. }));
    }

    #[test]
    fn bad_path_fails_declaration() {
        let err = EndpointDescriptor::from_declaration("jokes", ok_handler(Endpoint::get("/a//b")))
            .unwrap_err();
        assert!(matches!(err, RegistryError::InvalidPath { .. }));
    }

    #[test]
    fn root_prefix_mounts_at_top_level() {
        let d = EndpointDescriptor::from_declaration(
            "jokes",
            ok_handler(Endpoint::get("/items/{id}").prefix("")),
        )
        .unwrap();
        assert_eq!(d.full_path, "/items/{id}");
        assert_eq!(d.key().shape, "/items/{}");
        assert!(!d.template().is_static());
    }
}
