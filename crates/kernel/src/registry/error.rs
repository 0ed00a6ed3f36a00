//! Declaration-time errors.
//!
//! Every variant names the plugin and route involved so a failed enable can
//! be traced back to the offending declaration.

use thiserror::Error;
use trellis_sdk::HttpMethod;

use crate::auth::AuthError;

/// Errors raised while registering endpoint declarations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// Another owner already holds this (method, path).
    #[error(
        "route {method} {path} declared by '{owner}' conflicts with the route registered by '{existing_owner}'"
    )]
    Conflict {
        method: HttpMethod,
        path: String,
        owner: String,
        existing_owner: String,
    },

    /// The capability requirement does not name a known resource/permission.
    #[error("plugin '{owner}': route {method} {path}: {source}")]
    InvalidRequirement {
        owner: String,
        method: HttpMethod,
        path: String,
        #[source]
        source: AuthError,
    },

    /// Prefix or path could not be normalized.
    #[error("plugin '{owner}': invalid path '{path}': {reason}")]
    InvalidPath {
        owner: String,
        path: String,
        reason: String,
    },

    /// The declaration has no handler attached.
    #[error("plugin '{owner}': route {method} {path} has no handler")]
    MissingHandler {
        owner: String,
        method: HttpMethod,
        path: String,
    },
}

impl RegistryError {
    pub fn conflict(
        method: HttpMethod,
        path: impl Into<String>,
        owner: impl Into<String>,
        existing_owner: impl Into<String>,
    ) -> Self {
        Self::Conflict {
            method,
            path: path.into(),
            owner: owner.into(),
            existing_owner: existing_owner.into(),
        }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}
