//! Request-time and declaration-time auth errors.

use thiserror::Error;
use trellis_sdk::{Capability, InvalidRequirement};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// No credential, or a credential that failed verification.
    #[error("not authenticated: {0}")]
    Unauthenticated(String),

    /// A valid credential without the required grant.
    #[error("missing capability {0}")]
    Forbidden(Capability),

    /// A declared requirement naming an unknown resource or permission.
    #[error("invalid capability requirement: {0}")]
    InvalidRequirement(#[from] InvalidRequirement),
}

impl AuthError {
    pub fn unauthenticated(reason: impl Into<String>) -> Self {
        Self::Unauthenticated(reason.into())
    }
}
