//! Capability Resolver.

use std::sync::Arc;

use tracing::debug;
use trellis_sdk::{Capability, CredentialSource, RequirementDecl, SessionContext};

use super::credential::{Credential, DEFAULT_USER_ID};
use super::error::AuthError;
use super::identity::IdentityProvider;
use super::token::TokenError;

/// Map a declared requirement onto the canonical capability.
///
/// Runs when a plugin is enabled, so unknown strings fail the enable rather
/// than any later request.
pub fn normalize_requirement(decl: &RequirementDecl) -> Result<Capability, AuthError> {
    Ok(decl.resolve()?)
}

/// Turns a credential plus a route requirement into a session.
#[derive(Clone)]
pub struct CapabilityResolver {
    provider: Arc<dyn IdentityProvider>,
}

impl CapabilityResolver {
    pub fn new(provider: Arc<dyn IdentityProvider>) -> Self {
        Self { provider }
    }

    /// Resolve a session for a route.
    ///
    /// Without a requirement this always yields the anonymous session and
    /// never looks at the credential. With one, a missing or bad credential
    /// is `Unauthenticated` and a good credential without the grant is
    /// `Forbidden`.
    pub async fn resolve(
        &self,
        credential: &Credential,
        requirement: Option<&Capability>,
    ) -> Result<SessionContext, AuthError> {
        let Some(requirement) = requirement else {
            return Ok(SessionContext::anonymous());
        };

        let session = self.authenticate(credential).await?;
        if !session.grants.allows(requirement) {
            debug!(user = %session.user_id, required = %requirement, "capability denied");
            return Err(AuthError::Forbidden(*requirement));
        }
        Ok(session)
    }

    /// Verify the credential without checking any grant.
    ///
    /// A present token is decisive: an invalid token is not rescued by a
    /// valid API key sent alongside it.
    pub async fn authenticate(&self, credential: &Credential) -> Result<SessionContext, AuthError> {
        if let Some(token) = &credential.token {
            let identity = self.provider.verify_token(token).await.map_err(|e| {
                debug!(error = %e, "token rejected");
                match e {
                    TokenError::Expired => AuthError::unauthenticated("token expired"),
                    _ => AuthError::unauthenticated("invalid token"),
                }
            })?;
            return Ok(SessionContext {
                user_id: identity.subject,
                grants: identity.grants,
                source: CredentialSource::Token {
                    token_id: identity.token_id,
                },
            });
        }

        if let Some(key) = &credential.api_key {
            let Some(identity) = self.provider.verify_api_key(key).await else {
                debug!("api key rejected");
                return Err(AuthError::unauthenticated("invalid API key"));
            };
            return Ok(SessionContext {
                user_id: credential
                    .user_id
                    .clone()
                    .unwrap_or_else(|| DEFAULT_USER_ID.to_string()),
                grants: identity.grants,
                source: CredentialSource::ApiKey {
                    key_name: identity.key_name,
                },
            });
        }

        Err(AuthError::unauthenticated("no credentials supplied"))
    }
}
