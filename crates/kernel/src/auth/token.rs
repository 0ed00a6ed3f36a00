//! Signed bearer tokens.
//!
//! HS256 JWTs carrying the principal and its grants, so a token is
//! self-contained: verification needs only the shared secret.

use chrono::Utc;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use trellis_sdk::Grants;
use uuid::Uuid;

/// JWT issuer claim value.
pub const ISSUER: &str = "trellis";

/// JWT claims.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    pub iss: String,
    /// Principal name.
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
    /// Unique per token.
    pub jti: String,
    #[serde(default)]
    pub grants: Grants,
}

/// Response body for token issuance.
#[derive(Debug, Clone, Serialize)]
pub struct IssuedToken {
    pub access_token: String,
    pub token_type: &'static str,
    /// Lifetime in seconds.
    pub expires_in: i64,
}

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("token expired")]
    Expired,

    #[error("invalid token: {0}")]
    Invalid(String),

    #[error("failed to sign token: {0}")]
    Signing(String),
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(e: jsonwebtoken::errors::Error) -> Self {
        match e.kind() {
            ErrorKind::ExpiredSignature => TokenError::Expired,
            _ => TokenError::Invalid(e.to_string()),
        }
    }
}

/// Issues and verifies tokens with one shared secret.
#[derive(Clone)]
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    lifetime_secs: i64,
}

impl TokenCodec {
    pub fn new(secret: &[u8], lifetime_minutes: i64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            lifetime_secs: lifetime_minutes * 60,
        }
    }

    pub fn issue(&self, subject: &str, grants: Grants) -> Result<IssuedToken, TokenError> {
        self.issue_with_lifetime(subject, grants, self.lifetime_secs)
    }

    pub fn issue_with_lifetime(
        &self,
        subject: &str,
        grants: Grants,
        lifetime_secs: i64,
    ) -> Result<IssuedToken, TokenError> {
        let now = Utc::now().timestamp();
        let claims = TokenClaims {
            iss: ISSUER.to_string(),
            sub: subject.to_string(),
            iat: now,
            exp: now + lifetime_secs,
            jti: Uuid::now_v7().to_string(),
            grants,
        };

        let access_token =
            jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
                .map_err(|e| TokenError::Signing(e.to_string()))?;

        Ok(IssuedToken {
            access_token,
            token_type: "Bearer",
            expires_in: lifetime_secs,
        })
    }

    /// Check signature, issuer and expiry, returning the claims.
    pub fn verify(&self, token: &str) -> Result<TokenClaims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[ISSUER]);
        validation.validate_aud = false;
        validation.leeway = 0;

        let data = jsonwebtoken::decode::<TokenClaims>(token, &self.decoding_key, &validation)?;
        Ok(data.claims)
    }
}
