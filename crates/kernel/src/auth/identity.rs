//! Credential verification.
//!
//! The resolver only knows the [`IdentityProvider`] contract; where keys,
//! users and signing secrets come from is up to the implementation.

use std::collections::HashMap;

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use trellis_sdk::Grants;

use super::password::verify_password;
use super::token::{TokenCodec, TokenError};

/// A verified API key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyIdentity {
    pub key_name: String,
    pub grants: Grants,
}

/// A verified bearer token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenIdentity {
    pub subject: String,
    pub token_id: String,
    pub grants: Grants,
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// `None` when the key is unknown.
    async fn verify_api_key(&self, key: &str) -> Option<KeyIdentity>;

    async fn verify_token(&self, token: &str) -> Result<TokenIdentity, TokenError>;
}

struct StoredKey {
    name: String,
    digest: [u8; 32],
    grants: Grants,
}

struct StoredUser {
    password_hash: String,
    grants: Grants,
}

/// Identity provider backed by configuration: keys and users held in memory.
///
/// Keys are stored as SHA-256 digests and compared in constant time.
#[derive(Default)]
pub struct StaticIdentityProvider {
    keys: Vec<StoredKey>,
    users: HashMap<String, StoredUser>,
    codec: Option<TokenCodec>,
}

impl StaticIdentityProvider {
    pub fn new(codec: Option<TokenCodec>) -> Self {
        Self {
            codec,
            ..Self::default()
        }
    }

    /// Register a plaintext key.
    pub fn with_key(mut self, name: impl Into<String>, key: &str, grants: Grants) -> Self {
        self.keys.push(StoredKey {
            name: name.into(),
            digest: digest(key),
            grants,
        });
        self
    }

    /// Register a key by its hex-encoded SHA-256 digest.
    pub fn with_key_digest(
        mut self,
        name: impl Into<String>,
        sha256_hex: &str,
        grants: Grants,
    ) -> anyhow::Result<Self> {
        let name = name.into();
        let bytes = hex::decode(sha256_hex.trim())
            .map_err(|e| anyhow::anyhow!("key '{name}': invalid sha256 hex: {e}"))?;
        let digest: [u8; 32] = bytes
            .try_into()
            .map_err(|_| anyhow::anyhow!("key '{name}': sha256 digest must be 32 bytes"))?;
        self.keys.push(StoredKey {
            name,
            digest,
            grants,
        });
        Ok(self)
    }

    /// Register a user by argon2 password hash.
    pub fn with_user(
        mut self,
        username: impl Into<String>,
        password_hash: impl Into<String>,
        grants: Grants,
    ) -> Self {
        self.users.insert(
            username.into(),
            StoredUser {
                password_hash: password_hash.into(),
                grants,
            },
        );
        self
    }

    /// Check a username and password, returning the user's grants.
    pub fn authenticate_user(&self, username: &str, password: &str) -> Option<Grants> {
        let user = self.users.get(username)?;
        verify_password(password, &user.password_hash).then(|| user.grants.clone())
    }

    pub fn codec(&self) -> Option<&TokenCodec> {
        self.codec.as_ref()
    }

    pub fn key_count(&self) -> usize {
        self.keys.len()
    }
}

/// Hex-encoded SHA-256 of a key, the form stored in auth files.
pub fn key_digest_hex(key: &str) -> String {
    hex::encode(digest(key))
}

fn digest(key: &str) -> [u8; 32] {
    Sha256::digest(key.as_bytes()).into()
}

#[async_trait]
impl IdentityProvider for StaticIdentityProvider {
    async fn verify_api_key(&self, key: &str) -> Option<KeyIdentity> {
        let presented = digest(key);
        self.keys
            .iter()
            .find(|stored| bool::from(stored.digest.as_slice().ct_eq(presented.as_slice())))
            .map(|stored| KeyIdentity {
                key_name: stored.name.clone(),
                grants: stored.grants.clone(),
            })
    }

    async fn verify_token(&self, token: &str) -> Result<TokenIdentity, TokenError> {
        let Some(codec) = &self.codec else {
            return Err(TokenError::Invalid(
                "token authentication is not configured".to_string(),
            ));
        };
        let claims = codec.verify(token)?;
        Ok(TokenIdentity {
            subject: claims.sub,
            token_id: claims.jti,
            grants: claims.grants,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::auth::password::hash_password;
    use trellis_sdk::{AuthPermission, AuthResource};

    fn conversation() -> Grants {
        Grants::none().with(AuthResource::Conversation, AuthPermission::Write)
    }

    #[tokio::test]
    async fn plaintext_and_digest_keys_verify() {
        let provider = StaticIdentityProvider::new(None)
            .with_key("admin", "k-admin", Grants::full())
            .with_key_digest("bot", &key_digest_hex("k-bot"), conversation())
            .unwrap();

        let admin = provider.verify_api_key("k-admin").await.unwrap();
        assert_eq!(admin.key_name, "admin");
        assert_eq!(admin.grants, Grants::full());

        let bot = provider.verify_api_key("k-bot").await.unwrap();
        assert_eq!(bot.grants, conversation());

        assert!(provider.verify_api_key("k-nope").await.is_none());
        assert_eq!(provider.key_count(), 2);
    }

    #[test]
    fn bad_digest_is_rejected() {
        assert!(
            StaticIdentityProvider::new(None)
                .with_key_digest("x", "zz", Grants::none())
                .is_err()
        );
        assert!(
            StaticIdentityProvider::new(None)
                .with_key_digest("x", "abcd", Grants::none())
                .is_err()
        );
    }

    #[test]
    fn users_authenticate_with_password() {
        let hash = hash_password("hunter2").unwrap();
        let provider = StaticIdentityProvider::new(None).with_user("alice", hash, conversation());
        assert_eq!(provider.authenticate_user("alice", "hunter2"), Some(conversation()));
        assert!(provider.authenticate_user("alice", "wrong").is_none());
        assert!(provider.authenticate_user("bob", "hunter2").is_none());
    }

    #[tokio::test]
    async fn tokens_need_a_codec() {
        let without = StaticIdentityProvider::new(None);
        assert!(without.verify_token("a.b.c").await.is_err());

        let codec = TokenCodec::new(b"0123456789abcdef0123456789abcdef", 5);
        let token = codec.issue("alice", conversation()).unwrap().access_token;
        let with = StaticIdentityProvider::new(Some(codec));
        let identity = with.verify_token(&token).await.unwrap();
        assert_eq!(identity.subject, "alice");
        assert_eq!(identity.grants, conversation());
        assert!(!identity.token_id.is_empty());
    }
}
