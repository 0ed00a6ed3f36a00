//! Configuration loaded from environment variables.

use std::env;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use argon2::password_hash::rand_core::{OsRng, RngCore};
use serde::Deserialize;
use tracing::warn;
use trellis_sdk::{Capability, Grants};

use crate::auth::{StaticIdentityProvider, TokenCodec};

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server port (default: 3000).
    pub port: u16,

    /// Static API key granted every capability.
    pub api_key: Option<String>,

    /// HMAC secret for bearer tokens. A random per-process secret is used
    /// when unset, so tokens do not survive a restart.
    pub jwt_secret: Option<String>,

    /// Token lifetime in minutes (default: 1440).
    pub jwt_expire_minutes: i64,

    /// Path of the TOML auth file, if any.
    pub auth_file: Option<PathBuf>,

    /// Keys and users loaded from `auth_file`.
    pub auth: AuthFile,

    /// CORS allowed origins (comma-separated, default: "*").
    pub cors_allowed_origins: Vec<String>,

    /// Server-wide request timeout in seconds (default: 30).
    pub request_timeout_secs: u64,

    /// Plugin ids to keep disabled at startup (from DISABLED_PLUGINS).
    pub disabled_plugins: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 3000,
            api_key: None,
            jwt_secret: None,
            jwt_expire_minutes: 1440,
            auth_file: None,
            auth: AuthFile::default(),
            cors_allowed_origins: vec!["*".to_string()],
            request_timeout_secs: 30,
            disabled_plugins: Vec::new(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        let port = env::var("PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse()
            .context("PORT must be a valid u16")?;

        let api_key = env::var("API_KEY").ok().filter(|k| !k.trim().is_empty());
        let jwt_secret = env::var("JWT_SECRET").ok().filter(|s| !s.is_empty());

        let jwt_expire_minutes = env::var("JWT_EXPIRE_MINUTES")
            .unwrap_or_else(|_| "1440".to_string())
            .parse()
            .context("JWT_EXPIRE_MINUTES must be a valid integer")?;

        let auth_file = env::var("AUTH_FILE").ok().map(PathBuf::from);
        let auth = match &auth_file {
            Some(path) => AuthFile::load(path)?,
            None => AuthFile::default(),
        };

        let cors_allowed_origins = env::var("CORS_ALLOWED_ORIGINS")
            .map(|v| v.split(',').map(|s| s.trim().to_string()).collect())
            .unwrap_or_else(|_| vec!["*".to_string()]);

        let request_timeout_secs = env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".to_string())
            .parse()
            .context("REQUEST_TIMEOUT_SECS must be a valid u64")?;

        let disabled_plugins = env::var("DISABLED_PLUGINS")
            .map(|v| {
                v.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            port,
            api_key,
            jwt_secret,
            jwt_expire_minutes,
            auth_file,
            auth,
            cors_allowed_origins,
            request_timeout_secs,
            disabled_plugins,
        })
    }

    /// Token codec for the configured secret.
    pub fn token_codec(&self) -> TokenCodec {
        let secret = match &self.jwt_secret {
            Some(secret) => {
                if secret.len() < 32 {
                    warn!("JWT_SECRET is shorter than 32 bytes");
                }
                secret.clone().into_bytes()
            }
            None => {
                warn!("JWT_SECRET not set; using a random secret, tokens will not survive a restart");
                let mut bytes = vec![0u8; 32];
                OsRng.fill_bytes(&mut bytes);
                bytes
            }
        };
        TokenCodec::new(&secret, self.jwt_expire_minutes)
    }

    /// Build the identity provider from `API_KEY` and the auth file.
    pub fn identity_provider(&self) -> Result<StaticIdentityProvider> {
        let mut provider = StaticIdentityProvider::new(Some(self.token_codec()));

        if let Some(key) = &self.api_key {
            provider = provider.with_key("API_KEY", key, Grants::full());
        }

        for entry in &self.auth.api_keys {
            let grants = parse_grants(&entry.grants)
                .with_context(|| format!("api key '{}' has invalid grants", entry.name))?;
            provider = match (&entry.key, &entry.key_sha256) {
                (Some(key), None) => provider.with_key(&entry.name, key, grants),
                (None, Some(digest)) => provider.with_key_digest(&entry.name, digest, grants)?,
                _ => bail!(
                    "api key '{}' must set exactly one of `key` or `key_sha256`",
                    entry.name
                ),
            };
        }

        for user in &self.auth.users {
            let grants = parse_grants(&user.grants)
                .with_context(|| format!("user '{}' has invalid grants", user.username))?;
            provider = provider.with_user(&user.username, &user.password_hash, grants);
        }

        if provider.key_count() == 0 && self.auth.users.is_empty() {
            warn!("no API keys or users configured; protected routes are unreachable");
        }

        Ok(provider)
    }
}

/// Contents of the TOML auth file.
///
/// ```toml
/// [[api_keys]]
/// name = "joke-bot"
/// key_sha256 = "9f86d0..."
/// grants = ["CONVERSATION:WRITE"]
///
/// [[users]]
/// username = "admin"
/// password_hash = "$argon2id$..."
/// grants = ["*"]
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuthFile {
    #[serde(default)]
    pub api_keys: Vec<ApiKeyEntry>,
    #[serde(default)]
    pub users: Vec<UserEntry>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ApiKeyEntry {
    pub name: String,
    /// Plaintext key. Prefer `key_sha256`.
    pub key: Option<String>,
    /// Hex-encoded SHA-256 of the key.
    pub key_sha256: Option<String>,
    #[serde(default)]
    pub grants: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UserEntry {
    pub username: String,
    /// Argon2 PHC string, see `trellis hash-password`.
    pub password_hash: String,
    #[serde(default)]
    pub grants: Vec<String>,
}

impl AuthFile {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read auth file {}", path.display()))?;
        Self::parse(&raw).with_context(|| format!("failed to parse auth file {}", path.display()))
    }

    pub fn parse(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }
}

/// Parse `RESOURCE:PERMISSION` strings. `*` grants everything.
pub fn parse_grants(entries: &[String]) -> Result<Grants> {
    if entries.iter().any(|e| e.trim() == "*") {
        return Ok(Grants::full());
    }
    entries
        .iter()
        .map(|e| e.parse::<Capability>().map_err(anyhow::Error::from))
        .collect()
}
