//! Authentication and capability checks.

mod credential;
mod error;
mod identity;
pub mod password;
mod resolver;
mod token;

pub use credential::{API_KEY_HEADER, Credential, DEFAULT_USER_ID, USER_ID_HEADER};
pub use error::AuthError;
pub use identity::{
    IdentityProvider, KeyIdentity, StaticIdentityProvider, TokenIdentity, key_digest_hex,
};
pub use resolver::{CapabilityResolver, normalize_requirement};
pub use token::{ISSUER, IssuedToken, TokenClaims, TokenCodec, TokenError};
