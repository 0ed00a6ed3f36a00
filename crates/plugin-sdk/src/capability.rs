//! Access-control vocabulary shared by plugins and the kernel.
//!
//! A route may declare a [`Capability`]: one [`AuthResource`] paired with one
//! [`AuthPermission`]. Both enumerations are closed: strings supplied by a
//! plugin are mapped onto them when the plugin is enabled, and anything that
//! does not map is rejected before a single request is served.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Protected resource families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthResource {
    Status,
    Memory,
    Conversation,
    Settings,
    Llm,
    Embedder,
    AuthHandler,
    Users,
    Upload,
    Plugins,
    Static,
}

impl AuthResource {
    /// Every resource, in declaration order.
    pub const ALL: [AuthResource; 11] = [
        AuthResource::Status,
        AuthResource::Memory,
        AuthResource::Conversation,
        AuthResource::Settings,
        AuthResource::Llm,
        AuthResource::Embedder,
        AuthResource::AuthHandler,
        AuthResource::Users,
        AuthResource::Upload,
        AuthResource::Plugins,
        AuthResource::Static,
    ];

    /// Canonical upper-case name.
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthResource::Status => "STATUS",
            AuthResource::Memory => "MEMORY",
            AuthResource::Conversation => "CONVERSATION",
            AuthResource::Settings => "SETTINGS",
            AuthResource::Llm => "LLM",
            AuthResource::Embedder => "EMBEDDER",
            AuthResource::AuthHandler => "AUTH_HANDLER",
            AuthResource::Users => "USERS",
            AuthResource::Upload => "UPLOAD",
            AuthResource::Plugins => "PLUGINS",
            AuthResource::Static => "STATIC",
        }
    }
}

/// Operations that can be granted on a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthPermission {
    Write,
    Edit,
    List,
    Read,
    Delete,
}

impl AuthPermission {
    /// Every permission, in declaration order.
    pub const ALL: [AuthPermission; 5] = [
        AuthPermission::Write,
        AuthPermission::Edit,
        AuthPermission::List,
        AuthPermission::Read,
        AuthPermission::Delete,
    ];

    /// Canonical upper-case name.
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthPermission::Write => "WRITE",
            AuthPermission::Edit => "EDIT",
            AuthPermission::List => "LIST",
            AuthPermission::Read => "READ",
            AuthPermission::Delete => "DELETE",
        }
    }
}

impl fmt::Display for AuthResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for AuthPermission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A capability string that does not name a known resource or permission.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidRequirement {
    #[error("unknown auth resource '{0}'")]
    UnknownResource(String),

    #[error("unknown auth permission '{0}'")]
    UnknownPermission(String),

    #[error("malformed capability '{0}', expected RESOURCE:PERMISSION")]
    Malformed(String),
}

impl FromStr for AuthResource {
    type Err = InvalidRequirement;

    /// Case-insensitive; `-` and `_` are interchangeable.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let canonical = canonicalize(s);
        AuthResource::ALL
            .into_iter()
            .find(|r| r.as_str() == canonical)
            .ok_or_else(|| InvalidRequirement::UnknownResource(s.to_string()))
    }
}

impl FromStr for AuthPermission {
    type Err = InvalidRequirement;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let canonical = canonicalize(s);
        AuthPermission::ALL
            .into_iter()
            .find(|p| p.as_str() == canonical)
            .ok_or_else(|| InvalidRequirement::UnknownPermission(s.to_string()))
    }
}

fn canonicalize(s: &str) -> String {
    s.trim().to_ascii_uppercase().replace('-', "_")
}

/// A (resource, permission) pair gating a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Capability {
    pub resource: AuthResource,
    pub permission: AuthPermission,
}

impl Capability {
    pub const fn new(resource: AuthResource, permission: AuthPermission) -> Self {
        Self {
            resource,
            permission,
        }
    }

    /// Map raw strings onto the canonical enumerations.
    pub fn parse(resource: &str, permission: &str) -> Result<Self, InvalidRequirement> {
        Ok(Self {
            resource: resource.parse()?,
            permission: permission.parse()?,
        })
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.resource, self.permission)
    }
}

impl FromStr for Capability {
    type Err = InvalidRequirement;

    /// Parses the `RESOURCE:PERMISSION` form used on the command line and in
    /// configuration files.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let Some((resource, permission)) = s.split_once(':') else {
            return Err(InvalidRequirement::Malformed(s.to_string()));
        };
        Capability::parse(resource, permission)
    }
}

/// The set of capabilities held by a principal.
///
/// Serialized as `{"CONVERSATION": ["READ", "WRITE"], ...}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Grants(BTreeMap<AuthResource, BTreeSet<AuthPermission>>);

impl Grants {
    /// No capabilities at all.
    pub fn none() -> Self {
        Self::default()
    }

    /// Every permission on every resource.
    pub fn full() -> Self {
        let mut grants = Self::default();
        for resource in AuthResource::ALL {
            for permission in AuthPermission::ALL {
                grants.insert(Capability::new(resource, permission));
            }
        }
        grants
    }

    pub fn insert(&mut self, capability: Capability) {
        self.0
            .entry(capability.resource)
            .or_default()
            .insert(capability.permission);
    }

    /// Builder-style insert.
    pub fn with(mut self, resource: AuthResource, permission: AuthPermission) -> Self {
        self.insert(Capability::new(resource, permission));
        self
    }

    pub fn allows(&self, capability: &Capability) -> bool {
        self.0
            .get(&capability.resource)
            .is_some_and(|perms| perms.contains(&capability.permission))
    }

    pub fn is_empty(&self) -> bool {
        self.0.values().all(|perms| perms.is_empty())
    }

    /// Iterate over every granted pair.
    pub fn iter(&self) -> impl Iterator<Item = Capability> + '_ {
        self.0.iter().flat_map(|(resource, perms)| {
            perms
                .iter()
                .map(move |permission| Capability::new(*resource, *permission))
        })
    }
}

impl FromIterator<Capability> for Grants {
    fn from_iter<I: IntoIterator<Item = Capability>>(iter: I) -> Self {
        let mut grants = Grants::default();
        for capability in iter {
            grants.insert(capability);
        }
        grants
    }
}
