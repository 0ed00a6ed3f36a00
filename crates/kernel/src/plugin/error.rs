//! Plugin lifecycle errors.
//!
//! All errors include the plugin id so a failed enable can be traced to the
//! plugin that caused it.

use thiserror::Error;

use crate::registry::RegistryError;

#[derive(Debug, Error)]
pub enum PluginError {
    #[error("plugin '{plugin}' is not installed")]
    UnknownPlugin { plugin: String },

    #[error("plugin '{plugin}' is already installed")]
    AlreadyInstalled { plugin: String },

    #[error("invalid plugin id '{plugin}': use ASCII letters, digits and underscores")]
    InvalidId { plugin: String },

    #[error("plugin '{plugin}' is not enabled")]
    NotEnabled { plugin: String },

    /// `Plugin::endpoints` panicked while building declarations.
    #[error("plugin '{plugin}': endpoint declaration panicked: {message}")]
    DeclarationPanic { plugin: String, message: String },

    /// A declaration was rejected; nothing was changed.
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

impl PluginError {
    pub fn unknown(plugin: impl Into<String>) -> Self {
        Self::UnknownPlugin {
            plugin: plugin.into(),
        }
    }

    pub fn not_enabled(plugin: impl Into<String>) -> Self {
        Self::NotEnabled {
            plugin: plugin.into(),
        }
    }
}
