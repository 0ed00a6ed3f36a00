//! Plugin startup gating and id rules.

/// Compute whether an installed plugin should be enabled at startup.
///
/// A plugin is enabled only if:
/// 1. Its `default_enabled()` is `true`, AND
/// 2. Its id is NOT listed in the `DISABLED_PLUGINS` env var.
pub fn should_auto_enable(default_enabled: bool, disabled_plugins: &[String], plugin_id: &str) -> bool {
    default_enabled && !disabled_plugins.iter().any(|d| d == plugin_id)
}

/// Plugin ids are non-empty ASCII alphanumerics plus underscore.
pub fn is_valid_plugin_id(id: &str) -> bool {
    !id.is_empty() && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}
