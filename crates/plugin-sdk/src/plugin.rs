//! The plugin contract.

use crate::endpoint::Endpoint;

/// An extension module that contributes HTTP endpoints.
///
/// The kernel calls [`Plugin::endpoints`] every time the plugin is enabled or
/// reloaded, so the returned declarations may change between calls.
pub trait Plugin: Send + Sync {
    /// Machine name; unique among installed plugins.
    fn id(&self) -> &str;

    fn version(&self) -> &str {
        "0.0.0"
    }

    fn description(&self) -> &str {
        ""
    }

    /// Whether the host enables this plugin at startup.
    fn default_enabled(&self) -> bool {
        true
    }

    fn endpoints(&self) -> Vec<Endpoint>;
}
