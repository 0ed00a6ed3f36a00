//! Plugin hosting.
//!
//! Plugins are compiled-in values implementing [`trellis_sdk::Plugin`]. The
//! host tracks which are installed and enabled, and translates enable,
//! disable and reload into registry mutations.

mod error;
mod gate;
mod host;

pub use error::PluginError;
pub use gate::{is_valid_plugin_id, should_auto_enable};
pub use host::{PluginHost, PluginStatus};
pub(crate) use host::panic_message;
