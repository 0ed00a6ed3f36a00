//! Plugins compiled into the `trellis` binary.

use std::sync::Arc;

use trellis_jokes::JokesPlugin;
use trellis_sdk::Plugin;
use trellis_topic_jokes::TopicJokesPlugin;

/// Every bundled plugin, in install order.
pub fn bundled_plugins() -> Vec<Arc<dyn Plugin>> {
    vec![Arc::new(JokesPlugin::new()), Arc::new(TopicJokesPlugin)]
}
