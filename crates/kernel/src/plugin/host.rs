use std::collections::{BTreeMap, BTreeSet};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tracing::{info, warn};
use trellis_sdk::{Endpoint, Plugin};

use super::error::PluginError;
use super::gate::{is_valid_plugin_id, should_auto_enable};
use crate::registry::EndpointRegistry;

/// Snapshot of one installed plugin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PluginStatus {
    pub id: String,
    pub version: String,
    pub description: String,
    pub enabled: bool,
    /// Routes currently registered by the plugin.
    pub routes: usize,
}

/// Installed plugins and their enabled state.
///
/// Lifecycle operations are serialized; request dispatch never takes these
/// locks and keeps running against the registry's published snapshot.
pub struct PluginHost {
    registry: Arc<EndpointRegistry>,
    plugins: RwLock<BTreeMap<String, Arc<dyn Plugin>>>,
    enabled: RwLock<BTreeSet<String>>,
    lifecycle: Mutex<()>,
}

impl PluginHost {
    pub fn new(registry: Arc<EndpointRegistry>) -> Self {
        Self {
            registry,
            plugins: RwLock::new(BTreeMap::new()),
            enabled: RwLock::new(BTreeSet::new()),
            lifecycle: Mutex::new(()),
        }
    }

    /// Make a plugin known to the host without enabling it.
    pub fn install(&self, plugin: Arc<dyn Plugin>) -> Result<(), PluginError> {
        let id = plugin.id().to_string();
        if !is_valid_plugin_id(&id) {
            return Err(PluginError::InvalidId { plugin: id });
        }

        let mut plugins = self.plugins.write();
        if plugins.contains_key(&id) {
            return Err(PluginError::AlreadyInstalled { plugin: id });
        }
        info!(plugin = %id, version = plugin.version(), "plugin installed");
        plugins.insert(id, plugin);
        Ok(())
    }

    /// Enable every installed plugin that should start enabled.
    ///
    /// Failures are logged and skipped. Returns the ids that were enabled.
    pub fn start(&self, disabled_plugins: &[String]) -> Vec<String> {
        let candidates: Vec<(String, bool)> = self
            .plugins
            .read()
            .iter()
            .map(|(id, p)| (id.clone(), p.default_enabled()))
            .collect();

        let mut started = Vec::new();
        for (id, default_enabled) in candidates {
            if !should_auto_enable(default_enabled, disabled_plugins, &id) {
                info!(plugin = %id, "plugin left disabled at startup");
                continue;
            }
            match self.enable(&id) {
                Ok(_) => started.push(id),
                Err(e) => warn!(plugin = %id, error = %e, "failed to enable plugin at startup"),
            }
        }
        started
    }

    /// Enable a plugin, registering its routes. Enabling an already enabled
    /// plugin re-registers its routes atomically.
    ///
    /// Returns the number of routes registered.
    pub fn enable(&self, id: &str) -> Result<usize, PluginError> {
        let _guard = self.lifecycle.lock();
        self.enable_locked(id)
    }

    fn enable_locked(&self, id: &str) -> Result<usize, PluginError> {
        let plugin = self.get(id)?;

        let endpoints = declare(id, plugin.as_ref())?;
        let count = self.registry.register_plugin(id, endpoints)?;

        if self.enabled.write().insert(id.to_string()) {
            info!(plugin = %id, routes = count, "plugin enabled");
        } else {
            info!(plugin = %id, routes = count, "plugin reloaded");
        }
        Ok(count)
    }

    /// Disable a plugin, removing its routes. Disabling a disabled plugin is
    /// a no-op. Returns the number of routes removed.
    pub fn disable(&self, id: &str) -> Result<usize, PluginError> {
        let _guard = self.lifecycle.lock();
        self.get(id)?;

        let removed = self.registry.unregister(id);
        if self.enabled.write().remove(id) {
            info!(plugin = %id, routes = removed.len(), "plugin disabled");
        }
        Ok(removed.len())
    }

    /// Re-read an enabled plugin's declarations and swap them in.
    pub fn reload(&self, id: &str) -> Result<usize, PluginError> {
        let _guard = self.lifecycle.lock();
        self.get(id)?;
        if !self.is_enabled(id) {
            return Err(PluginError::not_enabled(id));
        }
        self.enable_locked(id)
    }

    pub fn is_enabled(&self, id: &str) -> bool {
        self.enabled.read().contains(id)
    }

    pub fn is_installed(&self, id: &str) -> bool {
        self.plugins.read().contains_key(id)
    }

    pub fn list(&self) -> Vec<PluginStatus> {
        let enabled = self.enabled.read();
        self.plugins
            .read()
            .iter()
            .map(|(id, plugin)| PluginStatus {
                id: id.clone(),
                version: plugin.version().to_string(),
                description: plugin.description().to_string(),
                enabled: enabled.contains(id),
                routes: self.registry.owned_by(id).len(),
            })
            .collect()
    }

    pub fn enabled_count(&self) -> usize {
        self.enabled.read().len()
    }

    pub fn registry(&self) -> &Arc<EndpointRegistry> {
        &self.registry
    }

    fn get(&self, id: &str) -> Result<Arc<dyn Plugin>, PluginError> {
        self.plugins
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| PluginError::unknown(id))
    }
}

/// Collect a plugin's declarations, turning a panic into an error.
fn declare(id: &str, plugin: &dyn Plugin) -> Result<Vec<Endpoint>, PluginError> {
    catch_unwind(AssertUnwindSafe(|| plugin.endpoints())).map_err(|payload| {
        PluginError::DeclarationPanic {
            plugin: id.to_string(),
            message: panic_message(payload.as_ref()),
        }
    })
}

pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
